//! 字节流格式转换.
//!
//! # Annex B 格式
//!
//! 使用起始码分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # 长度前缀格式 (unit stream)
//!
//! 容器 (MP4 等) 内使用的格式, 每个 NAL 前是大端长度字段:
//! ```text
//! [length: N bytes BE] [NAL data: length bytes]
//! ```
//!
//! 两种格式都保留防竞争字节. 转换是无状态的, 每次调用独立完成.

use byteorder::{BigEndian, ByteOrder};
use liu_core::{LiuError, LiuResult, PartialError};

use crate::codec::Codec;
use crate::nal::NalUnit;

/// 码流封装格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Annex B 起始码格式
    AnnexB,
    /// 长度前缀格式, `length_size` 为 1..=4 字节
    LengthPrefixed {
        /// 长度字段字节数
        length_size: u8,
    },
}

impl StreamFormat {
    /// 校验格式参数
    pub fn validate(&self) -> LiuResult<()> {
        if let Self::LengthPrefixed { length_size } = self {
            validate_length_size(*length_size)?;
        }
        Ok(())
    }
}

/// 起始码长度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartCodeSize {
    /// `00 00 01`
    Three,
    /// `00 00 00 01`
    #[default]
    Four,
}

impl StartCodeSize {
    fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Three => &[0x00, 0x00, 0x01],
            Self::Four => &[0x00, 0x00, 0x00, 0x01],
        }
    }
}

/// 格式转换选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// 长度前缀字节数 (1..=4)
    pub length_size: u8,
    /// 生成 Annex B 时除第一个 NAL 外使用的起始码长度
    pub start_code: StartCodeSize,
    /// 丢弃访问单元分隔符
    pub strip_access_unit_delimiters: bool,
    /// 丢弃参数集 NAL (它们将由容器的解码器配置记录携带)
    pub strip_parameter_sets: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            length_size: 4,
            start_code: StartCodeSize::Four,
            strip_access_unit_delimiters: false,
            strip_parameter_sets: false,
        }
    }
}

fn validate_length_size(length_size: u8) -> LiuResult<()> {
    if !(1..=4).contains(&length_size) {
        return Err(LiuError::InvalidArgument(format!(
            "长度前缀字节数必须在 1..=4 之间, length_size={}",
            length_size
        )));
    }
    Ok(())
}

// ============================================================
// 分帧 (只识别边界, 不解析头部)
// ============================================================

/// 从缓冲区中切分出的一段原始 NAL 数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNal<'a> {
    /// NAL 第一个字节的偏移
    pub offset: usize,
    /// NAL 数据 (含头部)
    pub data: &'a [u8],
}

/// 查找 `00 00 01` 的位置 (第一个 0 的下标)
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    let mut i = from + 2;
    while i < data.len() {
        // 按第三个字节跳跃: 不是 0/1 时整个窗口都不可能命中
        match data[i] {
            0x01 if data[i - 1] == 0 && data[i - 2] == 0 => return Some(i - 2),
            0x00 | 0x01 => i += 1,
            _ => i += 3,
        }
    }
    None
}

/// Annex B 分帧迭代器
///
/// 遇到结构错误时返回一次 `Err`, 之后结束.
#[derive(Debug, Clone)]
pub struct AnnexBFrames<'a> {
    data: &'a [u8],
    /// 下一个 NAL 的起点 (起始码之后); `None` 表示尚未找到第一个起始码
    next: Option<usize>,
    finished: bool,
    failed: bool,
}

impl<'a> AnnexBFrames<'a> {
    /// 创建分帧迭代器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            next: None,
            finished: false,
            failed: false,
        }
    }

    /// 回到缓冲区起点重新开始
    pub fn restart(&mut self) {
        self.next = None;
        self.finished = false;
        self.failed = false;
    }

    /// 是否因结构错误而终止
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn fail(&mut self, msg: String) -> Option<LiuResult<RawNal<'a>>> {
        self.finished = true;
        self.failed = true;
        Some(Err(LiuError::MalformedStream(msg)))
    }
}

impl<'a> Iterator for AnnexBFrames<'a> {
    type Item = LiuResult<RawNal<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let data = self.data;

        let start = match self.next {
            Some(start) => start,
            None => match find_start_code(data, 0) {
                Some(pos) => {
                    if data[..pos].iter().any(|&b| b != 0) {
                        return self.fail(format!("第一个起始码之前存在非零数据, 起始码位于 {}", pos));
                    }
                    pos + 3
                }
                None => {
                    if data.iter().all(|&b| b == 0) {
                        self.finished = true;
                        return None;
                    }
                    return self.fail(format!("未找到起始码, len={}", data.len()));
                }
            },
        };

        let mut start = start;
        loop {
            if start >= data.len() {
                self.finished = true;
                return None;
            }
            let (end, next) = match find_start_code(data, start) {
                Some(pos) => (pos, Some(pos + 3)),
                None => (data.len(), None),
            };

            // 去除尾部的 0 字节 (trailing_zero_8bits 或下一个起始码的 zero_byte)
            let mut nal_end = end;
            while nal_end > start && data[nal_end - 1] == 0x00 {
                nal_end -= 1;
            }

            match next {
                Some(n) => self.next = Some(n),
                None => self.finished = true,
            }

            if nal_end > start {
                return Some(Ok(RawNal {
                    offset: start,
                    data: &data[start..nal_end],
                }));
            }
            // 空 NAL (连续起始码), 继续寻找
            match next {
                Some(n) => start = n,
                None => return None,
            }
        }
    }
}

/// 长度前缀分帧迭代器
///
/// 长度字段越界时返回一次 `Err`, 之后结束.
#[derive(Debug, Clone)]
pub struct LengthPrefixedFrames<'a> {
    data: &'a [u8],
    length_size: usize,
    pos: usize,
    finished: bool,
    failed: bool,
}

impl<'a> LengthPrefixedFrames<'a> {
    /// 创建分帧迭代器, `length_size` 必须为 1..=4
    pub fn new(data: &'a [u8], length_size: u8) -> LiuResult<Self> {
        validate_length_size(length_size)?;
        Ok(Self {
            data,
            length_size: length_size as usize,
            pos: 0,
            finished: false,
            failed: false,
        })
    }

    /// 回到缓冲区起点重新开始
    pub fn restart(&mut self) {
        self.pos = 0;
        self.finished = false;
        self.failed = false;
    }

    /// 是否因长度字段错误而终止
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn fail(&mut self, msg: String) -> Option<LiuResult<RawNal<'a>>> {
        self.finished = true;
        self.failed = true;
        Some(Err(LiuError::MalformedStream(msg)))
    }
}

impl<'a> Iterator for LengthPrefixedFrames<'a> {
    type Item = LiuResult<RawNal<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.pos >= self.data.len() {
            self.finished = true;
            return None;
        }

        let remaining = self.data.len() - self.pos;
        if remaining < self.length_size {
            return self.fail(format!(
                "长度字段被截断, offset={}, remaining={}, length_size={}",
                self.pos, remaining, self.length_size
            ));
        }

        let nal_len = BigEndian::read_uint(&self.data[self.pos..], self.length_size) as usize;
        let start = self.pos + self.length_size;
        if nal_len > self.data.len() - start {
            return self.fail(format!(
                "NAL 长度超出剩余数据, offset={}, declared_len={}, remaining={}",
                self.pos,
                nal_len,
                self.data.len() - start
            ));
        }

        self.pos = start + nal_len;
        Some(Ok(RawNal {
            offset: start,
            data: &self.data[start..start + nal_len],
        }))
    }
}

// ============================================================
// 格式转换
// ============================================================

/// Annex B 与长度前缀格式之间的转换器
#[derive(Debug, Clone, Copy)]
pub struct ByteStreamConverter {
    codec: Codec,
    options: ConversionOptions,
}

impl ByteStreamConverter {
    /// 创建转换器
    pub fn new(codec: Codec, options: ConversionOptions) -> LiuResult<Self> {
        validate_length_size(options.length_size)?;
        Ok(Self { codec, options })
    }

    /// 转换选项
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// 根据选项判断 NAL 是否保留; 头部无法解析的 NAL 原样保留
    fn keep(&self, nal: &[u8]) -> bool {
        let Ok(unit) = NalUnit::parse(self.codec, nal, 0) else {
            return true;
        };
        if self.options.strip_access_unit_delimiters && unit.header.is_access_unit_delimiter() {
            return false;
        }
        if self.options.strip_parameter_sets && unit.header.is_parameter_set() {
            return false;
        }
        true
    }

    /// Annex B → 长度前缀
    ///
    /// 出错时 `PartialError::produced` 含已转换的部分.
    pub fn to_unit_stream(&self, annex_b: &[u8]) -> Result<Vec<u8>, PartialError<Vec<u8>>> {
        let length_size = self.options.length_size as usize;
        let max_len = if length_size == 4 {
            u64::from(u32::MAX)
        } else {
            (1u64 << (8 * length_size)) - 1
        };
        let mut out = Vec::with_capacity(annex_b.len());

        for frame in AnnexBFrames::new(annex_b) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => return Err(PartialError::new(out, err)),
            };
            if !self.keep(frame.data) {
                continue;
            }
            let len = frame.data.len() as u64;
            if len > max_len {
                let err = LiuError::MalformedStream(format!(
                    "NAL 长度 {} 超出 {} 字节长度字段的表示范围, offset={}",
                    len, length_size, frame.offset
                ));
                return Err(PartialError::new(out, err));
            }
            let mut prefix = [0u8; 8];
            BigEndian::write_uint(&mut prefix, len, length_size);
            out.extend_from_slice(&prefix[..length_size]);
            out.extend_from_slice(frame.data);
        }

        Ok(out)
    }

    /// 长度前缀 → Annex B
    ///
    /// 第一个 NAL 总是使用 4 字节起始码, 其余使用 `options.start_code`.
    /// 空 NAL 在 Annex B 中无法表示, 直接丢弃.
    pub fn to_annex_b(&self, unit_stream: &[u8]) -> Result<Vec<u8>, PartialError<Vec<u8>>> {
        let frames = match LengthPrefixedFrames::new(unit_stream, self.options.length_size) {
            Ok(frames) => frames,
            Err(err) => return Err(PartialError::new(Vec::new(), err)),
        };
        let mut out = Vec::with_capacity(unit_stream.len() + unit_stream.len() / 16);

        for frame in frames {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => return Err(PartialError::new(out, err)),
            };
            if frame.data.is_empty() || !self.keep(frame.data) {
                continue;
            }
            if out.is_empty() {
                out.extend_from_slice(StartCodeSize::Four.bytes());
            } else {
                out.extend_from_slice(self.options.start_code.bytes());
            }
            out.extend_from_slice(frame.data);
        }

        Ok(out)
    }
}
