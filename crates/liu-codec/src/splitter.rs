//! 增量 NAL 切分器.
//!
//! 数据分块到达时使用: 每次 `push` 之后反复调用 `next_nal` 取出已经完整的 NAL,
//! 输入结束时调用 `finish` 取出最后一个 NAL.
//!
//! Annex B 中一个 NAL 在下一个起始码到达之前无法确定结束位置,
//! 因此尾部数据一直保留在 [`OffsetByteQueue`] 中, 已产出的前缀随即丢弃.

use byteorder::{BigEndian, ByteOrder};
use liu_core::{LiuError, LiuResult, OffsetByteQueue};

use crate::bytestream::{StreamFormat, find_start_code};
use crate::nal::OwnedNal;

/// Annex B 增量切分器
#[derive(Debug, Default)]
pub struct AnnexBSplitter {
    queue: OffsetByteQueue,
    /// 下一次查找起始码的绝对偏移
    scan_pos: u64,
    /// 当前 NAL 的起点 (起始码之后); `None` 表示还在寻找第一个起始码
    nal_start: Option<u64>,
}

impl AnnexBSplitter {
    /// 创建切分器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块输入数据
    pub fn push(&mut self, data: &[u8]) {
        self.queue.push(data);
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    /// 取出下一个完整的 NAL
    ///
    /// 返回 `Ok(None)` 表示需要更多数据. 起始码之前出现非零字节时返回一次
    /// `MalformedStream`, 随后从该起始码处继续.
    pub fn next_nal(&mut self) -> LiuResult<Option<OwnedNal>> {
        loop {
            let head = self.queue.head();
            let buf = self.queue.peek(head)?;
            let from = (self.scan_pos.max(head) - head) as usize;
            let found = find_start_code(buf, from).map(|idx| head + idx as u64);

            let Some(start_code) = found else {
                // 保留最后 2 字节, 它们可能是被截断的起始码前缀
                let keep_from = self.queue.tail().saturating_sub(2).max(head);
                self.scan_pos = keep_from;
                if self.nal_start.is_none() {
                    let garbage = has_non_zero(&buf[..(keep_from - head) as usize]);
                    self.queue.trim(keep_from)?;
                    if garbage {
                        return Err(LiuError::MalformedStream(format!(
                            "起始码之前存在非零数据, offset={}",
                            head
                        )));
                    }
                }
                return Ok(None);
            };

            let next_start = start_code + 3;
            match self.nal_start.replace(next_start) {
                None => {
                    let garbage = has_non_zero(&buf[..(start_code - head) as usize]);
                    self.queue.trim(next_start)?;
                    self.scan_pos = next_start;
                    if garbage {
                        return Err(LiuError::MalformedStream(format!(
                            "起始码之前存在非零数据, offset={}, start_code={}",
                            head, start_code
                        )));
                    }
                }
                Some(nal_start) => {
                    let end = nal_start + trimmed_len(&buf[(nal_start - head) as usize..(start_code - head) as usize]) as u64;
                    self.queue.trim(nal_start)?;
                    let data = self.queue.take_until(end)?;
                    self.queue.trim(next_start)?;
                    self.scan_pos = next_start;
                    if !data.is_empty() {
                        return Ok(Some(OwnedNal {
                            offset: nal_start,
                            data,
                        }));
                    }
                }
            }
        }
    }

    /// 输入结束, 取出最后一个 NAL 并复位
    ///
    /// 整个输入中没有任何起始码且含有非零数据时返回 `MalformedStream`.
    pub fn finish(&mut self) -> LiuResult<Option<OwnedNal>> {
        let head = self.queue.head();
        let tail = self.queue.tail();
        let result = match self.nal_start.take() {
            Some(nal_start) if nal_start < tail => {
                let buf = self.queue.peek(nal_start)?;
                let end = nal_start + trimmed_len(buf) as u64;
                self.queue.trim(nal_start)?;
                let data = self.queue.take_until(end)?;
                Ok((!data.is_empty()).then_some(OwnedNal {
                    offset: nal_start,
                    data,
                }))
            }
            Some(_) => Ok(None),
            None => {
                if has_non_zero(self.queue.peek(head)?) {
                    Err(LiuError::MalformedStream(format!(
                        "未找到起始码, offset={}, len={}",
                        head,
                        tail - head
                    )))
                } else {
                    Ok(None)
                }
            }
        };
        self.queue.clear();
        self.scan_pos = self.queue.tail();
        result
    }
}

fn has_non_zero(data: &[u8]) -> bool {
    data.iter().any(|&b| b != 0)
}

/// 去掉 trailing_zero_8bits 后的长度
fn trimmed_len(data: &[u8]) -> usize {
    data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1)
}

/// 长度前缀增量切分器
#[derive(Debug)]
pub struct LengthPrefixedSplitter {
    queue: OffsetByteQueue,
    length_size: usize,
}

impl LengthPrefixedSplitter {
    /// 创建切分器, `length_size` 必须为 1..=4
    pub fn new(length_size: u8) -> LiuResult<Self> {
        StreamFormat::LengthPrefixed { length_size }.validate()?;
        Ok(Self {
            queue: OffsetByteQueue::new(),
            length_size: length_size as usize,
        })
    }

    /// 追加一块输入数据
    pub fn push(&mut self, data: &[u8]) {
        self.queue.push(data);
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    /// 取出下一个完整的 NAL, 数据不足时返回 `Ok(None)`
    pub fn next_nal(&mut self) -> LiuResult<Option<OwnedNal>> {
        let head = self.queue.head();
        let prefix = match self.queue.read_at(head, self.length_size) {
            Ok(prefix) => prefix,
            Err(LiuError::NeedMoreData) => return Ok(None),
            Err(err) => return Err(err),
        };
        let nal_len = BigEndian::read_uint(prefix, self.length_size);
        let start = head + self.length_size as u64;
        let end = start + nal_len;
        if end > self.queue.tail() {
            return Ok(None);
        }
        self.queue.trim(start)?;
        let data = self.queue.take_until(end)?;
        Ok(Some(OwnedNal {
            offset: start,
            data,
        }))
    }

    /// 输入结束; 尚有未组成完整 NAL 的残留字节时返回 `MalformedStream`
    pub fn finish(&mut self) -> LiuResult<Option<OwnedNal>> {
        if self.queue.is_empty() {
            return Ok(None);
        }
        let err = LiuError::MalformedStream(format!(
            "码流结尾的 NAL 不完整, offset={}, remaining={}",
            self.queue.head(),
            self.queue.len()
        ));
        self.queue.clear();
        Err(err)
    }
}

/// 按封装格式选择的增量切分器
#[derive(Debug)]
pub enum StreamSplitter {
    /// Annex B
    AnnexB(AnnexBSplitter),
    /// 长度前缀
    LengthPrefixed(LengthPrefixedSplitter),
}

impl StreamSplitter {
    /// 根据封装格式创建切分器
    pub fn new(format: StreamFormat) -> LiuResult<Self> {
        Ok(match format {
            StreamFormat::AnnexB => Self::AnnexB(AnnexBSplitter::new()),
            StreamFormat::LengthPrefixed { length_size } => {
                Self::LengthPrefixed(LengthPrefixedSplitter::new(length_size)?)
            }
        })
    }

    /// 追加一块输入数据
    pub fn push(&mut self, data: &[u8]) {
        match self {
            Self::AnnexB(s) => s.push(data),
            Self::LengthPrefixed(s) => s.push(data),
        }
    }

    /// 取出下一个完整的 NAL
    pub fn next_nal(&mut self) -> LiuResult<Option<OwnedNal>> {
        match self {
            Self::AnnexB(s) => s.next_nal(),
            Self::LengthPrefixed(s) => s.next_nal(),
        }
    }

    /// 输入结束, 取出残留的最后一个 NAL
    pub fn finish(&mut self) -> LiuResult<Option<OwnedNal>> {
        match self {
            Self::AnnexB(s) => s.finish(),
            Self::LengthPrefixed(s) => s.finish(),
        }
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        match self {
            Self::AnnexB(s) => s.buffered(),
            Self::LengthPrefixed(s) => s.buffered(),
        }
    }
}
