//! NAL 单元定位器.
//!
//! 在完整缓冲区上按流顺序惰性地产出 [`NalUnit`] 描述, 不复制载荷.
//!
//! 错误分两类:
//! - 分帧错误 (长度前缀越界、起始码缺失): 产出一次 `Err` 后序列结束,
//!   之前产出的 NAL 仍然有效
//! - 单个 NAL 头部非法: 产出 `Err` 但继续定位后续 NAL

use liu_core::{LiuError, LiuResult, PartialError};
use log::warn;

use crate::bytestream::{AnnexBFrames, LengthPrefixedFrames, RawNal, StreamFormat};
use crate::codec::Codec;
use crate::nal::NalUnit;

#[derive(Debug, Clone)]
enum Frames<'a> {
    AnnexB(AnnexBFrames<'a>),
    LengthPrefixed(LengthPrefixedFrames<'a>),
}

impl<'a> Frames<'a> {
    fn next_frame(&mut self) -> Option<LiuResult<RawNal<'a>>> {
        match self {
            Self::AnnexB(frames) => frames.next(),
            Self::LengthPrefixed(frames) => frames.next(),
        }
    }

    fn restart(&mut self) {
        match self {
            Self::AnnexB(frames) => frames.restart(),
            Self::LengthPrefixed(frames) => frames.restart(),
        }
    }
}

/// NAL 单元定位器
///
/// 可克隆、可重新开始的惰性序列.
///
/// # 示例
/// ```
/// use liu_codec::{Codec, NalLocator, StreamFormat};
///
/// let data = [0x00, 0x00, 0x00, 0x02, 0x09, 0xF0];
/// let mut locator =
///     NalLocator::new(&data, Codec::H264, StreamFormat::LengthPrefixed { length_size: 4 }).unwrap();
/// let nal = locator.next().unwrap().unwrap();
/// assert_eq!(nal.offset, 4);
/// assert!(nal.header.is_access_unit_delimiter());
/// assert!(locator.next().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct NalLocator<'a> {
    codec: Codec,
    frames: Frames<'a>,
}

impl<'a> NalLocator<'a> {
    /// 创建定位器
    pub fn new(data: &'a [u8], codec: Codec, format: StreamFormat) -> LiuResult<Self> {
        let frames = match format {
            StreamFormat::AnnexB => Frames::AnnexB(AnnexBFrames::new(data)),
            StreamFormat::LengthPrefixed { length_size } => {
                Frames::LengthPrefixed(LengthPrefixedFrames::new(data, length_size)?)
            }
        };
        Ok(Self { codec, frames })
    }

    /// 长度前缀格式的定位器
    pub fn length_prefixed(data: &'a [u8], codec: Codec, length_size: u8) -> LiuResult<Self> {
        Self::new(data, codec, StreamFormat::LengthPrefixed { length_size })
    }

    /// Annex B 格式的定位器
    pub fn annex_b(data: &'a [u8], codec: Codec) -> Self {
        Self {
            codec,
            frames: Frames::AnnexB(AnnexBFrames::new(data)),
        }
    }

    /// 所属编解码器
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// 回到缓冲区起点重新开始
    pub fn restart(&mut self) {
        self.frames.restart();
    }

    /// 序列是否因分帧错误而提前终止
    pub fn framing_failed(&self) -> bool {
        match &self.frames {
            Frames::AnnexB(frames) => frames.failed(),
            Frames::LengthPrefixed(frames) => frames.failed(),
        }
    }
}

impl<'a> Iterator for NalLocator<'a> {
    type Item = LiuResult<NalUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = match self.frames.next_frame()? {
            Ok(frame) => frame,
            Err(err) => return Some(Err(err)),
        };
        Some(NalUnit::parse(self.codec, frame.data, frame.offset as u64).map_err(|err| {
            match err {
                LiuError::MalformedStream(msg) => {
                    LiuError::MalformedStream(format!("{} (offset={})", msg, frame.offset))
                }
                other => other,
            }
        }))
    }
}

/// 定位缓冲区中的全部 NAL
///
/// 头部非法的单个 NAL 被记录并跳过; 分帧错误时返回已定位的 NAL 作为部分结果.
pub fn locate_all<'a>(
    data: &'a [u8],
    codec: Codec,
    format: StreamFormat,
) -> Result<Vec<NalUnit<'a>>, PartialError<Vec<NalUnit<'a>>>> {
    let mut locator = match NalLocator::new(data, codec, format) {
        Ok(locator) => locator,
        Err(err) => return Err(PartialError::new(Vec::new(), err)),
    };
    let mut units = Vec::new();

    while let Some(item) = locator.next() {
        match item {
            Ok(unit) => units.push(unit),
            Err(err) if locator.framing_failed() => return Err(PartialError::new(units, err)),
            Err(err) => warn!("{}: 跳过非法 NAL: {}", codec, err),
        }
    }
    Ok(units)
}
