//! 编解码器标识.

use std::fmt;
use std::str::FromStr;

use liu_core::LiuError;

/// 支持分析的视频编解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
}

impl Codec {
    /// 获取编解码器名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
        }
    }

    /// 根据文件扩展名推断编解码器
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "264" | "h264" | "avc" | "jsv" => Some(Self::H264),
            "265" | "h265" | "hevc" | "hvc" => Some(Self::H265),
            _ => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "H.264"),
            Self::H265 => write!(f, "HEVC"),
        }
    }
}

impl FromStr for Codec {
    type Err = LiuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "h.264" | "avc" => Ok(Self::H264),
            "h265" | "h.265" | "hevc" => Ok(Self::H265),
            other => Err(LiuError::InvalidArgument(format!(
                "不支持的编解码器: {}",
                other
            ))),
        }
    }
}
