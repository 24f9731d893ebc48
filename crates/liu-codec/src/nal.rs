//! 编解码器无关的 NAL 单元描述.
//!
//! [`NalUnit`] 只引用源缓冲区中的数据, 不复制载荷;
//! [`OwnedNal`] 用于跨线程传递 (流水线场景), 持有 `Bytes`.

use std::fmt;

use bytes::Bytes;
use liu_core::{BitReader, LiuResult};

use crate::codec::Codec;
use crate::{h264, h265};

/// NAL 头部 (按编解码器区分)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalHeader {
    /// H.264 NAL 头部
    H264(h264::NalHeader),
    /// HEVC NAL 头部
    H265(h265::NalHeader),
}

impl NalHeader {
    /// 所属编解码器
    pub fn codec(&self) -> Codec {
        match self {
            Self::H264(_) => Codec::H264,
            Self::H265(_) => Codec::H265,
        }
    }

    /// NAL 类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::H264(h) => h.nal_type.type_id(),
            Self::H265(h) => h.nal_type.type_id(),
        }
    }

    /// 是否为 VCL (图像切片) NAL
    pub fn is_vcl(&self) -> bool {
        match self {
            Self::H264(h) => h.nal_type.is_vcl(),
            Self::H265(h) => h.nal_type.is_vcl(),
        }
    }

    /// 是否为参数集 NAL
    pub fn is_parameter_set(&self) -> bool {
        match self {
            Self::H264(h) => h.nal_type.is_parameter_set(),
            Self::H265(h) => h.nal_type.is_parameter_set(),
        }
    }

    /// 是否为访问单元分隔符
    pub fn is_access_unit_delimiter(&self) -> bool {
        match self {
            Self::H264(h) => h.nal_type == h264::NalUnitType::Aud,
            Self::H265(h) => h.nal_type == h265::NalUnitType::Aud,
        }
    }

    /// 是否为随机访问点 (H.264 IDR / HEVC IRAP)
    pub fn is_random_access(&self) -> bool {
        match self {
            Self::H264(h) => h.nal_type.is_idr(),
            Self::H265(h) => h.nal_type.is_irap(),
        }
    }

    /// H.264 的 nal_ref_idc
    pub fn ref_idc(&self) -> Option<u8> {
        match self {
            Self::H264(h) => Some(h.ref_idc),
            Self::H265(_) => None,
        }
    }

    /// HEVC 的 TemporalId, H.264 恒为 0
    pub fn temporal_id(&self) -> u8 {
        match self {
            Self::H264(_) => 0,
            Self::H265(h) => h.temporal_id,
        }
    }
}

impl fmt::Display for NalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264(h) => write!(f, "{} ref_idc={}", h.nal_type, h.ref_idc),
            Self::H265(h) => write!(
                f,
                "{} layer={} tid={}",
                h.nal_type, h.layer_id, h.temporal_id
            ),
        }
    }
}

/// 定位到的 NAL 单元
///
/// `offset` 为 NAL 第一个字节 (头部) 在源数据中的绝对偏移.
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    /// NAL 头部
    pub header: NalHeader,
    /// NAL 在源数据中的偏移
    pub offset: u64,
    /// 头部字节数
    pub header_size: usize,
    /// 完整 NAL 数据 (含头部, 含防竞争字节)
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 按编解码器解析 NAL 头部, 构造描述
    pub fn parse(codec: Codec, data: &'a [u8], offset: u64) -> LiuResult<Self> {
        let (header, header_size) = match codec {
            Codec::H264 => {
                let (h, size) = h264::NalHeader::parse(data)?;
                (NalHeader::H264(h), size)
            }
            Codec::H265 => (
                NalHeader::H265(h265::NalHeader::parse(data)?),
                h265::NalHeader::SIZE,
            ),
        };
        Ok(Self {
            header,
            offset,
            header_size,
            data,
        })
    }

    /// NAL 总字节数 (含头部)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 载荷字节数 (不含头部)
    pub fn payload_size(&self) -> usize {
        self.data.len() - self.header_size
    }

    /// 完整 NAL 数据 (含头部)
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// 载荷数据 (不含头部, 仍含防竞争字节)
    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.header_size..]
    }

    /// 在载荷上构造比特读取器 (自动跳过防竞争字节)
    pub fn reader(&self) -> BitReader<'a> {
        BitReader::new(self.payload())
    }
}

/// 持有数据的 NAL 单元, 用于在线程之间传递
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNal {
    /// NAL 在原始流中的偏移
    pub offset: u64,
    /// 完整 NAL 数据 (含头部)
    pub data: Bytes,
}

impl OwnedNal {
    /// 解析头部, 得到借用自身数据的 NAL 描述
    pub fn as_nal_unit(&self, codec: Codec) -> LiuResult<NalUnit<'_>> {
        NalUnit::parse(codec, &self.data, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_h264_unit() {
        let data = [0x67, 0x42, 0x00, 0x1E];
        let nal = NalUnit::parse(Codec::H264, &data, 10).unwrap();
        assert_eq!(nal.offset, 10);
        assert_eq!(nal.size(), 4);
        assert_eq!(nal.payload_size(), 3);
        assert_eq!(nal.payload(), &[0x42, 0x00, 0x1E]);
        assert!(nal.header.is_parameter_set());
        assert_eq!(nal.header.ref_idc(), Some(3));
    }

    #[test]
    fn test_parse_h265_unit() {
        // VPS: type 32 → 0x40 0x01
        let data = [0x40, 0x01, 0x0C];
        let nal = NalUnit::parse(Codec::H265, &data, 0).unwrap();
        assert_eq!(nal.header_size, 2);
        assert_eq!(nal.header.type_id(), 32);
        assert!(nal.header.is_parameter_set());
        assert_eq!(nal.header.to_string(), "VPS layer=0 tid=0");
    }

    #[test]
    fn test_owned_nal() {
        let owned = OwnedNal {
            offset: 4,
            data: Bytes::from_static(&[0x09, 0xF0]),
        };
        let nal = owned.as_nal_unit(Codec::H264).unwrap();
        assert!(nal.header.is_access_unit_delimiter());
        assert_eq!(nal.offset, 4);
    }
}
