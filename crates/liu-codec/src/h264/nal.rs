//! H.264 NAL 头部.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5)  │
//! └──────────────────────────────────────┘
//! ```
//!
//! 类型 14/20/21 后面还有 3 字节的 SVC/MVC 扩展头.

use std::fmt;

use liu_core::{LiuError, LiuResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 前缀 NAL (SVC)
    Prefix,
    /// 子集 SPS (SVC/MVC)
    SubsetSps,
    /// 辅助图像切片
    AuxiliarySlice,
    /// 扩展切片 (SVC/MVC)
    SliceExtension,
    /// 深度视图扩展切片 (3D-AVC)
    SliceExtensionDepth,
    /// 保留或未指定类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            14 => Self::Prefix,
            15 => Self::SubsetSps,
            19 => Self::AuxiliarySlice,
            20 => Self::SliceExtension,
            21 => Self::SliceExtensionDepth,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Prefix => 14,
            Self::SubsetSps => 15,
            Self::AuxiliarySlice => 19,
            Self::SliceExtension => 20,
            Self::SliceExtensionDepth => 21,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为基础层 VCL NAL (本分析器处理的图像切片)
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为 IDR 切片
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 是否为参数集
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps | Self::SubsetSps | Self::SpsExtension)
    }

    /// 出现在 VCL 之前时是否意味着新的访问单元开始 (7.4.1.2.3)
    pub fn starts_access_unit(&self) -> bool {
        match self {
            Self::Aud | Self::Sps | Self::Pps | Self::Sei | Self::Prefix | Self::SubsetSps => true,
            Self::Unknown(id) => (16..=18).contains(id),
            _ => false,
        }
    }

    /// 扩展头字节数 (不含第一个字节)
    fn extension_size(&self) -> usize {
        match self {
            Self::Prefix | Self::SliceExtension | Self::SliceExtensionDepth => 3,
            _ => 0,
        }
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Prefix => write!(f, "Prefix"),
            Self::SubsetSps => write!(f, "SubsetSPS"),
            Self::AuxiliarySlice => write!(f, "AuxSlice"),
            Self::SliceExtension => write!(f, "SliceExt"),
            Self::SliceExtensionDepth => write!(f, "SliceExtDepth"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// H.264 NAL 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
}

impl NalHeader {
    /// 从 NAL 数据 (含头部字节) 解析头部
    ///
    /// 返回头部与头部字节数.
    pub fn parse(data: &[u8]) -> LiuResult<(Self, usize)> {
        let Some(&first) = data.first() else {
            return Err(LiuError::MalformedStream("H.264: NAL 单元数据为空".into()));
        };

        let forbidden = first >> 7;
        if forbidden != 0 {
            return Err(LiuError::MalformedStream(format!(
                "H.264: forbidden_zero_bit 非法, header=0x{:02X}",
                first
            )));
        }
        let header = Self {
            nal_type: NalUnitType::from_type_id(first & 0x1F),
            ref_idc: (first >> 5) & 0x03,
        };
        let size = 1 + header.nal_type.extension_size();
        if data.len() < size {
            return Err(LiuError::MalformedStream(format!(
                "H.264: NAL 扩展头被截断, type={}, len={}",
                header.nal_type,
                data.len()
            )));
        }
        Ok((header, size))
    }

    /// 是否为参考图像 (nal_ref_idc != 0)
    pub fn is_reference(&self) -> bool {
        self.ref_idc != 0
    }
}
