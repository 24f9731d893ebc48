//! H.265/HEVC NAL 头部.
//!
//! HEVC NAL 头部为 2 字节:
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)

use std::fmt;

use liu_core::{LiuError, LiuResult};

/// HEVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// TRAIL_N (非参考尾随图像)
    TrailN,
    /// TRAIL_R (参考尾随图像)
    TrailR,
    /// TSA_N
    TsaN,
    /// TSA_R
    TsaR,
    /// STSA_N
    StsaN,
    /// STSA_R
    StsaR,
    /// RADL_N
    RadlN,
    /// RADL_R
    RadlR,
    /// RASL_N
    RaslN,
    /// RASL_R
    RaslR,
    /// BLA_W_LP (Broken Link Access)
    BlaWLp,
    /// BLA_W_RADL
    BlaWRadl,
    /// BLA_N_LP
    BlaNLp,
    /// IDR_W_RADL (Instantaneous Decoding Refresh)
    IdrWRadl,
    /// IDR_N_LP
    IdrNLp,
    /// CRA_NUT (Clean Random Access)
    Cra,
    /// VPS (Video Parameter Set)
    Vps,
    /// SPS (Sequence Parameter Set)
    Sps,
    /// PPS (Picture Parameter Set)
    Pps,
    /// AUD (Access Unit Delimiter)
    Aud,
    /// EOS (End of Sequence)
    Eos,
    /// EOB (End of Bitstream)
    Eob,
    /// FD (Filler Data)
    FillerData,
    /// PREFIX_SEI
    PrefixSei,
    /// SUFFIX_SEI
    SuffixSei,
    /// 保留或未指定类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::TrailN,
            1 => Self::TrailR,
            2 => Self::TsaN,
            3 => Self::TsaR,
            4 => Self::StsaN,
            5 => Self::StsaR,
            6 => Self::RadlN,
            7 => Self::RadlR,
            8 => Self::RaslN,
            9 => Self::RaslR,
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::Eos,
            37 => Self::Eob,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::TrailN => 0,
            Self::TrailR => 1,
            Self::TsaN => 2,
            Self::TsaR => 3,
            Self::StsaN => 4,
            Self::StsaR => 5,
            Self::RadlN => 6,
            Self::RadlR => 7,
            Self::RaslN => 8,
            Self::RaslR => 9,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::Eos => 36,
            Self::Eob => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL NAL (类型 0-31, 含保留类型)
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 32
    }

    /// 是否为 IRAP (类型 16-23, 含保留的 IRAP 类型)
    pub fn is_irap(&self) -> bool {
        (16..=23).contains(&self.type_id())
    }

    /// 是否为 IDR
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }

    /// 是否为 BLA
    pub fn is_bla(&self) -> bool {
        matches!(self, Self::BlaWLp | Self::BlaWRadl | Self::BlaNLp)
    }

    /// 是否为 RASL 前导图像
    pub fn is_rasl(&self) -> bool {
        matches!(self, Self::RaslN | Self::RaslR)
    }

    /// 是否为 RADL 前导图像
    pub fn is_radl(&self) -> bool {
        matches!(self, Self::RadlN | Self::RadlR)
    }

    /// 是否为子层非参考图像 (类型 0-14 中的偶数)
    pub fn is_sub_layer_non_reference(&self) -> bool {
        let id = self.type_id();
        id <= 14 && id % 2 == 0
    }

    /// 是否为参数集
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }

    /// 出现在 VCL 之前时是否意味着新的访问单元开始 (7.4.2.4.4)
    pub fn starts_access_unit(&self) -> bool {
        match self {
            Self::Vps | Self::Sps | Self::Pps | Self::Aud | Self::PrefixSei => true,
            Self::Unknown(id) => (41..=44).contains(id) || (48..=55).contains(id),
            _ => false,
        }
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrailN => write!(f, "TRAIL_N"),
            Self::TrailR => write!(f, "TRAIL_R"),
            Self::TsaN => write!(f, "TSA_N"),
            Self::TsaR => write!(f, "TSA_R"),
            Self::StsaN => write!(f, "STSA_N"),
            Self::StsaR => write!(f, "STSA_R"),
            Self::RadlN => write!(f, "RADL_N"),
            Self::RadlR => write!(f, "RADL_R"),
            Self::RaslN => write!(f, "RASL_N"),
            Self::RaslR => write!(f, "RASL_R"),
            Self::BlaWLp => write!(f, "BLA_W_LP"),
            Self::BlaWRadl => write!(f, "BLA_W_RADL"),
            Self::BlaNLp => write!(f, "BLA_N_LP"),
            Self::IdrWRadl => write!(f, "IDR_W_RADL"),
            Self::IdrNLp => write!(f, "IDR_N_LP"),
            Self::Cra => write!(f, "CRA"),
            Self::Vps => write!(f, "VPS"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::Eos => write!(f, "EOS"),
            Self::Eob => write!(f, "EOB"),
            Self::FillerData => write!(f, "FD"),
            Self::PrefixSei => write!(f, "PREFIX_SEI"),
            Self::SuffixSei => write!(f, "SUFFIX_SEI"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// HEVC NAL 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nuh_layer_id
    pub layer_id: u8,
    /// TemporalId = nuh_temporal_id_plus1 - 1
    pub temporal_id: u8,
}

impl NalHeader {
    /// HEVC NAL 头部固定为 2 字节
    pub const SIZE: usize = 2;

    /// 从 NAL 数据 (含头部) 解析头部
    pub fn parse(data: &[u8]) -> LiuResult<Self> {
        if data.len() < Self::SIZE {
            return Err(LiuError::MalformedStream(format!(
                "HEVC: NAL 头部不足 2 字节, len={}",
                data.len()
            )));
        }
        let b0 = data[0];
        let b1 = data[1];
        if b0 & 0x80 != 0 {
            return Err(LiuError::MalformedStream(format!(
                "HEVC: forbidden_zero_bit 非法, header=0x{:02X}{:02X}",
                b0, b1
            )));
        }
        let temporal_id_plus1 = b1 & 0x07;
        if temporal_id_plus1 == 0 {
            return Err(LiuError::MalformedStream(
                "HEVC: nuh_temporal_id_plus1 不能为 0".into(),
            ));
        }
        Ok(Self {
            nal_type: NalUnitType::from_type_id((b0 >> 1) & 0x3F),
            layer_id: ((b0 & 0x01) << 5) | (b1 >> 3),
            temporal_id: temporal_id_plus1 - 1,
        })
    }
}
