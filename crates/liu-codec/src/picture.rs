//! 图像级分析结果.
//!
//! 每个完整的图像 (一个访问单元中的全部 VCL NAL) 产出一个 [`PictureInfo`],
//! 供容器层决定分片边界与时间戳.

use std::fmt;

use bitflags::bitflags;

use crate::codec::Codec;

/// 条带类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceType {
    /// 前向预测
    P,
    /// 双向预测
    B,
    /// 帧内
    I,
    /// 切换 P (仅 H.264)
    Sp,
    /// 切换 I (仅 H.264)
    Si,
}

impl SliceType {
    /// 由 H.264 slice_type (0..=9) 构造
    pub fn from_h264(value: u32) -> Option<Self> {
        match value % 5 {
            0 => Some(Self::P),
            1 => Some(Self::B),
            2 => Some(Self::I),
            3 => Some(Self::Sp),
            4 => Some(Self::Si),
            _ => None,
        }
        .filter(|_| value <= 9)
    }

    /// 由 HEVC slice_type (0..=2) 构造
    pub fn from_h265(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::B),
            1 => Some(Self::P),
            2 => Some(Self::I),
            _ => None,
        }
    }

    /// 是否只含帧内预测
    pub fn is_intra(&self) -> bool {
        matches!(self, Self::I | Self::Si)
    }

    /// 是否使用第二个参考列表
    pub fn is_b(&self) -> bool {
        *self == Self::B
    }

    /// 单字母名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::P => "P",
            Self::B => "B",
            Self::I => "I",
            Self::Sp => "SP",
            Self::Si => "SI",
        }
    }

    /// 同一图像内多个条带类型合并: 取预测方式最复杂的那个
    pub fn merge(self, other: Self) -> Self {
        fn rank(t: SliceType) -> u8 {
            match t {
                SliceType::I | SliceType::Si => 0,
                SliceType::P | SliceType::Sp => 1,
                SliceType::B => 2,
            }
        }
        if rank(other) > rank(self) { other } else { self }
    }
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// 图像属性标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PictureFlags: u16 {
        /// 可作为分片起点 (IDR/IRAP 或带恢复点的图像)
        const KEYFRAME = 1 << 0;
        /// H.264 IDR 或 HEVC IDR_W_RADL/IDR_N_LP
        const IDR = 1 << 1;
        /// HEVC IRAP (IDR/CRA/BLA)
        const IRAP = 1 << 2;
        /// 被标记为参考图像
        const REFERENCE = 1 << 3;
        /// 被标记为长期参考
        const LONG_TERM = 1 << 4;
        /// 前面紧跟恢复点 SEI
        const RECOVERY_POINT = 1 << 5;
        /// HEVC RASL/RADL 前导图像
        const LEADING = 1 << 6;
        /// 参考帧跟踪在此图像处失步, 已清空并等待下一个 IDR
        const RESYNC = 1 << 7;
    }
}

impl PictureFlags {
    /// 以 `|` 连接的标志名, 空集输出 "-"
    pub fn names(&self) -> String {
        if self.is_empty() {
            return "-".into();
        }
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// 一个图像的分析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureInfo {
    /// 解码顺序编号, 从 0 开始
    pub index: u64,
    /// 编解码器
    pub codec: Codec,
    /// 属性标志
    pub flags: PictureFlags,
    /// 条带类型 (多个条带时合并)
    pub slice_type: SliceType,
    /// 条带数量
    pub slice_count: u32,
    /// 第一个 VCL NAL 的类型编号
    pub nal_type: u8,
    /// 图像顺序计数
    pub poc: i32,
    /// H.264 frame_num
    pub frame_num: Option<u32>,
    /// HEVC TemporalId
    pub temporal_id: u8,
    /// 引用的 SPS id
    pub sps_id: u32,
    /// 引用的 PPS id
    pub pps_id: u32,
    /// 引用的 VPS id (仅 HEVC)
    pub vps_id: Option<u32>,
    /// 第一个 VCL NAL 的偏移
    pub offset: u64,
    /// 全部 VCL NAL 的字节数之和
    pub size: u64,
    /// 处理完此图像后跟踪中的参考图像数量
    pub reference_count: u32,
    /// 参考列表 0 (POC), 仅 HEVC P/B 图像
    pub ref_list0: Vec<i32>,
    /// 参考列表 1 (POC), 仅 HEVC B 图像
    pub ref_list1: Vec<i32>,
}

impl PictureInfo {
    /// 是否为关键帧
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PictureFlags::KEYFRAME)
    }

    /// 是否为参考图像
    pub fn is_reference(&self) -> bool {
        self.flags.contains(PictureFlags::REFERENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_type_mapping() {
        assert_eq!(SliceType::from_h264(7), Some(SliceType::I));
        assert_eq!(SliceType::from_h264(5), Some(SliceType::P));
        assert_eq!(SliceType::from_h264(10), None);
        assert_eq!(SliceType::from_h265(0), Some(SliceType::B));
        assert_eq!(SliceType::from_h265(3), None);
        assert!(SliceType::Si.is_intra());
    }

    #[test]
    fn test_slice_type_merge() {
        assert_eq!(SliceType::I.merge(SliceType::P), SliceType::P);
        assert_eq!(SliceType::B.merge(SliceType::I), SliceType::B);
        assert_eq!(SliceType::P.merge(SliceType::B), SliceType::B);
    }

    #[test]
    fn test_flag_names() {
        let flags = PictureFlags::KEYFRAME | PictureFlags::IDR | PictureFlags::REFERENCE;
        assert_eq!(flags.names(), "keyframe|idr|reference");
        assert_eq!(PictureFlags::empty().names(), "-");
    }
}
