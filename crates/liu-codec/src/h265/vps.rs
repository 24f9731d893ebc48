//! HEVC VPS (Video Parameter Set) 与 profile_tier_level 解析.
//!
//! 分析器只需要 VPS 的标识与层/子层数量; timing 与 HRD 部分不解析.

use liu_core::{BitReader, LiuError, LiuResult};

/// profile_tier_level() 中的 general 部分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileTierLevel {
    /// general_profile_space
    pub profile_space: u8,
    /// general_tier_flag (false=Main, true=High)
    pub tier: bool,
    /// general_profile_idc (1=Main, 2=Main10, 3=MainStillPicture, 4=RExt)
    pub profile_idc: u8,
    /// general_profile_compatibility_flag[32]
    pub compatibility_flags: u32,
    /// progressive/interlaced/non_packed/frame_only 四个标志
    pub source_flags: u8,
    /// general_level_idc (30 × 级别号)
    pub level_idc: u8,
    /// 每个子层的 sub_layer_level_idc
    pub sub_layer_levels: Vec<Option<u8>>,
}

impl ProfileTierLevel {
    /// 级别号, 如 93 → 3.1
    pub fn level(&self) -> f32 {
        f32::from(self.level_idc) / 30.0
    }
}

/// 解析 profile_tier_level(profilePresentFlag, maxNumSubLayersMinus1)
pub(crate) fn parse_profile_tier_level(
    br: &mut BitReader,
    profile_present: bool,
    max_sub_layers_minus1: u32,
) -> LiuResult<ProfileTierLevel> {
    let mut ptl = ProfileTierLevel::default();
    if profile_present {
        ptl.profile_space = br.read_bits(2)? as u8;
        ptl.tier = br.read_flag()?;
        ptl.profile_idc = br.read_bits(5)? as u8;
        ptl.compatibility_flags = br.read_bits(32)?;
        ptl.source_flags = br.read_bits(4)? as u8;
        // 43 位约束标志 + general_inbld_flag/reserved
        br.skip_bits(44)?;
    }
    ptl.level_idc = br.read_bits(8)? as u8;

    let mut profile_flags = Vec::with_capacity(max_sub_layers_minus1 as usize);
    let mut level_flags = Vec::with_capacity(max_sub_layers_minus1 as usize);
    for _ in 0..max_sub_layers_minus1 {
        profile_flags.push(br.read_flag()?);
        level_flags.push(br.read_flag()?);
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            br.skip_bits(2)?; // reserved_zero_2bits
        }
    }
    for (profile, level) in profile_flags.into_iter().zip(level_flags) {
        if profile {
            br.skip_bits(88)?; // sub_layer_profile_space .. sub_layer_inbld_flag
        }
        ptl.sub_layer_levels.push(if level {
            Some(br.read_bits(8)? as u8)
        } else {
            None
        });
    }
    Ok(ptl)
}

/// VPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vps {
    /// vps_video_parameter_set_id
    pub vps_id: u32,
    /// vps_base_layer_internal_flag
    pub base_layer_internal: bool,
    /// vps_max_layers_minus1 + 1
    pub max_layers: u32,
    /// vps_max_sub_layers_minus1 + 1
    pub max_sub_layers: u32,
    /// vps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile_tier_level
    pub ptl: ProfileTierLevel,
    /// 每个子层的 (max_dec_pic_buffering, max_num_reorder_pics, max_latency_increase)
    pub sub_layer_ordering: Vec<(u32, u32, u32)>,
    /// vps_num_units_in_tick / vps_time_scale
    pub timing: Option<(u32, u32)>,
}

/// 从 NAL 载荷解析 VPS
pub fn parse_vps(br: &mut BitReader) -> LiuResult<Vps> {
    parse_vps_fields(br).map_err(|e| e.into_parameter_set_error("HEVC VPS"))
}

fn parse_vps_fields(br: &mut BitReader) -> LiuResult<Vps> {
    let vps_id = br.read_bits(4)?;
    let base_layer_internal = br.read_flag()?;
    br.skip_bits(1)?; // vps_base_layer_available_flag
    let max_layers = br.read_bits(6)? + 1;
    let max_sub_layers_minus1 = br.read_bits(3)?;
    if max_sub_layers_minus1 > 6 {
        return Err(LiuError::InvalidData(format!(
            "vps_max_sub_layers_minus1 超出范围, value={}",
            max_sub_layers_minus1
        )));
    }
    let temporal_id_nesting = br.read_flag()?;
    let reserved = br.read_bits(16)?;
    if reserved != 0xFFFF {
        log::debug!("HEVC VPS: vps_reserved_0xffff_16bits = 0x{:04X}", reserved);
    }

    let ptl = parse_profile_tier_level(br, true, max_sub_layers_minus1)?;
    let sub_layer_ordering = parse_sub_layer_ordering(br, max_sub_layers_minus1)?;

    let max_layer_id = br.read_bits(6)?;
    let num_layer_sets = br.read_ue_max(1023, "vps_num_layer_sets_minus1")? + 1;
    for _ in 1..num_layer_sets {
        br.skip_bits(max_layer_id + 1)?; // layer_id_included_flag
    }

    let timing = if br.read_flag()? {
        let num_units_in_tick = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        Some((num_units_in_tick, time_scale))
    } else {
        None
    };

    Ok(Vps {
        vps_id,
        base_layer_internal,
        max_layers,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting,
        ptl,
        sub_layer_ordering,
        timing,
    })
}

/// 解析 sub_layer_ordering_info (VPS/SPS 共用)
pub(crate) fn parse_sub_layer_ordering(
    br: &mut BitReader,
    max_sub_layers_minus1: u32,
) -> LiuResult<Vec<(u32, u32, u32)>> {
    let info_present = br.read_flag()?;
    let start = if info_present { 0 } else { max_sub_layers_minus1 };
    let mut ordering = Vec::with_capacity(max_sub_layers_minus1 as usize + 1);
    for _ in start..=max_sub_layers_minus1 {
        let max_dec_pic_buffering = br.read_ue_max(15, "max_dec_pic_buffering_minus1")? + 1;
        let max_num_reorder = br.read_ue_max(15, "max_num_reorder_pics")?;
        let max_latency_increase = br.read_ue()?;
        ordering.push((max_dec_pic_buffering, max_num_reorder, max_latency_increase));
    }
    // 未显式给出的低子层沿用最高子层的值
    if !info_present {
        if let Some(&last) = ordering.last() {
            ordering = vec![last; max_sub_layers_minus1 as usize + 1];
        }
    }
    Ok(ordering)
}
