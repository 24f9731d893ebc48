//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! SPS 包含编码视频序列的全局参数, 包括:
//! - Profile / Level (编码规格)
//! - 图像宽度和高度 (以宏块为单位, 需要 cropping 调整)
//! - frame_num / POC 字段的比特宽度 (决定条带头的布局)
//! - 最大参考帧数 (决定滑动窗口大小)
//! - 帧率、像素宽高比等 VUI 信息
//!
//! VUI 按尽力而为的方式解析: VUI 损坏不影响 SPS 本身的使用.

use liu_core::{BitReader, LiuError, LiuResult, Rational};
use log::warn;

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set0..5 标志位
    pub constraint_set_flags: u8,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// seq_scaling_matrix_present_flag
    pub scaling_matrix_present: bool,
    /// log2(MaxFrameNum)
    pub log2_max_frame_num: u32,
    /// 图像顺序计数类型 (0, 1, 2)
    pub poc_type: u32,
    /// log2(MaxPicOrderCntLsb), 仅 poc_type == 0
    pub log2_max_poc_lsb: u32,
    /// delta_pic_order_always_zero_flag, 仅 poc_type == 1
    pub delta_pic_order_always_zero: bool,
    /// offset_for_non_ref_pic, 仅 poc_type == 1
    pub offset_for_non_ref_pic: i32,
    /// offset_for_top_to_bottom_field, 仅 poc_type == 1
    pub offset_for_top_to_bottom_field: i32,
    /// offset_for_ref_frame[], 仅 poc_type == 1
    pub offset_for_ref_frame: Vec<i32>,
    /// max_num_ref_frames
    pub max_num_ref_frames: u32,
    /// gaps_in_frame_num_value_allowed_flag
    pub gaps_in_frame_num_allowed: bool,
    /// 宽度 (宏块)
    pub pic_width_in_mbs: u32,
    /// 高度 (map unit)
    pub pic_height_in_map_units: u32,
    /// 是否只有帧编码 (无场)
    pub frame_mbs_only: bool,
    /// mb_adaptive_frame_field_flag
    pub mb_adaptive_frame_field: bool,
    /// direct_8x8_inference_flag
    pub direct_8x8_inference: bool,
    /// frame_cropping 偏移 (左, 右, 上, 下), 单位为裁剪单元
    pub crop: [u32; 4],
    /// 图像宽度 (像素, 已裁剪)
    pub width: u32,
    /// 图像高度 (像素, 已裁剪)
    pub height: u32,
    /// VUI; 不存在或解析失败时为 `None`
    pub vui: Option<Vui>,
}

/// VUI 参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vui {
    /// 像素宽高比
    pub sar: Option<Rational>,
    /// video_full_range_flag
    pub full_range: bool,
    /// colour_primaries / transfer_characteristics / matrix_coefficients
    pub colour_description: Option<(u8, u8, u8)>,
    /// num_units_in_tick / time_scale
    pub timing: Option<Timing>,
    /// pic_struct_present_flag
    pub pic_struct_present: bool,
    /// max_num_reorder_frames
    pub max_num_reorder_frames: Option<u32>,
    /// max_dec_frame_buffering
    pub max_dec_frame_buffering: Option<u32>,
}

/// VUI 时间信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// num_units_in_tick
    pub num_units_in_tick: u32,
    /// time_scale
    pub time_scale: u32,
    /// fixed_frame_rate_flag
    pub fixed_frame_rate: bool,
}

impl Sps {
    /// MaxFrameNum
    pub fn max_frame_num(&self) -> u32 {
        1 << self.log2_max_frame_num
    }

    /// MaxPicOrderCntLsb
    pub fn max_poc_lsb(&self) -> u32 {
        1 << self.log2_max_poc_lsb
    }

    /// ChromaArrayType
    pub fn chroma_array_type(&self) -> u32 {
        if self.separate_colour_plane {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// 参考帧缓冲容量 Max(max_num_ref_frames, 1)
    pub fn dpb_capacity(&self) -> usize {
        self.max_num_ref_frames.max(1) as usize
    }

    /// 以 map unit 计的图像大小 (slice_group_change_cycle 位宽计算用)
    pub fn pic_size_in_map_units(&self) -> u32 {
        self.pic_width_in_mbs * self.pic_height_in_map_units
    }

    /// 帧率: time_scale / (2 * num_units_in_tick)
    pub fn fps(&self) -> Option<Rational> {
        let timing = self.vui.as_ref()?.timing?;
        Some(Rational::new(timing.time_scale, timing.num_units_in_tick.checked_mul(2)?).reduce())
    }
}

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1)
pub(crate) const SAR_TABLE: [(u32, u32); 17] = [
    (0, 1),    // 0: 未指定
    (1, 1),    // 1: 1:1
    (12, 11),  // 2: 12:11
    (10, 11),  // 3: 10:11
    (16, 11),  // 4: 16:11
    (40, 33),  // 5: 40:33
    (24, 11),  // 6: 24:11
    (20, 11),  // 7: 20:11
    (32, 11),  // 8: 32:11
    (80, 33),  // 9: 80:33
    (18, 11),  // 10: 18:11
    (15, 11),  // 11: 15:11
    (64, 33),  // 12: 64:33
    (160, 99), // 13: 160:99
    (4, 3),    // 14: 4:3
    (3, 2),    // 15: 3:2
    (2, 1),    // 16: 2:1
];

/// 从 NAL 载荷解析 SPS
pub fn parse_sps(br: &mut BitReader) -> LiuResult<Sps> {
    parse_sps_fields(br).map_err(|e| e.into_parameter_set_error("H.264 SPS"))
}

fn parse_sps_fields(br: &mut BitReader) -> LiuResult<Sps> {
    let profile_idc = br.read_bits(8)? as u8;
    let constraint_set_flags = br.read_bits(8)? as u8;
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue_max(31, "seq_parameter_set_id")?;

    let mut chroma_format_idc = 1; // 默认 4:2:0
    let mut separate_colour_plane = false;
    let mut bit_depth_luma = 8;
    let mut bit_depth_chroma = 8;
    let mut scaling_matrix_present = false;

    // High profile 及以上有额外字段
    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue_max(3, "chroma_format_idc")?;
        if chroma_format_idc == 3 {
            separate_colour_plane = br.read_flag()?;
        }
        bit_depth_luma = br.read_ue_max(6, "bit_depth_luma_minus8")? + 8;
        bit_depth_chroma = br.read_ue_max(6, "bit_depth_chroma_minus8")? + 8;
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        scaling_matrix_present = br.read_flag()?;
        if scaling_matrix_present {
            let list_count = if chroma_format_idc != 3 { 8 } else { 12 };
            for idx in 0..list_count {
                if br.read_flag()? {
                    skip_scaling_list(br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let log2_max_frame_num = br.read_ue_max(12, "log2_max_frame_num_minus4")? + 4;

    let poc_type = br.read_ue_max(2, "pic_order_cnt_type")?;
    let mut log2_max_poc_lsb = 0;
    let mut delta_pic_order_always_zero = false;
    let mut offset_for_non_ref_pic = 0;
    let mut offset_for_top_to_bottom_field = 0;
    let mut offset_for_ref_frame = Vec::new();
    match poc_type {
        0 => {
            log2_max_poc_lsb = br.read_ue_max(12, "log2_max_pic_order_cnt_lsb_minus4")? + 4;
        }
        1 => {
            delta_pic_order_always_zero = br.read_flag()?;
            offset_for_non_ref_pic = br.read_se()?;
            offset_for_top_to_bottom_field = br.read_se()?;
            let cycle = br.read_ue_max(255, "num_ref_frames_in_pic_order_cnt_cycle")?;
            offset_for_ref_frame.reserve(cycle as usize);
            for _ in 0..cycle {
                offset_for_ref_frame.push(br.read_se()?);
            }
        }
        _ => {} // poc_type == 2: 无额外字段
    }

    let max_num_ref_frames = br.read_ue_max(16, "max_num_ref_frames")?;
    let gaps_in_frame_num_allowed = br.read_flag()?;

    let pic_width_in_mbs = br.read_ue_max(1023, "pic_width_in_mbs_minus1")? + 1;
    let pic_height_in_map_units = br.read_ue_max(1023, "pic_height_in_map_units_minus1")? + 1;

    let frame_mbs_only = br.read_flag()?;
    let mb_adaptive_frame_field = if frame_mbs_only { false } else { br.read_flag()? };
    let direct_8x8_inference = br.read_flag()?;

    let mut crop = [0u32; 4];
    if br.read_flag()? {
        for value in crop.iter_mut() {
            *value = br.read_ue()?;
        }
    }

    // 计算像素尺寸
    let chroma_array_type = if separate_colour_plane { 0 } else { chroma_format_idc };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let raw_width = pic_width_in_mbs * 16;
    let raw_height = pic_height_in_map_units * if frame_mbs_only { 16 } else { 32 };
    let crop_x = (u64::from(crop[0]) + u64::from(crop[1])) * u64::from(crop_unit_x);
    let crop_y = (u64::from(crop[2]) + u64::from(crop[3])) * u64::from(crop_unit_y);
    if crop_x >= u64::from(raw_width) || crop_y >= u64::from(raw_height) {
        return Err(LiuError::InvalidData(format!(
            "裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }
    let width = raw_width - crop_x as u32;
    let height = raw_height - crop_y as u32;

    let vui = if br.read_flag()? {
        match parse_vui(br) {
            Ok(vui) => Some(vui),
            Err(err) => {
                warn!("H.264 SPS: id={} VUI 解析失败, 忽略 VUI: {}", sps_id, err);
                None
            }
        }
    } else {
        None
    };

    Ok(Sps {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc,
        separate_colour_plane,
        bit_depth_luma,
        bit_depth_chroma,
        scaling_matrix_present,
        log2_max_frame_num,
        poc_type,
        log2_max_poc_lsb,
        delta_pic_order_always_zero,
        offset_for_non_ref_pic,
        offset_for_top_to_bottom_field,
        offset_for_ref_frame,
        max_num_ref_frames,
        gaps_in_frame_num_allowed,
        pic_width_in_mbs,
        pic_height_in_map_units,
        frame_mbs_only,
        mb_adaptive_frame_field,
        direct_8x8_inference,
        crop,
        width,
        height,
        vui,
    })
}

/// 是否为 High Profile 或更高
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// 获取 cropping 单位
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let sub_width = match chroma_array_type {
        1 | 2 => 2,
        _ => 1,
    };
    let sub_height = if chroma_array_type == 1 { 2 } else { 1 };
    let height_mult = if frame_mbs_only { 1 } else { 2 };
    (sub_width, sub_height * height_mult)
}

/// 跳过一个 scaling_list() (SPS/PPS 共用)
pub(crate) fn skip_scaling_list(br: &mut BitReader, size: usize) -> LiuResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = br.read_se_range(-128, 127, "delta_scale")?;
            next_scale = (last_scale + delta_scale + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 解析 VUI 参数
fn parse_vui(br: &mut BitReader) -> LiuResult<Vui> {
    let mut vui = Vui::default();

    // aspect_ratio_info_present_flag
    if br.read_flag()? {
        let ar_idc = br.read_bits(8)? as usize;
        if ar_idc == 255 {
            // Extended_SAR
            let sar_w = br.read_bits(16)?;
            let sar_h = br.read_bits(16)?;
            if sar_w != 0 && sar_h != 0 {
                vui.sar = Some(Rational::new(sar_w, sar_h));
            }
        } else if let Some(&(w, h)) = SAR_TABLE.get(ar_idc).filter(|(w, _)| *w > 0) {
            vui.sar = Some(Rational::new(w, h));
        }
    }

    // overscan_info_present_flag
    if br.read_flag()? {
        br.skip_bits(1)?; // overscan_appropriate_flag
    }

    // video_signal_type_present_flag
    if br.read_flag()? {
        br.skip_bits(3)?; // video_format
        vui.full_range = br.read_flag()?;
        if br.read_flag()? {
            let primaries = br.read_bits(8)? as u8;
            let transfer = br.read_bits(8)? as u8;
            let matrix = br.read_bits(8)? as u8;
            vui.colour_description = Some((primaries, transfer, matrix));
        }
    }

    // chroma_loc_info_present_flag
    if br.read_flag()? {
        br.read_ue_max(5, "chroma_sample_loc_type_top_field")?;
        br.read_ue_max(5, "chroma_sample_loc_type_bottom_field")?;
    }

    // timing_info_present_flag
    if br.read_flag()? {
        let num_units_in_tick = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        let fixed_frame_rate = br.read_flag()?;
        if num_units_in_tick == 0 || time_scale == 0 {
            return Err(LiuError::InvalidData(format!(
                "VUI 时间信息非法, num_units_in_tick={}, time_scale={}",
                num_units_in_tick, time_scale
            )));
        }
        vui.timing = Some(Timing {
            num_units_in_tick,
            time_scale,
            fixed_frame_rate,
        });
    }

    let nal_hrd = br.read_flag()?;
    if nal_hrd {
        skip_hrd_parameters(br)?;
    }
    let vcl_hrd = br.read_flag()?;
    if vcl_hrd {
        skip_hrd_parameters(br)?;
    }
    if nal_hrd || vcl_hrd {
        br.skip_bits(1)?; // low_delay_hrd_flag
    }
    vui.pic_struct_present = br.read_flag()?;

    // bitstream_restriction_flag
    if br.read_flag()? {
        br.skip_bits(1)?; // motion_vectors_over_pic_boundaries_flag
        br.read_ue_max(16, "max_bytes_per_pic_denom")?;
        br.read_ue_max(16, "max_bits_per_mb_denom")?;
        br.read_ue_max(16, "log2_max_mv_length_horizontal")?;
        br.read_ue_max(16, "log2_max_mv_length_vertical")?;
        vui.max_num_reorder_frames = Some(br.read_ue_max(16, "max_num_reorder_frames")?);
        vui.max_dec_frame_buffering = Some(br.read_ue_max(16, "max_dec_frame_buffering")?);
    }

    Ok(vui)
}

fn skip_hrd_parameters(br: &mut BitReader) -> LiuResult<()> {
    let cpb_cnt = br.read_ue_max(31, "cpb_cnt_minus1")? + 1;
    br.skip_bits(8)?; // bit_rate_scale + cpb_size_scale
    for _ in 0..cpb_cnt {
        br.read_ue()?; // bit_rate_value_minus1
        br.read_ue()?; // cpb_size_value_minus1
        br.skip_bits(1)?; // cbr_flag
    }
    // initial_cpb_removal_delay_length_minus1, cpb_removal_delay_length_minus1,
    // dpb_output_delay_length_minus1, time_offset_length
    br.skip_bits(20)
}
