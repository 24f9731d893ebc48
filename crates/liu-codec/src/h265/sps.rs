//! HEVC SPS (Sequence Parameter Set) 解析器.
//!
//! 除尺寸/位深/VUI 等基本信息外, 还保留条带头解析与参考图像集跟踪
//! 所需的全部字段 (短期参考集合列表, 长期参考候选, CTB 尺寸等).

use liu_core::{BitReader, LiuError, LiuResult, Rational};
use log::warn;

use super::rps::{ShortTermRps, parse_short_term_rps};
use super::vps::{ProfileTierLevel, parse_profile_tier_level, parse_sub_layer_ordering};
use crate::h264::sps::SAR_TABLE;

/// SPS 中的短期参考集合上限
const MAX_SHORT_TERM_RPS: u32 = 64;
/// SPS 中的长期参考候选上限
const MAX_LONG_TERM_REF_PICS_SPS: u32 = 32;

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// sps_video_parameter_set_id
    pub vps_id: u32,
    /// sps_max_sub_layers_minus1 + 1
    pub max_sub_layers: u32,
    /// sps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile_tier_level
    pub ptl: ProfileTierLevel,
    /// sps_seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// pic_width_in_luma_samples
    pub pic_width: u32,
    /// pic_height_in_luma_samples
    pub pic_height: u32,
    /// conformance_window 偏移 (左, 右, 上, 下), 单位为色度采样
    pub conformance_window: [u32; 4],
    /// 图像宽度 (像素, 已裁剪)
    pub width: u32,
    /// 图像高度 (像素, 已裁剪)
    pub height: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// log2(MaxPicOrderCntLsb)
    pub log2_max_poc_lsb: u32,
    /// 每个子层的 (max_dec_pic_buffering, max_num_reorder_pics, max_latency_increase)
    pub sub_layer_ordering: Vec<(u32, u32, u32)>,
    /// log2_min_luma_coding_block_size
    pub log2_min_cb_size: u32,
    /// CtbLog2SizeY
    pub log2_ctb_size: u32,
    /// log2_min_luma_transform_block_size
    pub log2_min_tb_size: u32,
    /// log2_max_luma_transform_block_size
    pub log2_max_tb_size: u32,
    /// scaling_list_enabled_flag
    pub scaling_list_enabled: bool,
    /// amp_enabled_flag
    pub amp_enabled: bool,
    /// sample_adaptive_offset_enabled_flag
    pub sao_enabled: bool,
    /// pcm_enabled_flag
    pub pcm_enabled: bool,
    /// 短期参考图像集列表
    pub short_term_rps: Vec<ShortTermRps>,
    /// long_term_ref_pics_present_flag
    pub long_term_ref_pics_present: bool,
    /// (lt_ref_pic_poc_lsb_sps, used_by_curr_pic_lt_sps_flag)
    pub long_term_ref_pics: Vec<(u32, bool)>,
    /// sps_temporal_mvp_enabled_flag
    pub temporal_mvp_enabled: bool,
    /// strong_intra_smoothing_enabled_flag
    pub strong_intra_smoothing: bool,
    /// VUI; 不存在或解析失败时为 `None`
    pub vui: Option<Vui>,
    /// sps_range_extension_flag
    pub range_extension: bool,
}

/// HEVC VUI 参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vui {
    /// 像素宽高比
    pub sar: Option<Rational>,
    /// video_full_range_flag
    pub full_range: bool,
    /// colour_primaries / transfer_characteristics / matrix_coefficients
    pub colour_description: Option<(u8, u8, u8)>,
    /// field_seq_flag
    pub field_seq: bool,
    /// frame_field_info_present_flag
    pub frame_field_info_present: bool,
    /// default display window (左, 右, 上, 下)
    pub default_display_window: Option<[u32; 4]>,
    /// vui_num_units_in_tick / vui_time_scale
    pub timing: Option<(u32, u32)>,
    /// vui_num_ticks_poc_diff_one_minus1 + 1
    pub num_ticks_poc_diff_one: Option<u32>,
}

impl Sps {
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

    /// CTB 尺寸 (像素)
    pub fn ctb_size(&self) -> u32 {
        1 << self.log2_ctb_size
    }

    /// PicSizeInCtbsY
    pub fn pic_size_in_ctbs(&self) -> u32 {
        let ctb = self.ctb_size();
        self.pic_width.div_ceil(ctb) * self.pic_height.div_ceil(ctb)
    }

    /// 最高子层的 DPB 容量 (sps_max_dec_pic_buffering)
    pub fn dpb_capacity(&self) -> usize {
        self.sub_layer_ordering
            .last()
            .map_or(1, |&(buffering, _, _)| buffering as usize)
    }

    /// 帧率: time_scale / num_units_in_tick
    pub fn fps(&self) -> Option<Rational> {
        let (num_units_in_tick, time_scale) = self.vui.as_ref()?.timing?;
        let fps = Rational::new(time_scale, num_units_in_tick);
        fps.is_valid().then(|| fps.reduce())
    }
}

/// 从 NAL 载荷解析 SPS
pub fn parse_sps(br: &mut BitReader) -> LiuResult<Sps> {
    parse_sps_fields(br).map_err(|e| e.into_parameter_set_error("HEVC SPS"))
}

fn parse_sps_fields(br: &mut BitReader) -> LiuResult<Sps> {
    let vps_id = br.read_bits(4)?;
    let max_sub_layers_minus1 = br.read_bits(3)?;
    if max_sub_layers_minus1 > 6 {
        return Err(LiuError::InvalidData(format!(
            "sps_max_sub_layers_minus1 超出范围, value={}",
            max_sub_layers_minus1
        )));
    }
    let temporal_id_nesting = br.read_flag()?;
    let ptl = parse_profile_tier_level(br, true, max_sub_layers_minus1)?;

    let sps_id = br.read_ue_max(15, "sps_seq_parameter_set_id")?;
    let chroma_format_idc = br.read_ue_max(3, "chroma_format_idc")?;
    let separate_colour_plane = chroma_format_idc == 3 && br.read_flag()?;

    let pic_width = br.read_ue_max(16888, "pic_width_in_luma_samples")?;
    let pic_height = br.read_ue_max(16888, "pic_height_in_luma_samples")?;
    if pic_width == 0 || pic_height == 0 {
        return Err(LiuError::InvalidData(format!(
            "图像尺寸非法, {}x{}",
            pic_width, pic_height
        )));
    }

    let mut conformance_window = [0u32; 4];
    if br.read_flag()? {
        for value in conformance_window.iter_mut() {
            *value = br.read_ue()?;
        }
    }
    let chroma_array_type = if separate_colour_plane { 0 } else { chroma_format_idc };
    let sub_width = if matches!(chroma_array_type, 1 | 2) { 2 } else { 1 };
    let sub_height = if chroma_array_type == 1 { 2 } else { 1 };
    let crop_x = (u64::from(conformance_window[0]) + u64::from(conformance_window[1])) * sub_width;
    let crop_y = (u64::from(conformance_window[2]) + u64::from(conformance_window[3])) * sub_height;
    if crop_x >= u64::from(pic_width) || crop_y >= u64::from(pic_height) {
        return Err(LiuError::InvalidData(format!(
            "conformance window 非法, raw={}x{}, crop_x={}, crop_y={}",
            pic_width, pic_height, crop_x, crop_y
        )));
    }
    let width = pic_width - crop_x as u32;
    let height = pic_height - crop_y as u32;

    let bit_depth_luma = br.read_ue_max(8, "bit_depth_luma_minus8")? + 8;
    let bit_depth_chroma = br.read_ue_max(8, "bit_depth_chroma_minus8")? + 8;
    let log2_max_poc_lsb = br.read_ue_max(12, "log2_max_pic_order_cnt_lsb_minus4")? + 4;

    let sub_layer_ordering = parse_sub_layer_ordering(br, max_sub_layers_minus1)?;

    let log2_min_cb_size = br.read_ue_max(3, "log2_min_luma_coding_block_size_minus3")? + 3;
    let log2_ctb_size =
        log2_min_cb_size + br.read_ue_max(3, "log2_diff_max_min_luma_coding_block_size")?;
    if log2_ctb_size > 6 {
        return Err(LiuError::InvalidData(format!(
            "CTB 尺寸超出范围, log2={}",
            log2_ctb_size
        )));
    }
    let log2_min_tb_size = br.read_ue_max(3, "log2_min_luma_transform_block_size_minus2")? + 2;
    let log2_max_tb_size =
        log2_min_tb_size + br.read_ue_max(3, "log2_diff_max_min_luma_transform_block_size")?;
    br.read_ue()?; // max_transform_hierarchy_depth_inter
    br.read_ue()?; // max_transform_hierarchy_depth_intra

    let scaling_list_enabled = br.read_flag()?;
    if scaling_list_enabled && br.read_flag()? {
        skip_scaling_list_data(br)?;
    }

    let amp_enabled = br.read_flag()?;
    let sao_enabled = br.read_flag()?;
    let pcm_enabled = br.read_flag()?;
    if pcm_enabled {
        br.skip_bits(8)?; // pcm_sample_bit_depth_luma/chroma_minus1
        br.read_ue()?; // log2_min_pcm_luma_coding_block_size_minus3
        br.read_ue()?; // log2_diff_max_min_pcm_luma_coding_block_size
        br.skip_bits(1)?; // pcm_loop_filter_disabled_flag
    }

    let num_short_term_rps = br.read_ue_max(MAX_SHORT_TERM_RPS, "num_short_term_ref_pic_sets")?;
    let mut short_term_rps = Vec::with_capacity(num_short_term_rps as usize);
    for idx in 0..num_short_term_rps as usize {
        let rps = parse_short_term_rps(br, idx, num_short_term_rps as usize, &short_term_rps)?;
        short_term_rps.push(rps);
    }

    let long_term_ref_pics_present = br.read_flag()?;
    let mut long_term_ref_pics = Vec::new();
    if long_term_ref_pics_present {
        let count = br.read_ue_max(MAX_LONG_TERM_REF_PICS_SPS, "num_long_term_ref_pics_sps")?;
        for _ in 0..count {
            let poc_lsb = br.read_bits(log2_max_poc_lsb)?;
            let used = br.read_flag()?;
            long_term_ref_pics.push((poc_lsb, used));
        }
    }

    let temporal_mvp_enabled = br.read_flag()?;
    let strong_intra_smoothing = br.read_flag()?;

    let mut vui = None;
    let mut vui_broken = false;
    if br.read_flag()? {
        match parse_vui(br, max_sub_layers_minus1) {
            Ok(parsed) => vui = Some(parsed),
            Err(err) => {
                warn!("HEVC SPS: id={} VUI 解析失败, 忽略 VUI 及扩展: {}", sps_id, err);
                vui_broken = true;
            }
        }
    }
    // VUI 损坏后无法定位扩展字段
    let mut range_extension = false;
    if !vui_broken && br.read_flag()? {
        range_extension = br.read_flag()?;
    }

    Ok(Sps {
        vps_id,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting,
        ptl,
        sps_id,
        chroma_format_idc,
        separate_colour_plane,
        pic_width,
        pic_height,
        conformance_window,
        width,
        height,
        bit_depth_luma,
        bit_depth_chroma,
        log2_max_poc_lsb,
        sub_layer_ordering,
        log2_min_cb_size,
        log2_ctb_size,
        log2_min_tb_size,
        log2_max_tb_size,
        scaling_list_enabled,
        amp_enabled,
        sao_enabled,
        pcm_enabled,
        short_term_rps,
        long_term_ref_pics_present,
        long_term_ref_pics,
        temporal_mvp_enabled,
        strong_intra_smoothing,
        vui,
        range_extension,
    })
}

/// 跳过 scaling_list_data() (SPS/PPS 共用)
pub(crate) fn skip_scaling_list_data(br: &mut BitReader) -> LiuResult<()> {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for matrix_id in (0..6u32).step_by(step) {
            if !br.read_flag()? {
                // scaling_list_pred_matrix_id_delta
                let max_delta = if size_id == 3 { matrix_id / 3 } else { matrix_id };
                br.read_ue_max(max_delta, "scaling_list_pred_matrix_id_delta")?;
                continue;
            }
            let coef_num = 64.min(1 << (4 + (size_id << 1)));
            if size_id > 1 {
                br.read_se_range(-7, 247, "scaling_list_dc_coef_minus8")?;
            }
            for _ in 0..coef_num {
                br.read_se_range(-128, 127, "scaling_list_delta_coef")?;
            }
        }
    }
    Ok(())
}

/// 解析 VUI 参数
fn parse_vui(br: &mut BitReader, max_sub_layers_minus1: u32) -> LiuResult<Vui> {
    let mut vui = Vui::default();

    // aspect_ratio_info_present_flag
    if br.read_flag()? {
        let ar_idc = br.read_bits(8)? as usize;
        if ar_idc == 255 {
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
        br.skip_bits(1)?;
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

    br.skip_bits(1)?; // neutral_chroma_indication_flag
    vui.field_seq = br.read_flag()?;
    vui.frame_field_info_present = br.read_flag()?;

    // default_display_window_flag
    if br.read_flag()? {
        let mut window = [0u32; 4];
        for value in window.iter_mut() {
            *value = br.read_ue()?;
        }
        vui.default_display_window = Some(window);
    }

    // vui_timing_info_present_flag
    if br.read_flag()? {
        let num_units_in_tick = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        if num_units_in_tick == 0 || time_scale == 0 {
            return Err(LiuError::InvalidData(format!(
                "VUI 时间信息非法, num_units_in_tick={}, time_scale={}",
                num_units_in_tick, time_scale
            )));
        }
        vui.timing = Some((num_units_in_tick, time_scale));
        if br.read_flag()? {
            vui.num_ticks_poc_diff_one = Some(br.read_ue()?.saturating_add(1));
        }
        if br.read_flag()? {
            skip_hrd_parameters(br, true, max_sub_layers_minus1)?;
        }
    }

    // bitstream_restriction_flag
    if br.read_flag()? {
        br.skip_bits(3)?; // tiles_fixed / mvs_over_pic_boundaries / restricted_ref_pic_lists
        br.read_ue_max(4095, "min_spatial_segmentation_idc")?;
        br.read_ue_max(16, "max_bytes_per_pic_denom")?;
        br.read_ue_max(16, "max_bits_per_min_cu_denom")?;
        br.read_ue_max(15, "log2_max_mv_length_horizontal")?;
        br.read_ue_max(15, "log2_max_mv_length_vertical")?;
    }

    Ok(vui)
}

/// 跳过 hrd_parameters(commonInfPresentFlag, maxNumSubLayersMinus1)
fn skip_hrd_parameters(
    br: &mut BitReader,
    common_inf_present: bool,
    max_sub_layers_minus1: u32,
) -> LiuResult<()> {
    let mut nal_hrd = false;
    let mut vcl_hrd = false;
    let mut sub_pic_params = false;
    if common_inf_present {
        nal_hrd = br.read_flag()?;
        vcl_hrd = br.read_flag()?;
        if nal_hrd || vcl_hrd {
            sub_pic_params = br.read_flag()?;
            if sub_pic_params {
                br.skip_bits(19)?; // tick_divisor .. dpb_output_delay_du_length
            }
            br.skip_bits(8)?; // bit_rate_scale + cpb_size_scale
            if sub_pic_params {
                br.skip_bits(4)?; // cpb_size_du_scale
            }
            br.skip_bits(15)?; // 三个 delay length
        }
    }

    for _ in 0..=max_sub_layers_minus1 {
        let fixed_general = br.read_flag()?;
        let fixed_within_cvs = fixed_general || br.read_flag()?;
        let mut low_delay = false;
        if fixed_within_cvs {
            br.read_ue_max(2047, "elemental_duration_in_tc_minus1")?;
        } else {
            low_delay = br.read_flag()?;
        }
        let cpb_cnt = if low_delay {
            1
        } else {
            br.read_ue_max(31, "cpb_cnt_minus1")? + 1
        };
        for present in [nal_hrd, vcl_hrd] {
            if !present {
                continue;
            }
            for _ in 0..cpb_cnt {
                br.read_ue()?; // bit_rate_value_minus1
                br.read_ue()?; // cpb_size_value_minus1
                if sub_pic_params {
                    br.read_ue()?;
                    br.read_ue()?;
                }
                br.skip_bits(1)?; // cbr_flag
            }
        }
    }
    Ok(())
}
