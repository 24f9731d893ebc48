//! H.264 PPS (Picture Parameter Set) 解析器.
//!
//! PPS 自身与 SPS 基本独立, 唯一的例外是 8x8 量化矩阵的个数取决于所引用
//! SPS 的 chroma_format_idc. 只有在实际出现该字段时才查询 SPS.

use liu_core::{BitReader, LiuError, LiuResult};

use super::sps::{Sps, skip_scaling_list};
use crate::param_set::ParameterSetStore;

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// 引用的 seq_parameter_set_id
    pub sps_id: u32,
    /// entropy_coding_mode_flag (CABAC)
    pub entropy_coding_mode: bool,
    /// bottom_field_pic_order_in_frame_present_flag
    pub bottom_field_pic_order_in_frame_present: bool,
    /// num_slice_groups_minus1 + 1
    pub num_slice_groups: u32,
    /// slice_group_map_type
    pub slice_group_map_type: u32,
    /// slice_group_change_rate_minus1 + 1 (map type 3..=5)
    pub slice_group_change_rate: u32,
    /// num_ref_idx_l0_default_active_minus1 + 1
    pub num_ref_idx_l0_default_active: u32,
    /// num_ref_idx_l1_default_active_minus1 + 1
    pub num_ref_idx_l1_default_active: u32,
    /// weighted_pred_flag
    pub weighted_pred: bool,
    /// weighted_bipred_idc
    pub weighted_bipred_idc: u32,
    /// 26 + pic_init_qp_minus26
    pub pic_init_qp: i32,
    /// 26 + pic_init_qs_minus26
    pub pic_init_qs: i32,
    /// chroma_qp_index_offset
    pub chroma_qp_index_offset: i32,
    /// deblocking_filter_control_present_flag
    pub deblocking_filter_control_present: bool,
    /// constrained_intra_pred_flag
    pub constrained_intra_pred: bool,
    /// redundant_pic_cnt_present_flag
    pub redundant_pic_cnt_present: bool,
    /// transform_8x8_mode_flag
    pub transform_8x8_mode: bool,
    /// pic_scaling_matrix_present_flag
    pub scaling_matrix_present: bool,
    /// second_chroma_qp_index_offset
    pub second_chroma_qp_index_offset: i32,
}

/// 从 NAL 载荷解析 PPS
///
/// `sps_store` 只在 PPS 带 8x8 量化矩阵时使用; 此时引用的 SPS 不存在会返回
/// `UnknownParameterSet`.
pub fn parse_pps(br: &mut BitReader, sps_store: &ParameterSetStore<Sps>) -> LiuResult<Pps> {
    parse_pps_fields(br, sps_store).map_err(|e| e.into_parameter_set_error("H.264 PPS"))
}

fn parse_pps_fields(br: &mut BitReader, sps_store: &ParameterSetStore<Sps>) -> LiuResult<Pps> {
    let pps_id = br.read_ue_max(255, "pic_parameter_set_id")?;
    let sps_id = br.read_ue_max(31, "seq_parameter_set_id")?;
    let entropy_coding_mode = br.read_flag()?;
    let bottom_field_pic_order_in_frame_present = br.read_flag()?;

    let num_slice_groups = br.read_ue_max(7, "num_slice_groups_minus1")? + 1;
    let mut slice_group_map_type = 0;
    let mut slice_group_change_rate = 1;
    if num_slice_groups > 1 {
        slice_group_map_type = br.read_ue_max(6, "slice_group_map_type")?;
        match slice_group_map_type {
            0 => {
                for _ in 0..num_slice_groups {
                    br.read_ue()?; // run_length_minus1
                }
            }
            2 => {
                for _ in 1..num_slice_groups {
                    br.read_ue()?; // top_left
                    br.read_ue()?; // bottom_right
                }
            }
            3..=5 => {
                br.skip_bits(1)?; // slice_group_change_direction_flag
                slice_group_change_rate = br.read_ue()?.saturating_add(1);
            }
            6 => {
                let pic_size_in_map_units = br.read_ue()?.saturating_add(1);
                let bits = ceil_log2(num_slice_groups);
                for _ in 0..pic_size_in_map_units {
                    br.skip_bits(bits)?; // slice_group_id
                }
            }
            _ => {}
        }
    }

    let num_ref_idx_l0_default_active =
        br.read_ue_max(31, "num_ref_idx_l0_default_active_minus1")? + 1;
    let num_ref_idx_l1_default_active =
        br.read_ue_max(31, "num_ref_idx_l1_default_active_minus1")? + 1;
    let weighted_pred = br.read_flag()?;
    let weighted_bipred_idc = br.read_bits(2)?;
    if weighted_bipred_idc > 2 {
        return Err(LiuError::InvalidData(format!(
            "weighted_bipred_idc 非法, value={}",
            weighted_bipred_idc
        )));
    }
    let pic_init_qp = 26 + br.read_se_range(-26, 25, "pic_init_qp_minus26")?;
    let pic_init_qs = 26 + br.read_se_range(-26, 25, "pic_init_qs_minus26")?;
    let chroma_qp_index_offset = br.read_se_range(-12, 12, "chroma_qp_index_offset")?;
    let deblocking_filter_control_present = br.read_flag()?;
    let constrained_intra_pred = br.read_flag()?;
    let redundant_pic_cnt_present = br.read_flag()?;

    let mut transform_8x8_mode = false;
    let mut scaling_matrix_present = false;
    let mut second_chroma_qp_index_offset = chroma_qp_index_offset;

    if br.more_rbsp_data() {
        transform_8x8_mode = br.read_flag()?;
        scaling_matrix_present = br.read_flag()?;
        if scaling_matrix_present {
            let lists_8x8 = if transform_8x8_mode {
                // 8x8 矩阵个数依赖 SPS 的色度格式
                let sps = sps_store.require(sps_id)?;
                if sps.chroma_format_idc == 3 { 6 } else { 2 }
            } else {
                0
            };
            for idx in 0..6 + lists_8x8 {
                if br.read_flag()? {
                    skip_scaling_list(br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
        second_chroma_qp_index_offset =
            br.read_se_range(-12, 12, "second_chroma_qp_index_offset")?;
    }

    Ok(Pps {
        pps_id,
        sps_id,
        entropy_coding_mode,
        bottom_field_pic_order_in_frame_present,
        num_slice_groups,
        slice_group_map_type,
        slice_group_change_rate,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        weighted_pred,
        weighted_bipred_idc,
        pic_init_qp,
        pic_init_qs,
        chroma_qp_index_offset,
        deblocking_filter_control_present,
        constrained_intra_pred,
        redundant_pic_cnt_present,
        transform_8x8_mode,
        scaling_matrix_present,
        second_chroma_qp_index_offset,
    })
}

/// Ceil(Log2(n))
pub(crate) fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}
