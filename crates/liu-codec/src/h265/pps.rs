//! HEVC PPS (Picture Parameter Set) 解析器.

use liu_core::{BitReader, LiuError, LiuResult};

use super::sps::skip_scaling_list_data;

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pps {
    /// pps_pic_parameter_set_id
    pub pps_id: u32,
    /// pps_seq_parameter_set_id
    pub sps_id: u32,
    /// dependent_slice_segments_enabled_flag
    pub dependent_slice_segments_enabled: bool,
    /// output_flag_present_flag
    pub output_flag_present: bool,
    /// num_extra_slice_header_bits
    pub num_extra_slice_header_bits: u32,
    /// sign_data_hiding_enabled_flag
    pub sign_data_hiding: bool,
    /// cabac_init_present_flag
    pub cabac_init_present: bool,
    /// num_ref_idx_l0/l1_default_active
    pub num_ref_idx_default_active: [u32; 2],
    /// 26 + init_qp_minus26
    pub init_qp: i32,
    /// constrained_intra_pred_flag
    pub constrained_intra_pred: bool,
    /// transform_skip_enabled_flag
    pub transform_skip_enabled: bool,
    /// diff_cu_qp_delta_depth (cu_qp_delta_enabled_flag 为假时为 `None`)
    pub diff_cu_qp_delta_depth: Option<u32>,
    /// pps_cb_qp_offset / pps_cr_qp_offset
    pub chroma_qp_offsets: [i32; 2],
    /// pps_slice_chroma_qp_offsets_present_flag
    pub slice_chroma_qp_offsets_present: bool,
    /// weighted_pred_flag
    pub weighted_pred: bool,
    /// weighted_bipred_flag
    pub weighted_bipred: bool,
    /// transquant_bypass_enabled_flag
    pub transquant_bypass_enabled: bool,
    /// 分块信息 (tiles_enabled_flag 为假时为 `None`)
    pub tiles: Option<Tiles>,
    /// entropy_coding_sync_enabled_flag
    pub entropy_coding_sync_enabled: bool,
    /// pps_loop_filter_across_slices_enabled_flag
    pub loop_filter_across_slices_enabled: bool,
    /// deblocking_filter_override_enabled_flag
    pub deblocking_filter_override_enabled: bool,
    /// pps_deblocking_filter_disabled_flag
    pub deblocking_filter_disabled: bool,
    /// pps_beta_offset_div2 / pps_tc_offset_div2
    pub deblocking_offsets: [i32; 2],
    /// pps_scaling_list_data_present_flag
    pub scaling_list_present: bool,
    /// lists_modification_present_flag
    pub lists_modification_present: bool,
    /// log2_parallel_merge_level
    pub log2_parallel_merge_level: u32,
    /// slice_segment_header_extension_present_flag
    pub slice_segment_header_extension_present: bool,
    /// chroma_qp_offset_list_enabled_flag (range extension)
    pub chroma_qp_offset_list_enabled: bool,
}

/// 分块 (tile) 划分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiles {
    /// num_tile_columns_minus1 + 1
    pub columns: u32,
    /// num_tile_rows_minus1 + 1
    pub rows: u32,
    /// uniform_spacing_flag
    pub uniform_spacing: bool,
    /// loop_filter_across_tiles_enabled_flag
    pub loop_filter_across_tiles: bool,
}

/// 从 NAL 载荷解析 PPS
pub fn parse_pps(br: &mut BitReader) -> LiuResult<Pps> {
    parse_pps_fields(br).map_err(|e| e.into_parameter_set_error("HEVC PPS"))
}

fn parse_pps_fields(br: &mut BitReader) -> LiuResult<Pps> {
    let pps_id = br.read_ue_max(63, "pps_pic_parameter_set_id")?;
    let sps_id = br.read_ue_max(15, "pps_seq_parameter_set_id")?;
    let dependent_slice_segments_enabled = br.read_flag()?;
    let output_flag_present = br.read_flag()?;
    let num_extra_slice_header_bits = br.read_bits(3)?;
    let sign_data_hiding = br.read_flag()?;
    let cabac_init_present = br.read_flag()?;
    let num_ref_idx_default_active = [
        br.read_ue_max(14, "num_ref_idx_l0_default_active_minus1")? + 1,
        br.read_ue_max(14, "num_ref_idx_l1_default_active_minus1")? + 1,
    ];
    let init_qp = 26 + br.read_se_range(-62, 25, "init_qp_minus26")?;
    let constrained_intra_pred = br.read_flag()?;
    let transform_skip_enabled = br.read_flag()?;
    let diff_cu_qp_delta_depth = if br.read_flag()? {
        Some(br.read_ue_max(3, "diff_cu_qp_delta_depth")?)
    } else {
        None
    };
    let chroma_qp_offsets = [
        br.read_se_range(-12, 12, "pps_cb_qp_offset")?,
        br.read_se_range(-12, 12, "pps_cr_qp_offset")?,
    ];
    let slice_chroma_qp_offsets_present = br.read_flag()?;
    let weighted_pred = br.read_flag()?;
    let weighted_bipred = br.read_flag()?;
    let transquant_bypass_enabled = br.read_flag()?;
    let tiles_enabled = br.read_flag()?;
    let entropy_coding_sync_enabled = br.read_flag()?;

    let tiles = if tiles_enabled {
        let columns = br.read_ue_max(19, "num_tile_columns_minus1")? + 1;
        let rows = br.read_ue_max(21, "num_tile_rows_minus1")? + 1;
        let uniform_spacing = br.read_flag()?;
        if !uniform_spacing {
            for _ in 1..columns {
                br.read_ue()?; // column_width_minus1
            }
            for _ in 1..rows {
                br.read_ue()?; // row_height_minus1
            }
        }
        let loop_filter_across_tiles = br.read_flag()?;
        Some(Tiles {
            columns,
            rows,
            uniform_spacing,
            loop_filter_across_tiles,
        })
    } else {
        None
    };

    let loop_filter_across_slices_enabled = br.read_flag()?;

    let mut deblocking_filter_override_enabled = false;
    let mut deblocking_filter_disabled = false;
    let mut deblocking_offsets = [0; 2];
    if br.read_flag()? {
        deblocking_filter_override_enabled = br.read_flag()?;
        deblocking_filter_disabled = br.read_flag()?;
        if !deblocking_filter_disabled {
            deblocking_offsets = [
                br.read_se_range(-6, 6, "pps_beta_offset_div2")?,
                br.read_se_range(-6, 6, "pps_tc_offset_div2")?,
            ];
        }
    }

    let scaling_list_present = br.read_flag()?;
    if scaling_list_present {
        skip_scaling_list_data(br)?;
    }
    let lists_modification_present = br.read_flag()?;
    let log2_parallel_merge_level = br.read_ue_max(4, "log2_parallel_merge_level_minus2")? + 2;
    let slice_segment_header_extension_present = br.read_flag()?;

    let mut chroma_qp_offset_list_enabled = false;
    if br.read_flag()? {
        let range_extension = br.read_flag()?;
        let multilayer_extension = br.read_flag()?;
        let extension_3d = br.read_flag()?;
        let scc_extension = br.read_flag()?;
        br.skip_bits(4)?; // pps_extension_4bits
        if multilayer_extension || extension_3d || scc_extension {
            return Err(LiuError::InvalidData(format!(
                "不支持的 PPS 扩展, multilayer={}, 3d={}, scc={}",
                multilayer_extension, extension_3d, scc_extension
            )));
        }
        if range_extension {
            if transform_skip_enabled {
                br.read_ue()?; // log2_max_transform_skip_block_size_minus2
            }
            br.skip_bits(1)?; // cross_component_prediction_enabled_flag
            chroma_qp_offset_list_enabled = br.read_flag()?;
            if chroma_qp_offset_list_enabled {
                br.read_ue()?; // diff_cu_chroma_qp_offset_depth
                let len = br.read_ue_max(5, "chroma_qp_offset_list_len_minus1")? + 1;
                for _ in 0..len {
                    br.read_se()?; // cb_qp_offset_list
                    br.read_se()?; // cr_qp_offset_list
                }
            }
            br.read_ue()?; // log2_sao_offset_scale_luma
            br.read_ue()?; // log2_sao_offset_scale_chroma
        }
    }

    Ok(Pps {
        pps_id,
        sps_id,
        dependent_slice_segments_enabled,
        output_flag_present,
        num_extra_slice_header_bits,
        sign_data_hiding,
        cabac_init_present,
        num_ref_idx_default_active,
        init_qp,
        constrained_intra_pred,
        transform_skip_enabled,
        diff_cu_qp_delta_depth,
        chroma_qp_offsets,
        slice_chroma_qp_offsets_present,
        weighted_pred,
        weighted_bipred,
        transquant_bypass_enabled,
        tiles,
        entropy_coding_sync_enabled,
        loop_filter_across_slices_enabled,
        deblocking_filter_override_enabled,
        deblocking_filter_disabled,
        deblocking_offsets,
        scaling_list_present,
        lists_modification_present,
        log2_parallel_merge_level,
        slice_segment_header_extension_present,
        chroma_qp_offset_list_enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h265::test_util::{PpsBuilder, pps_payload};

    #[test]
    fn test_parse_default_pps() {
        let payload = pps_payload(&PpsBuilder::default());
        let pps = parse_pps(&mut BitReader::new(&payload)).unwrap();
        assert_eq!(pps.pps_id, 0);
        assert_eq!(pps.sps_id, 0);
        assert_eq!(pps.num_ref_idx_default_active, [1, 1]);
        assert_eq!(pps.init_qp, 26);
        assert!(pps.tiles.is_none());
        assert!(!pps.lists_modification_present);
        assert_eq!(pps.log2_parallel_merge_level, 2);
    }

    #[test]
    fn test_parse_pps_with_tiles_and_modification() {
        let payload = pps_payload(&PpsBuilder {
            pps_id: 3,
            tiles: Some((2, 2)),
            lists_modification_present: true,
            num_ref_idx_default_active: [2, 1],
            ..PpsBuilder::default()
        });
        let pps = parse_pps(&mut BitReader::new(&payload)).unwrap();
        assert_eq!(pps.pps_id, 3);
        let tiles = pps.tiles.unwrap();
        assert_eq!((tiles.columns, tiles.rows), (2, 2));
        assert!(tiles.uniform_spacing);
        assert!(pps.lists_modification_present);
        assert_eq!(pps.num_ref_idx_default_active, [2, 1]);
    }

    #[test]
    fn test_reject_out_of_range_pps_id() {
        let payload = pps_payload(&PpsBuilder {
            pps_id: 64,
            ..PpsBuilder::default()
        });
        let err = parse_pps(&mut BitReader::new(&payload)).unwrap_err();
        assert!(matches!(err, LiuError::ParameterSetSyntax(_)), "{err}");
        assert!(err.to_string().contains("pps_pic_parameter_set_id"));
    }
}
