//! HEVC 条带段头解析.
//!
//! 独立条带段携带完整的条带头; 依赖条带段 (dependent_slice_segment_flag) 只携带
//! 地址与入口点, 其余字段沿用同一图像中前一个独立条带段.

use liu_core::{BitReader, LiuError, LiuResult};

use super::nal::{NalHeader, NalUnitType};
use super::pps::Pps;
use super::rps::{ShortTermRps, parse_short_term_rps};
use super::sps::Sps;
use crate::h264::pps::ceil_log2;
use crate::param_set::ParameterSetStore;
use crate::picture::SliceType;

/// 长期参考图像的候选项上限
const MAX_LONG_TERM_PICS: u32 = 32;

/// 条带头中声明的一个长期参考图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongTermEntry {
    /// PocLsbLt
    pub poc_lsb: u32,
    /// UsedByCurrPicLt
    pub used_by_curr: bool,
    /// DeltaPocMsbCycleLt (已累加); delta_poc_msb_present_flag 为假时为 `None`
    pub delta_poc_msb_cycle: Option<u32>,
}

/// 条带段头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSegmentHeader {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// first_slice_segment_in_pic_flag
    pub first_slice_segment_in_pic: bool,
    /// no_output_of_prior_pics_flag (仅 IRAP)
    pub no_output_of_prior_pics: bool,
    /// slice_pic_parameter_set_id
    pub pps_id: u32,
    /// 由 PPS 得到的 SPS id
    pub sps_id: u32,
    /// dependent_slice_segment_flag
    pub dependent: bool,
    /// slice_segment_address
    pub segment_address: u32,
    /// 独立条带段的条带头; 依赖条带段为 `None`
    pub slice: Option<SliceHeader>,
    /// entry_point_offset_minus1[] + 1
    pub entry_point_offsets: Vec<u32>,
    /// slice_segment_header_extension_length
    pub extension_length: u32,
    /// 条带段头占用的比特数 (不含 NAL 头)
    pub header_bits: usize,
}

/// 独立条带段中的条带头字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    /// 条带类型
    pub slice_type: SliceType,
    /// pic_output_flag
    pub pic_output: bool,
    /// colour_plane_id
    pub colour_plane_id: Option<u8>,
    /// slice_pic_order_cnt_lsb (IDR 为 0)
    pub pic_order_cnt_lsb: u32,
    /// 生效的短期参考图像集
    pub short_term_rps: ShortTermRps,
    /// short_term_ref_pic_set_idx; 集合写在条带头中时为 `None`
    pub short_term_rps_idx: Option<u32>,
    /// 条带头中 st_ref_pic_set() 占用的比特数
    pub short_term_rps_bits: usize,
    /// 长期参考图像
    pub long_term: Vec<LongTermEntry>,
    /// slice_temporal_mvp_enabled_flag
    pub temporal_mvp_enabled: bool,
    /// slice_sao_luma_flag
    pub sao_luma: bool,
    /// slice_sao_chroma_flag
    pub sao_chroma: bool,
    /// num_ref_idx_l0/l1_active (I 条带为 0)
    pub num_ref_idx_active: [u32; 2],
    /// list_entry_l0[]
    pub list_entry_l0: Option<Vec<u32>>,
    /// list_entry_l1[]
    pub list_entry_l1: Option<Vec<u32>>,
    /// mvd_l1_zero_flag
    pub mvd_l1_zero: bool,
    /// cabac_init_flag
    pub cabac_init: bool,
    /// collocated_from_l0_flag
    pub collocated_from_l0: bool,
    /// collocated_ref_idx
    pub collocated_ref_idx: u32,
    /// 是否携带 pred_weight_table
    pub has_pred_weight_table: bool,
    /// MaxNumMergeCand
    pub max_num_merge_cand: u32,
    /// slice_qp_delta
    pub slice_qp_delta: i32,
    /// slice_cb_qp_offset / slice_cr_qp_offset
    pub chroma_qp_offsets: [i32; 2],
    /// cu_chroma_qp_offset_enabled_flag
    pub cu_chroma_qp_offset_enabled: bool,
    /// slice_deblocking_filter_disabled_flag
    pub deblocking_filter_disabled: bool,
    /// slice_beta_offset_div2 / slice_tc_offset_div2
    pub deblocking_offsets: [i32; 2],
    /// slice_loop_filter_across_slices_enabled_flag
    pub loop_filter_across_slices: bool,
}

impl SliceHeader {
    /// NumPicTotalCurr
    pub fn num_pic_total_curr(&self) -> u32 {
        let long_term = self.long_term.iter().filter(|e| e.used_by_curr).count();
        (self.short_term_rps.num_used_by_curr() + long_term) as u32
    }
}

impl SliceSegmentHeader {
    /// 是否为 IRAP 条带
    pub fn is_irap(&self) -> bool {
        self.nal_type.is_irap()
    }

    /// 使用给定的 SPS/PPS 解析条带段头
    ///
    /// `br` 位于条带载荷起点 (NAL 头之后). 条带中的 pps_id 必须与 `pps` 一致.
    pub fn parse_with(br: &mut BitReader, nal: &NalHeader, sps: &Sps, pps: &Pps) -> LiuResult<Self> {
        parse_fields(br, nal, sps, pps).map_err(|e| e.into_slice_error("HEVC slice"))
    }
}

/// 解析条带段头, 从存储中查找所引用的 PPS 与 SPS
pub fn parse_slice_segment_header(
    br: &mut BitReader,
    nal: &NalHeader,
    sps_store: &ParameterSetStore<Sps>,
    pps_store: &ParameterSetStore<Pps>,
) -> LiuResult<SliceSegmentHeader> {
    let pps_id = peek_pps_id(br, nal).map_err(|e| e.into_slice_error("HEVC slice"))?;
    let pps = pps_store.require(pps_id)?;
    let sps = sps_store.require(pps.sps_id)?;
    SliceSegmentHeader::parse_with(br, nal, sps, pps)
}

/// 不移动读取器, 读出条带引用的 pps_id
fn peek_pps_id(br: &BitReader, nal: &NalHeader) -> LiuResult<u32> {
    let mut probe = br.clone();
    probe.skip_bits(1)?; // first_slice_segment_in_pic_flag
    if nal.nal_type.is_irap() {
        probe.skip_bits(1)?; // no_output_of_prior_pics_flag
    }
    probe.read_ue_max(63, "slice_pic_parameter_set_id")
}

fn parse_fields(
    br: &mut BitReader,
    nal: &NalHeader,
    sps: &Sps,
    pps: &Pps,
) -> LiuResult<SliceSegmentHeader> {
    let start_bits = br.bits_read();
    let first_slice_segment_in_pic = br.read_flag()?;
    let no_output_of_prior_pics = nal.nal_type.is_irap() && br.read_flag()?;
    let pps_id = br.read_ue_max(63, "slice_pic_parameter_set_id")?;
    if pps_id != pps.pps_id || pps.sps_id != sps.sps_id {
        return Err(LiuError::InvalidArgument(format!(
            "条带引用 PPS id={}, 传入的 PPS id={} (SPS id={}/{})",
            pps_id, pps.pps_id, pps.sps_id, sps.sps_id
        )));
    }

    let mut dependent = false;
    let mut segment_address = 0;
    if !first_slice_segment_in_pic {
        if pps.dependent_slice_segments_enabled {
            dependent = br.read_flag()?;
        }
        let pic_size = sps.pic_size_in_ctbs();
        segment_address = br.read_bits(ceil_log2(pic_size))?;
        if segment_address == 0 || segment_address >= pic_size {
            return Err(LiuError::InvalidData(format!(
                "slice_segment_address 超出范围, value={}, PicSizeInCtbsY={}",
                segment_address, pic_size
            )));
        }
    }

    let slice = if dependent {
        None
    } else {
        Some(parse_slice_header(br, nal, sps, pps)?)
    };

    let mut entry_point_offsets = Vec::new();
    if pps.tiles.is_some() || pps.entropy_coding_sync_enabled {
        let count = br.read_ue_max(sps.pic_size_in_ctbs(), "num_entry_point_offsets")?;
        if count > 0 {
            let len = br.read_ue_max(31, "offset_len_minus1")? + 1;
            entry_point_offsets.reserve(count as usize);
            for _ in 0..count {
                entry_point_offsets.push(br.read_bits(len)?.wrapping_add(1));
            }
        }
    }

    let mut extension_length = 0;
    if pps.slice_segment_header_extension_present {
        extension_length = br.read_ue_max(256, "slice_segment_header_extension_length")?;
        br.skip_bits(extension_length * 8)?;
    }

    Ok(SliceSegmentHeader {
        nal_type: nal.nal_type,
        first_slice_segment_in_pic,
        no_output_of_prior_pics,
        pps_id,
        sps_id: sps.sps_id,
        dependent,
        segment_address,
        slice,
        entry_point_offsets,
        extension_length,
        header_bits: br.bits_read() - start_bits,
    })
}

fn parse_slice_header(br: &mut BitReader, nal: &NalHeader, sps: &Sps, pps: &Pps) -> LiuResult<SliceHeader> {
    for _ in 0..pps.num_extra_slice_header_bits {
        br.skip_bits(1)?; // slice_reserved_flag
    }
    let slice_type_raw = br.read_ue_max(2, "slice_type")?;
    let slice_type = SliceType::from_h265(slice_type_raw)
        .ok_or_else(|| LiuError::InvalidData(format!("slice_type 非法, value={}", slice_type_raw)))?;
    if nal.nal_type.is_irap() && nal.layer_id == 0 && slice_type != SliceType::I {
        return Err(LiuError::InvalidData(format!(
            "IRAP 条带类型必须为 I, nal_type={}, slice_type={}",
            nal.nal_type,
            slice_type.name()
        )));
    }

    let pic_output = !pps.output_flag_present || br.read_flag()?;
    let colour_plane_id = if sps.separate_colour_plane {
        Some(br.read_bits(2)? as u8)
    } else {
        None
    };

    let mut pic_order_cnt_lsb = 0;
    let mut short_term_rps = ShortTermRps::default();
    let mut short_term_rps_idx = None;
    let mut short_term_rps_bits = 0;
    let mut long_term = Vec::new();
    let mut temporal_mvp_enabled = false;
    if !nal.nal_type.is_idr() {
        pic_order_cnt_lsb = br.read_bits(sps.log2_max_poc_lsb)?;

        let num_sets = sps.short_term_rps.len();
        if br.read_flag()? {
            // short_term_ref_pic_set_sps_flag
            if num_sets == 0 {
                return Err(LiuError::InvalidData(
                    "条带引用 SPS 中的参考图像集, 但 SPS 未定义任何集合".into(),
                ));
            }
            let idx = if num_sets > 1 {
                br.read_bits(ceil_log2(num_sets as u32))?
            } else {
                0
            };
            short_term_rps = sps
                .short_term_rps
                .get(idx as usize)
                .cloned()
                .ok_or_else(|| {
                    LiuError::InvalidData(format!(
                        "short_term_ref_pic_set_idx 超出范围, value={}, count={}",
                        idx, num_sets
                    ))
                })?;
            short_term_rps_idx = Some(idx);
        } else {
            let before = br.bits_read();
            short_term_rps = parse_short_term_rps(br, num_sets, num_sets, &sps.short_term_rps)?;
            short_term_rps_bits = br.bits_read() - before;
        }

        if sps.long_term_ref_pics_present {
            long_term = parse_long_term_entries(br, sps)?;
        }
        if sps.temporal_mvp_enabled {
            temporal_mvp_enabled = br.read_flag()?;
        }
    }

    let mut sao_luma = false;
    let mut sao_chroma = false;
    if sps.sao_enabled {
        sao_luma = br.read_flag()?;
        if sps.chroma_array_type() != 0 {
            sao_chroma = br.read_flag()?;
        }
    }

    let mut header = SliceHeader {
        slice_type,
        pic_output,
        colour_plane_id,
        pic_order_cnt_lsb,
        short_term_rps,
        short_term_rps_idx,
        short_term_rps_bits,
        long_term,
        temporal_mvp_enabled,
        sao_luma,
        sao_chroma,
        num_ref_idx_active: [0; 2],
        list_entry_l0: None,
        list_entry_l1: None,
        mvd_l1_zero: false,
        cabac_init: false,
        collocated_from_l0: true,
        collocated_ref_idx: 0,
        has_pred_weight_table: false,
        max_num_merge_cand: 5,
        slice_qp_delta: 0,
        chroma_qp_offsets: [0; 2],
        cu_chroma_qp_offset_enabled: false,
        deblocking_filter_disabled: pps.deblocking_filter_disabled,
        deblocking_offsets: pps.deblocking_offsets,
        loop_filter_across_slices: pps.loop_filter_across_slices_enabled,
    };

    if !slice_type.is_intra() {
        parse_inter_fields(br, sps, pps, &mut header)?;
    }

    let qp_bd_offset = 6 * (sps.bit_depth_luma as i32 - 8);
    header.slice_qp_delta = br.read_se_range(
        -qp_bd_offset - pps.init_qp,
        51 - pps.init_qp,
        "slice_qp_delta",
    )?;
    if pps.slice_chroma_qp_offsets_present {
        header.chroma_qp_offsets = [
            br.read_se_range(-12, 12, "slice_cb_qp_offset")?,
            br.read_se_range(-12, 12, "slice_cr_qp_offset")?,
        ];
    }
    if pps.chroma_qp_offset_list_enabled {
        header.cu_chroma_qp_offset_enabled = br.read_flag()?;
    }

    let deblocking_override = pps.deblocking_filter_override_enabled && br.read_flag()?;
    if deblocking_override {
        header.deblocking_filter_disabled = br.read_flag()?;
        if !header.deblocking_filter_disabled {
            header.deblocking_offsets = [
                br.read_se_range(-6, 6, "slice_beta_offset_div2")?,
                br.read_se_range(-6, 6, "slice_tc_offset_div2")?,
            ];
        }
    }
    if pps.loop_filter_across_slices_enabled
        && (header.sao_luma || header.sao_chroma || !header.deblocking_filter_disabled)
    {
        header.loop_filter_across_slices = br.read_flag()?;
    }

    Ok(header)
}

/// 解析长期参考图像声明, 并累加 DeltaPocMsbCycleLt
fn parse_long_term_entries(br: &mut BitReader, sps: &Sps) -> LiuResult<Vec<LongTermEntry>> {
    let sps_candidates = sps.long_term_ref_pics.len() as u32;
    let num_long_term_sps = if sps_candidates > 0 {
        br.read_ue_max(sps_candidates, "num_long_term_sps")?
    } else {
        0
    };
    let num_long_term_pics = br.read_ue_max(
        MAX_LONG_TERM_PICS - num_long_term_sps,
        "num_long_term_pics",
    )?;

    let total = num_long_term_sps + num_long_term_pics;
    let mut entries = Vec::with_capacity(total as usize);
    // DeltaPocMsbCycleLt 取值 0..=2^(32 - log2_max_poc_lsb)
    let max_cycle = 1u32 << (32 - sps.log2_max_poc_lsb);
    let mut cycle = 0u32;
    for i in 0..total {
        let (poc_lsb, used_by_curr) = if i < num_long_term_sps {
            let idx = if sps_candidates > 1 {
                br.read_bits(ceil_log2(sps_candidates))?
            } else {
                0
            };
            *sps.long_term_ref_pics.get(idx as usize).ok_or_else(|| {
                LiuError::InvalidData(format!(
                    "lt_idx_sps 超出范围, value={}, count={}",
                    idx, sps_candidates
                ))
            })?
        } else {
            let poc_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
            (poc_lsb, br.read_flag()?)
        };

        if i == 0 || i == num_long_term_sps {
            cycle = 0;
        }
        let delta_poc_msb_cycle = if br.read_flag()? {
            let delta = br.read_ue_max(max_cycle, "delta_poc_msb_cycle_lt")?;
            cycle = cycle
                .checked_add(delta)
                .filter(|&c| c <= max_cycle)
                .ok_or_else(|| {
                    LiuError::InvalidData(format!(
                        "DeltaPocMsbCycleLt 超出范围, max={}",
                        max_cycle
                    ))
                })?;
            Some(cycle)
        } else {
            None
        };
        entries.push(LongTermEntry {
            poc_lsb,
            used_by_curr,
            delta_poc_msb_cycle,
        });
    }
    Ok(entries)
}

/// P/B 条带的参考相关字段
fn parse_inter_fields(
    br: &mut BitReader,
    sps: &Sps,
    pps: &Pps,
    header: &mut SliceHeader,
) -> LiuResult<()> {
    let is_b = header.slice_type.is_b();
    header.num_ref_idx_active = pps.num_ref_idx_default_active;
    if br.read_flag()? {
        // num_ref_idx_active_override_flag
        header.num_ref_idx_active[0] = br.read_ue_max(14, "num_ref_idx_l0_active_minus1")? + 1;
        if is_b {
            header.num_ref_idx_active[1] = br.read_ue_max(14, "num_ref_idx_l1_active_minus1")? + 1;
        }
    }
    if !is_b {
        header.num_ref_idx_active[1] = 0;
    }

    let total_curr = header.num_pic_total_curr();
    if pps.lists_modification_present && total_curr > 1 {
        let bits = ceil_log2(total_curr);
        if br.read_flag()? {
            header.list_entry_l0 = Some(read_list_entries(br, header.num_ref_idx_active[0], bits, total_curr)?);
        }
        if is_b && br.read_flag()? {
            header.list_entry_l1 = Some(read_list_entries(br, header.num_ref_idx_active[1], bits, total_curr)?);
        }
    }

    if is_b {
        header.mvd_l1_zero = br.read_flag()?;
    }
    if pps.cabac_init_present {
        header.cabac_init = br.read_flag()?;
    }
    if header.temporal_mvp_enabled {
        if is_b {
            header.collocated_from_l0 = br.read_flag()?;
        }
        let list = if header.collocated_from_l0 { 0 } else { 1 };
        let active = header.num_ref_idx_active[list];
        if active > 1 {
            header.collocated_ref_idx = br.read_ue_max(active - 1, "collocated_ref_idx")?;
        }
    }
    if (pps.weighted_pred && !is_b) || (pps.weighted_bipred && is_b) {
        skip_pred_weight_table(br, sps, header.num_ref_idx_active)?;
        header.has_pred_weight_table = true;
    }
    header.max_num_merge_cand = 5 - br.read_ue_max(4, "five_minus_max_num_merge_cand")?;
    Ok(())
}

fn read_list_entries(br: &mut BitReader, count: u32, bits: u32, total_curr: u32) -> LiuResult<Vec<u32>> {
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let entry = br.read_bits(bits)?;
        if entry >= total_curr {
            return Err(LiuError::InvalidData(format!(
                "list_entry 超出范围, value={}, NumPicTotalCurr={}",
                entry, total_curr
            )));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// 跳过 pred_weight_table()
fn skip_pred_weight_table(br: &mut BitReader, sps: &Sps, num_ref_idx_active: [u32; 2]) -> LiuResult<()> {
    let has_chroma = sps.chroma_array_type() != 0;
    br.read_ue_max(7, "luma_log2_weight_denom")?;
    if has_chroma {
        br.read_se_range(-7, 7, "delta_chroma_log2_weight_denom")?;
    }
    for count in num_ref_idx_active {
        let count = count as usize;
        let mut luma_flags = Vec::with_capacity(count);
        for _ in 0..count {
            luma_flags.push(br.read_flag()?);
        }
        let mut chroma_flags = vec![false; count];
        if has_chroma {
            for flag in chroma_flags.iter_mut() {
                *flag = br.read_flag()?;
            }
        }
        for (luma, chroma) in luma_flags.into_iter().zip(chroma_flags) {
            if luma {
                br.read_se_range(-128, 127, "delta_luma_weight")?;
                br.read_se()?; // luma_offset
            }
            if chroma {
                for _ in 0..2 {
                    br.read_se_range(-128, 127, "delta_chroma_weight")?;
                    br.read_se()?; // delta_chroma_offset
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h265::test_util::{
        PpsBuilder, SliceBuilder, SpsBuilder, param_sets, slice_payload,
    };

    fn parse(b: &SliceBuilder, sps: &Sps, pps: &Pps) -> LiuResult<SliceSegmentHeader> {
        let payload = slice_payload(b, sps, pps);
        SliceSegmentHeader::parse_with(&mut BitReader::new(&payload), &b.nal_header(), sps, pps)
    }

    #[test]
    fn test_idr_slice() {
        let (sps, pps) = param_sets(&SpsBuilder::default(), &PpsBuilder::default());
        let header = parse(&SliceBuilder::idr(), &sps, &pps).unwrap();
        assert!(header.first_slice_segment_in_pic);
        assert!(header.is_irap());
        let slice = header.slice.unwrap();
        assert_eq!(slice.slice_type, SliceType::I);
        assert_eq!(slice.pic_order_cnt_lsb, 0);
        assert_eq!(slice.num_pic_total_curr(), 0);
    }

    #[test]
    fn test_trailing_slice_with_sps_rps() {
        let (sps, pps) = param_sets(
            &SpsBuilder {
                short_term_rps: vec![vec![-1], vec![-1, -2]],
                ..SpsBuilder::default()
            },
            &PpsBuilder::default(),
        );
        let builder = SliceBuilder::trail(5).with_sps_rps(1);
        let slice = parse(&builder, &sps, &pps).unwrap().slice.unwrap();
        assert_eq!(slice.slice_type, SliceType::P);
        assert_eq!(slice.pic_order_cnt_lsb, 5);
        assert_eq!(slice.short_term_rps_idx, Some(1));
        assert_eq!(slice.short_term_rps.negative.len(), 2);
        assert_eq!(slice.num_ref_idx_active, [1, 0]);
        assert_eq!(slice.num_pic_total_curr(), 2);
    }

    #[test]
    fn test_explicit_rps_and_long_term() {
        let (sps, pps) = param_sets(
            &SpsBuilder {
                long_term_ref_pics: Some(Vec::new()),
                ..SpsBuilder::default()
            },
            &PpsBuilder::default(),
        );
        let builder = SliceBuilder::trail(9)
            .with_rps(&[-1], &[])
            .with_long_term(&[(3, true, Some(1))]);
        let slice = parse(&builder, &sps, &pps).unwrap().slice.unwrap();
        assert_eq!(slice.short_term_rps_idx, None);
        assert!(slice.short_term_rps_bits > 0);
        assert_eq!(
            slice.long_term,
            vec![LongTermEntry {
                poc_lsb: 3,
                used_by_curr: true,
                delta_poc_msb_cycle: Some(1),
            }]
        );
        assert_eq!(slice.num_pic_total_curr(), 2);
    }

    #[test]
    fn test_list_modification_entries() {
        let (sps, pps) = param_sets(
            &SpsBuilder::default(),
            &PpsBuilder {
                lists_modification_present: true,
                num_ref_idx_default_active: [2, 1],
                ..PpsBuilder::default()
            },
        );
        let builder = SliceBuilder::trail(4)
            .with_rps(&[-1, -2], &[])
            .with_list_entry_l0(vec![1, 0]);
        let slice = parse(&builder, &sps, &pps).unwrap().slice.unwrap();
        assert_eq!(slice.list_entry_l0, Some(vec![1, 0]));
        assert_eq!(slice.list_entry_l1, None);
    }

    #[test]
    fn test_dependent_segment_has_no_slice_fields() {
        let (sps, pps) = param_sets(
            &SpsBuilder::default(),
            &PpsBuilder {
                dependent_slice_segments_enabled: true,
                ..PpsBuilder::default()
            },
        );
        let builder = SliceBuilder {
            first_slice_segment: false,
            dependent: true,
            segment_address: 3,
            ..SliceBuilder::trail(2)
        };
        let header = parse(&builder, &sps, &pps).unwrap();
        assert!(header.dependent);
        assert_eq!(header.segment_address, 3);
        assert!(header.slice.is_none());
    }

    #[test]
    fn test_irap_must_be_intra() {
        let (sps, pps) = param_sets(&SpsBuilder::default(), &PpsBuilder::default());
        let builder = SliceBuilder {
            slice_type_raw: 1,
            ..SliceBuilder::cra(0)
        };
        let err = parse(&builder, &sps, &pps).unwrap_err();
        assert!(matches!(err, LiuError::SliceSyntax(_)), "{err}");
        assert!(err.to_string().contains("IRAP"));
    }

    #[test]
    fn test_missing_pps_is_unknown_parameter_set() {
        let (sps, pps) = param_sets(&SpsBuilder::default(), &PpsBuilder::default());
        let builder = SliceBuilder::idr();
        let payload = slice_payload(&builder, &sps, &pps);
        let sps_store = ParameterSetStore::new("SPS");
        let pps_store = ParameterSetStore::new("PPS");
        let err = parse_slice_segment_header(
            &mut BitReader::new(&payload),
            &builder.nal_header(),
            &sps_store,
            &pps_store,
        )
        .unwrap_err();
        assert!(matches!(err, LiuError::UnknownParameterSet { kind: "PPS", id: 0 }), "{err}");
    }
}
