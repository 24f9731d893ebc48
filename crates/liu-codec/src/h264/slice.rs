//! H.264 条带头解析.
//!
//! 条带头中多个字段的位宽由所引用的 SPS/PPS 决定 (frame_num、pic_order_cnt_lsb、
//! slice_group_change_cycle 等), 因此解析入口 [`SliceHeader::parse_with`]
//! 显式接收已解析的参数集. [`parse_slice_header`] 负责先读出 pps_id 再从存储中查找.

use liu_core::{BitReader, LiuError, LiuResult};

use super::nal::{NalHeader, NalUnitType};
use super::pps::{Pps, ceil_log2};
use super::sps::Sps;
use crate::param_set::ParameterSetStore;
use crate::picture::SliceType;

/// 单条 MMCO 操作上限
const MAX_MMCO_OPS: usize = 66;
/// 单个列表的重排序操作上限
const MAX_LIST_MODIFICATIONS: usize = 33;

/// 图像结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PicStructure {
    /// 帧
    Frame,
    /// 顶场
    TopField,
    /// 底场
    BottomField,
}

impl PicStructure {
    /// 是否为场
    pub fn is_field(&self) -> bool {
        *self != Self::Frame
    }
}

/// 参考图像列表修改操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefPicListModification {
    /// modification_of_pic_nums_idc == 0
    ShortTermSubtract {
        /// abs_diff_pic_num_minus1
        abs_diff_pic_num_minus1: u32,
    },
    /// modification_of_pic_nums_idc == 1
    ShortTermAdd {
        /// abs_diff_pic_num_minus1
        abs_diff_pic_num_minus1: u32,
    },
    /// modification_of_pic_nums_idc == 2
    LongTerm {
        /// long_term_pic_num
        long_term_pic_num: u32,
    },
}

/// 内存管理控制操作 (MMCO)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mmco {
    /// MMCO1: 将短期参考标记为不用于参考
    ForgetShortTerm {
        /// difference_of_pic_nums_minus1
        difference_of_pic_nums_minus1: u32,
    },
    /// MMCO2: 将长期参考标记为不用于参考
    ForgetLongTerm {
        /// long_term_pic_num
        long_term_pic_num: u32,
    },
    /// MMCO3: 短期参考转为长期参考
    ShortTermToLongTerm {
        /// difference_of_pic_nums_minus1
        difference_of_pic_nums_minus1: u32,
        /// long_term_frame_idx
        long_term_frame_idx: u32,
    },
    /// MMCO4: 设置最大长期帧索引
    TrimLongTerm {
        /// max_long_term_frame_idx_plus1
        max_long_term_frame_idx_plus1: u32,
    },
    /// MMCO5: 清空全部参考
    ClearAll,
    /// MMCO6: 当前图像标记为长期参考
    CurrentToLongTerm {
        /// long_term_frame_idx
        long_term_frame_idx: u32,
    },
}

/// dec_ref_pic_marking() 的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefPicMarking {
    /// 非参考图像, 不做标记
    None,
    /// IDR 图像
    Idr {
        /// no_output_of_prior_pics_flag
        no_output_of_prior_pics: bool,
        /// long_term_reference_flag
        long_term_reference: bool,
    },
    /// 隐式滑动窗口
    SlidingWindow,
    /// 显式 MMCO 序列
    Adaptive(Vec<Mmco>),
}

impl RefPicMarking {
    /// 是否包含 MMCO5
    pub fn has_clear_all(&self) -> bool {
        matches!(self, Self::Adaptive(ops) if ops.contains(&Mmco::ClearAll))
    }
}

/// 加权预测表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredWeight {
    /// 亮度 (weight, offset), 未显式给出时为 `None`
    pub luma: Option<(i32, i32)>,
    /// 两个色度分量的 (weight, offset)
    pub chroma: Option<[(i32, i32); 2]>,
}

/// pred_weight_table()
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PredWeightTable {
    /// luma_log2_weight_denom
    pub luma_log2_weight_denom: u32,
    /// chroma_log2_weight_denom
    pub chroma_log2_weight_denom: u32,
    /// 列表 0 的权重
    pub l0: Vec<PredWeight>,
    /// 列表 1 的权重
    pub l1: Vec<PredWeight>,
}

/// H.264 条带头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    /// NAL 类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc
    pub nal_ref_idc: u8,
    /// first_mb_in_slice
    pub first_mb_in_slice: u32,
    /// slice_type 原始值 (0..=9)
    pub slice_type_raw: u32,
    /// 条带类型
    pub slice_type: SliceType,
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// 所引用 PPS 中的 seq_parameter_set_id
    pub sps_id: u32,
    /// colour_plane_id
    pub colour_plane_id: u8,
    /// frame_num
    pub frame_num: u32,
    /// 帧/顶场/底场
    pub structure: PicStructure,
    /// idr_pic_id (仅 IDR)
    pub idr_pic_id: Option<u32>,
    /// pic_order_cnt_lsb (poc_type == 0)
    pub pic_order_cnt_lsb: u32,
    /// delta_pic_order_cnt_bottom (poc_type == 0)
    pub delta_pic_order_cnt_bottom: i32,
    /// delta_pic_order_cnt[0..2] (poc_type == 1)
    pub delta_pic_order_cnt: [i32; 2],
    /// redundant_pic_cnt
    pub redundant_pic_cnt: u32,
    /// direct_spatial_mv_pred_flag (B 条带)
    pub direct_spatial_mv_pred: bool,
    /// 生效的参考索引数量 (l0, l1)
    pub num_ref_idx_active: [u32; 2],
    /// 列表 0 修改
    pub ref_pic_list_modification_l0: Vec<RefPicListModification>,
    /// 列表 1 修改
    pub ref_pic_list_modification_l1: Vec<RefPicListModification>,
    /// 加权预测表
    pub pred_weight_table: Option<PredWeightTable>,
    /// 参考图像标记
    pub dec_ref_pic_marking: RefPicMarking,
    /// cabac_init_idc
    pub cabac_init_idc: u32,
    /// slice_qp_delta
    pub slice_qp_delta: i32,
    /// disable_deblocking_filter_idc
    pub disable_deblocking_filter_idc: u32,
    /// slice_alpha_c0_offset_div2 / slice_beta_offset_div2
    pub deblocking_offsets: (i32, i32),
    /// slice_group_change_cycle
    pub slice_group_change_cycle: Option<u32>,
    /// 条带头占用的比特数 (不含 NAL 头)
    pub header_bits: usize,
}

impl SliceHeader {
    /// 是否为 IDR 条带
    pub fn is_idr(&self) -> bool {
        self.nal_type == NalUnitType::SliceIdr
    }

    /// 是否为参考图像的条带
    pub fn is_reference(&self) -> bool {
        self.nal_ref_idc != 0
    }

    /// 是否为场图像
    pub fn field_pic(&self) -> bool {
        self.structure.is_field()
    }

    /// 是否为底场
    pub fn bottom_field(&self) -> bool {
        self.structure == PicStructure::BottomField
    }

    /// 与同一图像上一个条带相比, 是否属于新的图像 (7.4.1.2.4)
    pub fn starts_new_picture(&self, prev: &SliceHeader, sps: &Sps) -> bool {
        if self.frame_num != prev.frame_num
            || self.pps_id != prev.pps_id
            || self.structure != prev.structure
            || self.is_reference() != prev.is_reference()
            || self.is_idr() != prev.is_idr()
        {
            return true;
        }
        if self.is_idr() && prev.is_idr() && self.idr_pic_id != prev.idr_pic_id {
            return true;
        }
        match sps.poc_type {
            0 => {
                self.pic_order_cnt_lsb != prev.pic_order_cnt_lsb
                    || self.delta_pic_order_cnt_bottom != prev.delta_pic_order_cnt_bottom
            }
            1 => self.delta_pic_order_cnt != prev.delta_pic_order_cnt,
            _ => false,
        }
    }

    /// 使用给定的 SPS/PPS 解析条带头
    ///
    /// `br` 位于条带载荷起点 (NAL 头之后). 条带中的 pps_id 必须与 `pps` 一致.
    pub fn parse_with(br: &mut BitReader, nal: &NalHeader, sps: &Sps, pps: &Pps) -> LiuResult<Self> {
        parse_fields(br, nal, sps, pps).map_err(|e| e.into_slice_error("H.264 slice"))
    }
}

/// 解析条带头, 从存储中查找所引用的 PPS 与 SPS
pub fn parse_slice_header(
    br: &mut BitReader,
    nal: &NalHeader,
    sps_store: &ParameterSetStore<Sps>,
    pps_store: &ParameterSetStore<Pps>,
) -> LiuResult<SliceHeader> {
    let pps_id = peek_pps_id(br).map_err(|e| e.into_slice_error("H.264 slice"))?;
    let pps = pps_store.require(pps_id)?;
    let sps = sps_store.require(pps.sps_id)?;
    SliceHeader::parse_with(br, nal, sps, pps)
}

/// 不移动读取器, 读出条带引用的 pps_id
fn peek_pps_id(br: &BitReader) -> LiuResult<u32> {
    let mut probe = br.clone();
    probe.read_ue()?; // first_mb_in_slice
    probe.read_ue_max(9, "slice_type")?;
    probe.read_ue_max(255, "pic_parameter_set_id")
}

fn parse_fields(br: &mut BitReader, nal: &NalHeader, sps: &Sps, pps: &Pps) -> LiuResult<SliceHeader> {
    let start_bits = br.bits_read();
    let is_idr = nal.nal_type == NalUnitType::SliceIdr;

    let first_mb_in_slice = br.read_ue()?;
    let slice_type_raw = br.read_ue_max(9, "slice_type")?;
    let slice_type = SliceType::from_h264(slice_type_raw)
        .ok_or_else(|| LiuError::InvalidData(format!("slice_type 非法, value={}", slice_type_raw)))?;
    let pps_id = br.read_ue_max(255, "pic_parameter_set_id")?;
    if pps_id != pps.pps_id {
        return Err(LiuError::InvalidArgument(format!(
            "条带引用 PPS id={}, 传入的 PPS id={}",
            pps_id, pps.pps_id
        )));
    }
    if is_idr && !slice_type.is_intra() {
        return Err(LiuError::InvalidData(format!(
            "IDR 条带类型必须为 I/SI, slice_type={}",
            slice_type_raw
        )));
    }

    let colour_plane_id = if sps.separate_colour_plane {
        br.read_bits(2)? as u8
    } else {
        0
    };
    let frame_num = br.read_bits(sps.log2_max_frame_num)?;
    if is_idr && frame_num != 0 {
        return Err(LiuError::InvalidData(format!(
            "IDR 条带 frame_num 必须为 0, frame_num={}",
            frame_num
        )));
    }

    let mut structure = PicStructure::Frame;
    if !sps.frame_mbs_only && br.read_flag()? {
        structure = if br.read_flag()? {
            PicStructure::BottomField
        } else {
            PicStructure::TopField
        };
    }

    let idr_pic_id = if is_idr {
        Some(br.read_ue_max(65535, "idr_pic_id")?)
    } else {
        None
    };

    let mut pic_order_cnt_lsb = 0;
    let mut delta_pic_order_cnt_bottom = 0;
    let mut delta_pic_order_cnt = [0i32; 2];
    match sps.poc_type {
        0 => {
            pic_order_cnt_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
            if pps.bottom_field_pic_order_in_frame_present && !structure.is_field() {
                delta_pic_order_cnt_bottom = br.read_se()?;
            }
        }
        1 if !sps.delta_pic_order_always_zero => {
            delta_pic_order_cnt[0] = br.read_se()?;
            if pps.bottom_field_pic_order_in_frame_present && !structure.is_field() {
                delta_pic_order_cnt[1] = br.read_se()?;
            }
        }
        _ => {}
    }

    let redundant_pic_cnt = if pps.redundant_pic_cnt_present {
        br.read_ue_max(127, "redundant_pic_cnt")?
    } else {
        0
    };

    let mut direct_spatial_mv_pred = false;
    if slice_type == SliceType::B {
        direct_spatial_mv_pred = br.read_flag()?;
    }

    let mut num_ref_idx_active = [
        pps.num_ref_idx_l0_default_active,
        pps.num_ref_idx_l1_default_active,
    ];
    let max_ref_idx = if structure.is_field() { 32 } else { 16 };
    if matches!(slice_type, SliceType::P | SliceType::Sp | SliceType::B) {
        if br.read_flag()? {
            num_ref_idx_active[0] =
                br.read_ue_max(max_ref_idx - 1, "num_ref_idx_l0_active_minus1")? + 1;
            if slice_type == SliceType::B {
                num_ref_idx_active[1] =
                    br.read_ue_max(max_ref_idx - 1, "num_ref_idx_l1_active_minus1")? + 1;
            }
        }
    }
    if slice_type != SliceType::B {
        num_ref_idx_active[1] = 0;
    }
    if slice_type.is_intra() {
        num_ref_idx_active[0] = 0;
    }

    // nal_unit_type 20/21 的 MVC 修改语法不在基础层出现
    let mut ref_pic_list_modification_l0 = Vec::new();
    let mut ref_pic_list_modification_l1 = Vec::new();
    if !slice_type.is_intra() && br.read_flag()? {
        ref_pic_list_modification_l0 = parse_list_modification(br, sps, structure)?;
    }
    if slice_type == SliceType::B && br.read_flag()? {
        ref_pic_list_modification_l1 = parse_list_modification(br, sps, structure)?;
    }

    let pred_weight_table = if (pps.weighted_pred
        && matches!(slice_type, SliceType::P | SliceType::Sp))
        || (pps.weighted_bipred_idc == 1 && slice_type == SliceType::B)
    {
        Some(parse_pred_weight_table(br, sps, slice_type, num_ref_idx_active)?)
    } else {
        None
    };

    let dec_ref_pic_marking = if nal.ref_idc != 0 {
        parse_dec_ref_pic_marking(br, is_idr, sps)?
    } else {
        RefPicMarking::None
    };

    let cabac_init_idc = if pps.entropy_coding_mode && !slice_type.is_intra() {
        br.read_ue_max(2, "cabac_init_idc")?
    } else {
        0
    };

    // SliceQPY 须落在 [-QpBdOffsetY, 51]
    let qp_bd_offset = 6 * (sps.bit_depth_luma as i32 - 8);
    let slice_qp_delta = br.read_se_range(
        -qp_bd_offset - pps.pic_init_qp,
        51 - pps.pic_init_qp,
        "slice_qp_delta",
    )?;
    if matches!(slice_type, SliceType::Sp | SliceType::Si) {
        if slice_type == SliceType::Sp {
            br.skip_bits(1)?; // sp_for_switch_flag
        }
        br.read_se()?; // slice_qs_delta
    }

    let mut disable_deblocking_filter_idc = 0;
    let mut deblocking_offsets = (0, 0);
    if pps.deblocking_filter_control_present {
        disable_deblocking_filter_idc = br.read_ue_max(2, "disable_deblocking_filter_idc")?;
        if disable_deblocking_filter_idc != 1 {
            deblocking_offsets = (
                br.read_se_range(-6, 6, "slice_alpha_c0_offset_div2")?,
                br.read_se_range(-6, 6, "slice_beta_offset_div2")?,
            );
        }
    }

    let mut slice_group_change_cycle = None;
    if pps.num_slice_groups > 1 && (3..=5).contains(&pps.slice_group_map_type) {
        let bits =
            slice_group_change_cycle_bits(sps.pic_size_in_map_units(), pps.slice_group_change_rate);
        slice_group_change_cycle = Some(br.read_bits(bits)?);
    }

    Ok(SliceHeader {
        nal_type: nal.nal_type,
        nal_ref_idc: nal.ref_idc,
        first_mb_in_slice,
        slice_type_raw,
        slice_type,
        pps_id,
        sps_id: pps.sps_id,
        colour_plane_id,
        frame_num,
        structure,
        idr_pic_id,
        pic_order_cnt_lsb,
        delta_pic_order_cnt_bottom,
        delta_pic_order_cnt,
        redundant_pic_cnt,
        direct_spatial_mv_pred,
        num_ref_idx_active,
        ref_pic_list_modification_l0,
        ref_pic_list_modification_l1,
        pred_weight_table,
        dec_ref_pic_marking,
        cabac_init_idc,
        slice_qp_delta,
        disable_deblocking_filter_idc,
        deblocking_offsets,
        slice_group_change_cycle,
        header_bits: br.bits_read() - start_bits,
    })
}

/// slice_group_change_cycle 的位宽: Ceil(Log2(PicSizeInMapUnits ÷ SliceGroupChangeRate + 1))
fn slice_group_change_cycle_bits(pic_size_in_map_units: u32, change_rate: u32) -> u32 {
    ceil_log2(pic_size_in_map_units.div_ceil(change_rate.max(1)) + 1)
}

/// MaxPicNum - 1, 用于校验 abs_diff_pic_num_minus1 / difference_of_pic_nums_minus1
fn max_pic_num_minus1(sps: &Sps, structure: PicStructure) -> u32 {
    let max_pic_num = if structure.is_field() {
        2 * sps.max_frame_num()
    } else {
        sps.max_frame_num()
    };
    max_pic_num - 1
}

fn parse_list_modification(
    br: &mut BitReader,
    sps: &Sps,
    structure: PicStructure,
) -> LiuResult<Vec<RefPicListModification>> {
    let max_abs_diff = max_pic_num_minus1(sps, structure);
    let max_long_term_pic_num = if structure.is_field() {
        2 * sps.max_num_ref_frames + 1
    } else {
        sps.max_num_ref_frames
    };
    let mut mods = Vec::new();
    loop {
        let idc = br.read_ue()?;
        let modification = match idc {
            0 => RefPicListModification::ShortTermSubtract {
                abs_diff_pic_num_minus1: br.read_ue_max(max_abs_diff, "abs_diff_pic_num_minus1")?,
            },
            1 => RefPicListModification::ShortTermAdd {
                abs_diff_pic_num_minus1: br.read_ue_max(max_abs_diff, "abs_diff_pic_num_minus1")?,
            },
            2 => RefPicListModification::LongTerm {
                long_term_pic_num: br.read_ue_max(max_long_term_pic_num, "long_term_pic_num")?,
            },
            3 => return Ok(mods),
            _ => {
                return Err(LiuError::InvalidData(format!(
                    "modification_of_pic_nums_idc 非法, value={}",
                    idc
                )));
            }
        };
        if mods.len() >= MAX_LIST_MODIFICATIONS {
            return Err(LiuError::InvalidData("ref_pic_list_modification 项数过多".into()));
        }
        mods.push(modification);
    }
}

fn parse_pred_weight_table(
    br: &mut BitReader,
    sps: &Sps,
    slice_type: SliceType,
    num_ref_idx_active: [u32; 2],
) -> LiuResult<PredWeightTable> {
    let mut table = PredWeightTable {
        luma_log2_weight_denom: br.read_ue_max(7, "luma_log2_weight_denom")?,
        ..PredWeightTable::default()
    };
    let has_chroma = sps.chroma_array_type() != 0;
    if has_chroma {
        table.chroma_log2_weight_denom = br.read_ue_max(7, "chroma_log2_weight_denom")?;
    }

    let lists = if slice_type == SliceType::B { 2 } else { 1 };
    for list in 0..lists {
        let mut weights = Vec::with_capacity(num_ref_idx_active[list] as usize);
        for _ in 0..num_ref_idx_active[list] {
            let mut weight = PredWeight::default();
            if br.read_flag()? {
                weight.luma = Some((
                    br.read_se_range(-128, 127, "luma_weight")?,
                    br.read_se_range(-128, 127, "luma_offset")?,
                ));
            }
            if has_chroma && br.read_flag()? {
                let mut chroma = [(0, 0); 2];
                for c in chroma.iter_mut() {
                    *c = (
                        br.read_se_range(-128, 127, "chroma_weight")?,
                        br.read_se_range(-128, 127, "chroma_offset")?,
                    );
                }
                weight.chroma = Some(chroma);
            }
            weights.push(weight);
        }
        if list == 0 {
            table.l0 = weights;
        } else {
            table.l1 = weights;
        }
    }
    Ok(table)
}

fn parse_dec_ref_pic_marking(br: &mut BitReader, is_idr: bool, sps: &Sps) -> LiuResult<RefPicMarking> {
    if is_idr {
        return Ok(RefPicMarking::Idr {
            no_output_of_prior_pics: br.read_flag()?,
            long_term_reference: br.read_flag()?,
        });
    }
    if !br.read_flag()? {
        return Ok(RefPicMarking::SlidingWindow);
    }

    // 取值范围按场编码放宽, 具体目标是否存在由参考帧跟踪器判断
    let max_difference = 2 * sps.max_frame_num() - 1;
    let max_long_term_pic_num = 2 * sps.max_num_ref_frames.max(1) + 1;
    let max_long_term_frame_idx = sps.max_num_ref_frames.max(1) - 1;

    let mut ops = Vec::new();
    loop {
        let op = match br.read_ue()? {
            0 => return Ok(RefPicMarking::Adaptive(ops)),
            1 => Mmco::ForgetShortTerm {
                difference_of_pic_nums_minus1: br
                    .read_ue_max(max_difference, "difference_of_pic_nums_minus1")?,
            },
            2 => Mmco::ForgetLongTerm {
                long_term_pic_num: br.read_ue_max(max_long_term_pic_num, "long_term_pic_num")?,
            },
            3 => Mmco::ShortTermToLongTerm {
                difference_of_pic_nums_minus1: br
                    .read_ue_max(max_difference, "difference_of_pic_nums_minus1")?,
                long_term_frame_idx: br
                    .read_ue_max(max_long_term_frame_idx, "long_term_frame_idx")?,
            },
            4 => Mmco::TrimLongTerm {
                max_long_term_frame_idx_plus1: br.read_ue_max(
                    sps.max_num_ref_frames.max(1),
                    "max_long_term_frame_idx_plus1",
                )?,
            },
            5 => Mmco::ClearAll,
            6 => Mmco::CurrentToLongTerm {
                long_term_frame_idx: br
                    .read_ue_max(max_long_term_frame_idx, "long_term_frame_idx")?,
            },
            other => {
                return Err(LiuError::InvalidData(format!(
                    "memory_management_control_operation 非法, value={}",
                    other
                )));
            }
        };
        if ops.len() >= MAX_MMCO_OPS {
            return Err(LiuError::InvalidData(format!(
                "MMCO 操作数量过多, max={}",
                MAX_MMCO_OPS
            )));
        }
        ops.push(op);
    }
}
