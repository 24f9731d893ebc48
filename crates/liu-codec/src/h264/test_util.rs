//! H.264 单元测试用的码流构造工具.

use bytes::Bytes;
use liu_core::emulation::add_emulation_prevention;
use liu_core::{BitReader, BitWriter};

use super::nal::{NalHeader, NalUnitType};
use super::pps::Pps;
use super::slice::{Mmco, SliceHeader};
use super::sps::Sps;
use crate::param_set::ParameterSetStore;

pub struct SpsBuilder {
    pub profile_idc: u8,
    pub sps_id: u32,
    pub log2_max_frame_num_minus4: u32,
    pub poc_type: u32,
    pub log2_max_poc_lsb_minus4: u32,
    pub delta_pic_order_always_zero: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub offset_for_ref_frame: Vec<i32>,
    pub max_num_ref_frames: u32,
    pub gaps_allowed: bool,
    pub width_mbs: u32,
    pub height_map_units: u32,
    pub frame_mbs_only: bool,
    pub crop_bottom: u32,
    pub timing: Option<(u32, u32)>,
}

impl Default for SpsBuilder {
    fn default() -> Self {
        Self {
            profile_idc: 66,
            sps_id: 0,
            log2_max_frame_num_minus4: 0,
            poc_type: 0,
            log2_max_poc_lsb_minus4: 2,
            delta_pic_order_always_zero: false,
            offset_for_non_ref_pic: 0,
            offset_for_top_to_bottom_field: 0,
            offset_for_ref_frame: Vec::new(),
            max_num_ref_frames: 1,
            gaps_allowed: false,
            width_mbs: 11,
            height_map_units: 9,
            frame_mbs_only: true,
            crop_bottom: 0,
            timing: None,
        }
    }
}

pub fn sps_payload(b: &SpsBuilder) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(u32::from(b.profile_idc), 8);
    w.write_bits(0, 8); // constraint flags
    w.write_bits(30, 8); // level 3.0
    w.write_ue(b.sps_id);
    if b.profile_idc == 100 {
        w.write_ue(1); // chroma_format_idc
        w.write_ue(0);
        w.write_ue(0);
        w.write_flag(false);
        w.write_flag(false);
    }
    w.write_ue(b.log2_max_frame_num_minus4);
    w.write_ue(b.poc_type);
    match b.poc_type {
        0 => w.write_ue(b.log2_max_poc_lsb_minus4),
        1 => {
            w.write_flag(b.delta_pic_order_always_zero);
            w.write_se(b.offset_for_non_ref_pic);
            w.write_se(b.offset_for_top_to_bottom_field);
            w.write_ue(b.offset_for_ref_frame.len() as u32);
            for &offset in &b.offset_for_ref_frame {
                w.write_se(offset);
            }
        }
        _ => {}
    }
    w.write_ue(b.max_num_ref_frames);
    w.write_flag(b.gaps_allowed);
    w.write_ue(b.width_mbs - 1);
    w.write_ue(b.height_map_units - 1);
    w.write_flag(b.frame_mbs_only);
    if !b.frame_mbs_only {
        w.write_flag(false);
    }
    w.write_flag(true); // direct_8x8_inference
    if b.crop_bottom > 0 {
        w.write_flag(true);
        for value in [0, 0, 0, b.crop_bottom] {
            w.write_ue(value);
        }
    } else {
        w.write_flag(false);
    }
    match b.timing {
        Some((num_units_in_tick, time_scale)) => {
            w.write_flag(true);
            for _ in 0..4 {
                w.write_flag(false); // aspect / overscan / signal type / chroma loc
            }
            w.write_flag(true);
            w.write_bits(num_units_in_tick, 32);
            w.write_bits(time_scale, 32);
            w.write_flag(true);
            for _ in 0..4 {
                w.write_flag(false); // nal_hrd / vcl_hrd / pic_struct / restriction
            }
        }
        None => w.write_flag(false),
    }
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

pub struct PpsBuilder {
    pub pps_id: u32,
    pub sps_id: u32,
    pub entropy_coding_mode: bool,
    pub bottom_field_pic_order_present: bool,
    pub num_ref_idx_l0_default_active: u32,
    pub num_ref_idx_l1_default_active: u32,
    pub weighted_pred: bool,
    pub weighted_bipred_idc: u32,
    pub deblocking_filter_control_present: bool,
    pub redundant_pic_cnt_present: bool,
    pub transform_8x8_mode: Option<bool>,
    pub scaling_matrix_present: bool,
}

impl Default for PpsBuilder {
    fn default() -> Self {
        Self {
            pps_id: 0,
            sps_id: 0,
            entropy_coding_mode: false,
            bottom_field_pic_order_present: false,
            num_ref_idx_l0_default_active: 1,
            num_ref_idx_l1_default_active: 1,
            weighted_pred: false,
            weighted_bipred_idc: 0,
            deblocking_filter_control_present: true,
            redundant_pic_cnt_present: false,
            transform_8x8_mode: None,
            scaling_matrix_present: false,
        }
    }
}

pub fn pps_payload(b: &PpsBuilder) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_ue(b.pps_id);
    w.write_ue(b.sps_id);
    w.write_flag(b.entropy_coding_mode);
    w.write_flag(b.bottom_field_pic_order_present);
    w.write_ue(0); // num_slice_groups_minus1
    w.write_ue(b.num_ref_idx_l0_default_active - 1);
    w.write_ue(b.num_ref_idx_l1_default_active - 1);
    w.write_flag(b.weighted_pred);
    w.write_bits(b.weighted_bipred_idc, 2);
    w.write_se(0);
    w.write_se(0);
    w.write_se(0);
    w.write_flag(b.deblocking_filter_control_present);
    w.write_flag(false);
    w.write_flag(b.redundant_pic_cnt_present);
    if let Some(transform_8x8) = b.transform_8x8_mode {
        w.write_flag(transform_8x8);
        w.write_flag(b.scaling_matrix_present);
        if b.scaling_matrix_present {
            let lists = 6 + if transform_8x8 { 2 } else { 0 };
            for _ in 0..lists {
                w.write_flag(false);
            }
        }
        w.write_se(0);
    }
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

#[derive(Clone)]
pub struct SliceBuilder {
    pub nal_ref_idc: u8,
    pub is_idr: bool,
    pub first_mb: u32,
    pub slice_type_raw: u32,
    pub frame_num: u32,
    /// None: 帧; Some(false): 顶场; Some(true): 底场
    pub field: Option<bool>,
    pub idr_pic_id: u32,
    pub poc_lsb: u32,
    pub delta_poc_bottom: i32,
    pub delta_poc: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub long_term_reference: bool,
    pub mmco: Option<Vec<Mmco>>,
    pub qp_delta: i32,
}

impl SliceBuilder {
    pub fn idr(idr_pic_id: u32) -> Self {
        Self {
            nal_ref_idc: 3,
            is_idr: true,
            first_mb: 0,
            slice_type_raw: 7,
            frame_num: 0,
            field: None,
            idr_pic_id,
            poc_lsb: 0,
            delta_poc_bottom: 0,
            delta_poc: [0; 2],
            redundant_pic_cnt: 0,
            long_term_reference: false,
            mmco: None,
            qp_delta: 0,
        }
    }

    pub fn p(frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            nal_ref_idc: 2,
            is_idr: false,
            slice_type_raw: 5,
            frame_num,
            poc_lsb,
            ..Self::idr(0)
        }
    }

    pub fn b(frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            nal_ref_idc: 0,
            slice_type_raw: 6,
            ..Self::p(frame_num, poc_lsb)
        }
    }

    /// 含头部的完整 NAL
    pub fn nal(&self, sps: &Sps, pps: &Pps) -> Vec<u8> {
        let type_id = if self.is_idr { 5 } else { 1 };
        nal_bytes(self.nal_ref_idc, type_id, &slice_payload(self, sps, pps))
    }
}

pub fn slice_payload(b: &SliceBuilder, sps: &Sps, pps: &Pps) -> Vec<u8> {
    let slice_type = b.slice_type_raw % 5;
    let is_b = slice_type == 1;
    let is_intra = slice_type == 2 || slice_type == 4;
    let field_pic = b.field.is_some();

    let mut w = BitWriter::new();
    w.write_ue(b.first_mb);
    w.write_ue(b.slice_type_raw);
    w.write_ue(pps.pps_id);
    if sps.separate_colour_plane {
        w.write_bits(0, 2);
    }
    w.write_bits(b.frame_num, sps.log2_max_frame_num);
    if !sps.frame_mbs_only {
        w.write_flag(field_pic);
        if let Some(bottom) = b.field {
            w.write_flag(bottom);
        }
    }
    if b.is_idr {
        w.write_ue(b.idr_pic_id);
    }
    match sps.poc_type {
        0 => {
            w.write_bits(b.poc_lsb, sps.log2_max_poc_lsb);
            if pps.bottom_field_pic_order_in_frame_present && !field_pic {
                w.write_se(b.delta_poc_bottom);
            }
        }
        1 if !sps.delta_pic_order_always_zero => {
            w.write_se(b.delta_poc[0]);
            if pps.bottom_field_pic_order_in_frame_present && !field_pic {
                w.write_se(b.delta_poc[1]);
            }
        }
        _ => {}
    }
    if pps.redundant_pic_cnt_present {
        w.write_ue(b.redundant_pic_cnt);
    }
    if is_b {
        w.write_flag(true); // direct_spatial_mv_pred
    }
    if !is_intra {
        w.write_flag(false); // num_ref_idx_active_override
        w.write_flag(false); // ref_pic_list_modification_flag_l0
    }
    if is_b {
        w.write_flag(false);
    }
    let weighted = (pps.weighted_pred && (slice_type == 0 || slice_type == 3))
        || (pps.weighted_bipred_idc == 1 && is_b);
    if weighted {
        w.write_ue(0);
        if sps.chroma_array_type() != 0 {
            w.write_ue(0);
        }
        let lists = if is_b {
            [pps.num_ref_idx_l0_default_active, pps.num_ref_idx_l1_default_active]
        } else {
            [pps.num_ref_idx_l0_default_active, 0]
        };
        for count in lists {
            for _ in 0..count {
                w.write_flag(false);
                if sps.chroma_array_type() != 0 {
                    w.write_flag(false);
                }
            }
        }
    }
    if b.nal_ref_idc != 0 {
        if b.is_idr {
            w.write_flag(false);
            w.write_flag(b.long_term_reference);
        } else if let Some(ops) = &b.mmco {
            w.write_flag(true);
            for op in ops {
                write_mmco(&mut w, op);
            }
            w.write_ue(0);
        } else {
            w.write_flag(false);
        }
    }
    if pps.entropy_coding_mode && !is_intra {
        w.write_ue(0);
    }
    w.write_se(b.qp_delta);
    if slice_type == 3 {
        w.write_flag(false);
    }
    if slice_type == 3 || slice_type == 4 {
        w.write_se(0);
    }
    if pps.deblocking_filter_control_present {
        w.write_ue(0);
        w.write_se(0);
        w.write_se(0);
    }
    // 条带数据占位
    w.write_bits(0xA5, 8);
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

fn write_mmco(w: &mut BitWriter, op: &Mmco) {
    match *op {
        Mmco::ForgetShortTerm {
            difference_of_pic_nums_minus1,
        } => {
            w.write_ue(1);
            w.write_ue(difference_of_pic_nums_minus1);
        }
        Mmco::ForgetLongTerm { long_term_pic_num } => {
            w.write_ue(2);
            w.write_ue(long_term_pic_num);
        }
        Mmco::ShortTermToLongTerm {
            difference_of_pic_nums_minus1,
            long_term_frame_idx,
        } => {
            w.write_ue(3);
            w.write_ue(difference_of_pic_nums_minus1);
            w.write_ue(long_term_frame_idx);
        }
        Mmco::TrimLongTerm {
            max_long_term_frame_idx_plus1,
        } => {
            w.write_ue(4);
            w.write_ue(max_long_term_frame_idx_plus1);
        }
        Mmco::ClearAll => w.write_ue(5),
        Mmco::CurrentToLongTerm {
            long_term_frame_idx,
        } => {
            w.write_ue(6);
            w.write_ue(long_term_frame_idx);
        }
    }
}

pub fn nal_bytes(ref_idc: u8, type_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut nal = vec![(ref_idc << 5) | type_id];
    nal.extend_from_slice(payload);
    nal
}

/// recovery_point SEI NAL
pub fn recovery_point_sei(recovery_frame_cnt: u32) -> Vec<u8> {
    let mut body = BitWriter::new();
    body.write_ue(recovery_frame_cnt);
    body.write_flag(true);
    body.write_flag(false);
    body.write_bits(0, 2);
    let body = body.finish();
    let mut payload = vec![6, body.len() as u8];
    payload.extend_from_slice(&body);
    payload.push(0x80);
    nal_bytes(0, 6, &payload)
}

/// 以 4 字节起始码拼接
pub fn annex_b(nals: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

/// 解析构造好的 SPS/PPS
pub fn param_sets(sps: &SpsBuilder, pps: &PpsBuilder) -> (Sps, Pps) {
    let sps = super::sps::parse_sps(&mut BitReader::new(&sps_payload(sps))).unwrap();
    let mut store = ParameterSetStore::new("SPS");
    store.insert(sps.sps_id, sps.clone(), Bytes::new());
    let pps = super::pps::parse_pps(&mut BitReader::new(&pps_payload(pps)), &store).unwrap();
    (sps, pps)
}

/// 构造并解析条带头
pub fn parse_slice(b: &SliceBuilder, sps: &Sps, pps: &Pps) -> SliceHeader {
    let nal = NalHeader {
        nal_type: if b.is_idr {
            NalUnitType::SliceIdr
        } else {
            NalUnitType::Slice
        },
        ref_idc: b.nal_ref_idc,
    };
    let payload = slice_payload(b, sps, pps);
    SliceHeader::parse_with(&mut BitReader::new(&payload), &nal, sps, pps).unwrap()
}
