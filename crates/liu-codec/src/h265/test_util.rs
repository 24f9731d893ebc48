//! HEVC 单元测试用的码流构造工具.

use liu_core::emulation::add_emulation_prevention;
use liu_core::{BitReader, BitWriter};

use super::nal::{NalHeader, NalUnitType};
use super::pps::{Pps, parse_pps};
use super::sps::{Sps, parse_sps};
use crate::h264::pps::ceil_log2;

fn write_general_ptl(w: &mut BitWriter) {
    w.write_bits(0, 2); // profile_space
    w.write_flag(false); // tier
    w.write_bits(1, 5); // Main
    w.write_bits(0x6000_0000, 32);
    w.write_bits(0b1001, 4);
    w.write_bits(0, 32);
    w.write_bits(0, 12);
    w.write_bits(93, 8); // level 3.1
}

#[derive(Default)]
pub struct VpsBuilder {
    pub vps_id: u32,
    pub max_sub_layers_minus1: u32,
}

pub fn vps_payload(b: &VpsBuilder) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(b.vps_id, 4);
    w.write_flag(true);
    w.write_flag(true);
    w.write_bits(0, 6);
    w.write_bits(b.max_sub_layers_minus1, 3);
    w.write_flag(true);
    w.write_bits(0xFFFF, 16);
    write_general_ptl(&mut w);
    for _ in 0..b.max_sub_layers_minus1 {
        w.write_flag(false);
        w.write_flag(false);
    }
    if b.max_sub_layers_minus1 > 0 {
        for _ in b.max_sub_layers_minus1..8 {
            w.write_bits(0, 2);
        }
    }
    w.write_flag(false); // sub_layer_ordering_info_present_flag
    w.write_ue(4);
    w.write_ue(2);
    w.write_ue(0);
    w.write_bits(0, 6); // vps_max_layer_id
    w.write_ue(0); // vps_num_layer_sets_minus1
    w.write_flag(false); // vps_timing_info_present_flag
    w.write_flag(false); // vps_extension_flag
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

pub struct SpsBuilder {
    pub vps_id: u32,
    pub sps_id: u32,
    pub width: u32,
    pub height: u32,
    /// 以色度采样为单位
    pub crop_bottom: u32,
    pub log2_max_poc_lsb_minus4: u32,
    pub max_dec_pic_buffering: u32,
    /// 每个集合的前向 delta_poc (全部 used_by_curr)
    pub short_term_rps: Vec<Vec<i32>>,
    pub long_term_ref_pics: Option<Vec<(u32, bool)>>,
    pub temporal_mvp: bool,
    pub sao: bool,
    pub timing: Option<(u32, u32)>,
}

impl Default for SpsBuilder {
    fn default() -> Self {
        Self {
            vps_id: 0,
            sps_id: 0,
            width: 320,
            height: 240,
            crop_bottom: 0,
            log2_max_poc_lsb_minus4: 4,
            max_dec_pic_buffering: 5,
            short_term_rps: Vec::new(),
            long_term_ref_pics: None,
            temporal_mvp: false,
            sao: false,
            timing: None,
        }
    }
}

pub fn sps_payload(b: &SpsBuilder) -> Vec<u8> {
    let log2_max_poc_lsb = b.log2_max_poc_lsb_minus4 + 4;
    let mut w = BitWriter::new();
    w.write_bits(b.vps_id, 4);
    w.write_bits(0, 3);
    w.write_flag(true);
    write_general_ptl(&mut w);
    w.write_ue(b.sps_id);
    w.write_ue(1); // 4:2:0
    w.write_ue(b.width);
    w.write_ue(b.height);
    if b.crop_bottom > 0 {
        w.write_flag(true);
        for value in [0, 0, 0, b.crop_bottom] {
            w.write_ue(value);
        }
    } else {
        w.write_flag(false);
    }
    w.write_ue(0);
    w.write_ue(0);
    w.write_ue(b.log2_max_poc_lsb_minus4);
    w.write_flag(true);
    w.write_ue(b.max_dec_pic_buffering - 1);
    w.write_ue(0);
    w.write_ue(0);
    w.write_ue(0); // log2_min_luma_coding_block_size_minus3
    w.write_ue(1); // CTB 16x16
    w.write_ue(0);
    w.write_ue(2);
    w.write_ue(0);
    w.write_ue(0);
    w.write_flag(false); // scaling_list_enabled
    w.write_flag(false); // amp
    w.write_flag(b.sao);
    w.write_flag(false); // pcm
    w.write_ue(b.short_term_rps.len() as u32);
    for (idx, set) in b.short_term_rps.iter().enumerate() {
        if idx > 0 {
            w.write_flag(false);
        }
        let negative: Vec<(i32, bool)> = set.iter().map(|&d| (d, true)).collect();
        write_explicit_rps(&mut w, &negative, &[]);
    }
    match &b.long_term_ref_pics {
        Some(pics) => {
            w.write_flag(true);
            w.write_ue(pics.len() as u32);
            for &(lsb, used) in pics {
                w.write_bits(lsb, log2_max_poc_lsb);
                w.write_flag(used);
            }
        }
        None => w.write_flag(false),
    }
    w.write_flag(b.temporal_mvp);
    w.write_flag(false); // strong_intra_smoothing
    match b.timing {
        Some((num_units_in_tick, time_scale)) => {
            w.write_flag(true);
            for _ in 0..8 {
                w.write_flag(false); // aspect .. default_display_window
            }
            w.write_flag(true);
            w.write_bits(num_units_in_tick, 32);
            w.write_bits(time_scale, 32);
            w.write_flag(false); // poc_proportional_to_timing
            w.write_flag(false); // hrd_parameters_present
            w.write_flag(false); // bitstream_restriction
        }
        None => w.write_flag(false),
    }
    w.write_flag(false); // sps_extension_present_flag
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

pub fn parse_sps_builder(b: &SpsBuilder) -> Sps {
    parse_sps(&mut BitReader::new(&sps_payload(b))).unwrap()
}

pub struct PpsBuilder {
    pub pps_id: u32,
    pub sps_id: u32,
    pub dependent_slice_segments_enabled: bool,
    pub output_flag_present: bool,
    pub num_ref_idx_default_active: [u32; 2],
    pub tiles: Option<(u32, u32)>,
    pub lists_modification_present: bool,
}

impl Default for PpsBuilder {
    fn default() -> Self {
        Self {
            pps_id: 0,
            sps_id: 0,
            dependent_slice_segments_enabled: false,
            output_flag_present: false,
            num_ref_idx_default_active: [1, 1],
            tiles: None,
            lists_modification_present: false,
        }
    }
}

pub fn pps_payload(b: &PpsBuilder) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_ue(b.pps_id);
    w.write_ue(b.sps_id);
    w.write_flag(b.dependent_slice_segments_enabled);
    w.write_flag(b.output_flag_present);
    w.write_bits(0, 3);
    w.write_flag(false); // sign_data_hiding
    w.write_flag(false); // cabac_init_present
    w.write_ue(b.num_ref_idx_default_active[0] - 1);
    w.write_ue(b.num_ref_idx_default_active[1] - 1);
    w.write_se(0);
    w.write_flag(false);
    w.write_flag(false);
    w.write_flag(false); // cu_qp_delta_enabled
    w.write_se(0);
    w.write_se(0);
    w.write_flag(false);
    w.write_flag(false);
    w.write_flag(false);
    w.write_flag(false);
    w.write_flag(b.tiles.is_some());
    w.write_flag(false); // entropy_coding_sync
    if let Some((columns, rows)) = b.tiles {
        w.write_ue(columns - 1);
        w.write_ue(rows - 1);
        w.write_flag(true);
        w.write_flag(true);
    }
    w.write_flag(false); // loop_filter_across_slices
    w.write_flag(false); // deblocking_filter_control_present
    w.write_flag(false); // scaling_list_data_present
    w.write_flag(b.lists_modification_present);
    w.write_ue(0);
    w.write_flag(false); // slice_segment_header_extension_present
    w.write_flag(false); // pps_extension_present
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

/// 解析构造好的 SPS/PPS
pub fn param_sets(sps: &SpsBuilder, pps: &PpsBuilder) -> (Sps, Pps) {
    let sps = parse_sps_builder(sps);
    let pps = parse_pps(&mut BitReader::new(&pps_payload(pps))).unwrap();
    (sps, pps)
}

/// 不含 inter_ref_pic_set_prediction_flag 的显式参考图像集
pub fn write_explicit_rps(w: &mut BitWriter, negative: &[(i32, bool)], positive: &[(i32, bool)]) {
    w.write_ue(negative.len() as u32);
    w.write_ue(positive.len() as u32);
    let mut prev = 0;
    for &(delta, used) in negative {
        w.write_ue((prev - delta - 1) as u32);
        w.write_flag(used);
        prev = delta;
    }
    prev = 0;
    for &(delta, used) in positive {
        w.write_ue((delta - prev - 1) as u32);
        w.write_flag(used);
        prev = delta;
    }
}

/// 预测方式的参考图像集; `flags` 为 (used_by_curr_pic_flag, use_delta_flag)
pub fn write_inter_rps(
    w: &mut BitWriter,
    delta_idx_minus1: Option<u32>,
    delta_rps: i32,
    flags: &[(bool, bool)],
) {
    if let Some(delta_idx_minus1) = delta_idx_minus1 {
        w.write_ue(delta_idx_minus1);
    }
    w.write_flag(delta_rps < 0);
    w.write_ue(delta_rps.unsigned_abs() - 1);
    for &(used, use_delta) in flags {
        w.write_flag(used);
        if !used {
            w.write_flag(use_delta);
        }
    }
}

#[derive(Clone)]
pub struct SliceBuilder {
    pub nal_type: NalUnitType,
    pub temporal_id: u8,
    pub first_slice_segment: bool,
    pub dependent: bool,
    pub segment_address: u32,
    /// 0=B, 1=P, 2=I
    pub slice_type_raw: u32,
    pub poc_lsb: u32,
    pub sps_rps_idx: Option<u32>,
    pub rps_negative: Vec<i32>,
    pub rps_positive: Vec<i32>,
    /// (poc_lsb, used_by_curr, delta_poc_msb_cycle_lt)
    pub long_term: Vec<(u32, bool, Option<u32>)>,
    pub list_entry_l0: Option<Vec<u32>>,
}

impl SliceBuilder {
    pub fn idr() -> Self {
        Self {
            nal_type: NalUnitType::IdrWRadl,
            temporal_id: 0,
            first_slice_segment: true,
            dependent: false,
            segment_address: 0,
            slice_type_raw: 2,
            poc_lsb: 0,
            sps_rps_idx: None,
            rps_negative: Vec::new(),
            rps_positive: Vec::new(),
            long_term: Vec::new(),
            list_entry_l0: None,
        }
    }

    pub fn cra(poc_lsb: u32) -> Self {
        Self {
            nal_type: NalUnitType::Cra,
            poc_lsb,
            ..Self::idr()
        }
    }

    /// 参考前一个图像的 P 条带
    pub fn trail(poc_lsb: u32) -> Self {
        Self {
            nal_type: NalUnitType::TrailR,
            slice_type_raw: 1,
            poc_lsb,
            rps_negative: vec![-1],
            ..Self::idr()
        }
    }

    pub fn b(poc_lsb: u32, negative: &[i32], positive: &[i32]) -> Self {
        Self {
            slice_type_raw: 0,
            ..Self::trail(poc_lsb).with_rps(negative, positive)
        }
    }

    pub fn with_type(mut self, nal_type: NalUnitType) -> Self {
        self.nal_type = nal_type;
        self
    }

    pub fn with_sps_rps(mut self, idx: u32) -> Self {
        self.sps_rps_idx = Some(idx);
        self
    }

    pub fn with_rps(mut self, negative: &[i32], positive: &[i32]) -> Self {
        self.sps_rps_idx = None;
        self.rps_negative = negative.to_vec();
        self.rps_positive = positive.to_vec();
        self
    }

    pub fn with_long_term(mut self, entries: &[(u32, bool, Option<u32>)]) -> Self {
        self.long_term = entries.to_vec();
        self
    }

    pub fn with_list_entry_l0(mut self, entries: Vec<u32>) -> Self {
        self.list_entry_l0 = Some(entries);
        self
    }

    pub fn nal_header(&self) -> NalHeader {
        NalHeader {
            nal_type: self.nal_type,
            layer_id: 0,
            temporal_id: self.temporal_id,
        }
    }

    /// 含头部的完整 NAL
    pub fn nal(&self, sps: &Sps, pps: &Pps) -> Vec<u8> {
        nal_bytes(self.nal_type.type_id(), self.temporal_id, &slice_payload(self, sps, pps))
    }
}

pub fn slice_payload(b: &SliceBuilder, sps: &Sps, pps: &Pps) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_flag(b.first_slice_segment);
    if b.nal_type.is_irap() {
        w.write_flag(false);
    }
    w.write_ue(pps.pps_id);
    if !b.first_slice_segment {
        if pps.dependent_slice_segments_enabled {
            w.write_flag(b.dependent);
        }
        w.write_bits(b.segment_address, ceil_log2(sps.pic_size_in_ctbs()));
    }

    if !b.dependent {
        w.write_ue(b.slice_type_raw);
        if pps.output_flag_present {
            w.write_flag(true);
        }
        let mut total_curr = 0;
        if !b.nal_type.is_idr() {
            w.write_bits(b.poc_lsb, sps.log2_max_poc_lsb);
            match b.sps_rps_idx {
                Some(idx) => {
                    w.write_flag(true);
                    let count = sps.short_term_rps.len() as u32;
                    if count > 1 {
                        w.write_bits(idx, ceil_log2(count));
                    }
                    total_curr += sps.short_term_rps[idx as usize].num_used_by_curr();
                }
                None => {
                    w.write_flag(false);
                    if !sps.short_term_rps.is_empty() {
                        w.write_flag(false);
                    }
                    let negative: Vec<(i32, bool)> = b.rps_negative.iter().map(|&d| (d, true)).collect();
                    let positive: Vec<(i32, bool)> = b.rps_positive.iter().map(|&d| (d, true)).collect();
                    write_explicit_rps(&mut w, &negative, &positive);
                    total_curr += negative.len() + positive.len();
                }
            }
            if sps.long_term_ref_pics_present {
                if !sps.long_term_ref_pics.is_empty() {
                    w.write_ue(0);
                }
                w.write_ue(b.long_term.len() as u32);
                for &(lsb, used, cycle) in &b.long_term {
                    w.write_bits(lsb, sps.log2_max_poc_lsb);
                    w.write_flag(used);
                    w.write_flag(cycle.is_some());
                    if let Some(cycle) = cycle {
                        w.write_ue(cycle);
                    }
                    total_curr += usize::from(used);
                }
            }
            if sps.temporal_mvp_enabled {
                w.write_flag(false);
            }
        }
        if sps.sao_enabled {
            w.write_flag(false);
            w.write_flag(false);
        }
        let is_b = b.slice_type_raw == 0;
        if b.slice_type_raw < 2 {
            w.write_flag(false); // num_ref_idx_active_override_flag
            let total_curr = total_curr as u32;
            if pps.lists_modification_present && total_curr > 1 {
                w.write_flag(b.list_entry_l0.is_some());
                if let Some(entries) = &b.list_entry_l0 {
                    for &entry in entries {
                        w.write_bits(entry, ceil_log2(total_curr));
                    }
                }
                if is_b {
                    w.write_flag(false);
                }
            }
            if is_b {
                w.write_flag(false); // mvd_l1_zero_flag
            }
            w.write_ue(0); // five_minus_max_num_merge_cand
        }
        w.write_se(0); // slice_qp_delta
    }
    if pps.tiles.is_some() || pps.entropy_coding_sync_enabled {
        w.write_ue(0);
    }
    // 条带数据占位
    w.write_bits(0xA5, 8);
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

pub fn nal_bytes(type_id: u8, temporal_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut nal = vec![type_id << 1, temporal_id + 1];
    nal.extend_from_slice(payload);
    nal
}

pub fn vps_nal(b: &VpsBuilder) -> Vec<u8> {
    nal_bytes(32, 0, &vps_payload(b))
}

pub fn sps_nal(b: &SpsBuilder) -> Vec<u8> {
    nal_bytes(33, 0, &sps_payload(b))
}

pub fn pps_nal(b: &PpsBuilder) -> Vec<u8> {
    nal_bytes(34, 0, &pps_payload(b))
}

/// recovery_point 前缀 SEI NAL
pub fn recovery_point_sei(recovery_poc_cnt: i32) -> Vec<u8> {
    let mut body = BitWriter::new();
    body.write_se(recovery_poc_cnt);
    body.write_flag(true);
    body.write_flag(false);
    body.align_zero();
    let body = body.finish();
    let mut payload = vec![6, body.len() as u8];
    payload.extend_from_slice(&body);
    payload.push(0x80);
    nal_bytes(39, 0, &payload)
}
