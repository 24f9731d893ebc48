//! 集成测试共用的码流构造工具
//!
//! 只使用公开的 `BitWriter` 与防竞争字节插入, 不依赖二进制样本文件.

#![allow(dead_code)]

use liu::core::BitWriter;
use liu::core::emulation::add_emulation_prevention;

/// 以 4 字节起始码拼接
pub fn annex_b(nals: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

/// 以大端长度前缀拼接
pub fn length_prefixed(nals: &[Vec<u8>], length_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        let len = (nal.len() as u32).to_be_bytes();
        out.extend_from_slice(&len[4 - length_size..]);
        out.extend_from_slice(nal);
    }
    out
}

fn finish_rbsp(mut w: BitWriter) -> Vec<u8> {
    w.write_rbsp_trailing_bits();
    add_emulation_prevention(&w.finish())
}

pub mod avc {
    use super::*;

    /// log2_max_frame_num = 4
    pub const LOG2_MAX_FRAME_NUM: u32 = 4;
    /// log2_max_pic_order_cnt_lsb = 6
    pub const LOG2_MAX_POC_LSB: u32 = 6;

    pub fn nal(ref_idc: u8, type_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut nal = vec![(ref_idc << 5) | type_id];
        nal.extend_from_slice(payload);
        nal
    }

    /// Baseline SPS: POC 类型 0, 176x144, 无 VUI
    pub fn sps(max_num_ref_frames: u32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(66, 8);
        w.write_bits(0, 8);
        w.write_bits(30, 8);
        w.write_ue(0); // sps_id
        w.write_ue(LOG2_MAX_FRAME_NUM - 4);
        w.write_ue(0); // pic_order_cnt_type
        w.write_ue(LOG2_MAX_POC_LSB - 4);
        w.write_ue(max_num_ref_frames);
        w.write_flag(false); // gaps_in_frame_num_value_allowed
        w.write_ue(10);
        w.write_ue(8);
        w.write_flag(true); // frame_mbs_only
        w.write_flag(true); // direct_8x8_inference
        w.write_flag(false); // cropping
        w.write_flag(false); // vui
        nal(3, 7, &finish_rbsp(w))
    }

    pub fn pps() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_ue(0);
        w.write_ue(0);
        w.write_flag(false); // entropy_coding_mode
        w.write_flag(false); // bottom_field_pic_order_in_frame_present
        w.write_ue(0); // num_slice_groups_minus1
        w.write_ue(0);
        w.write_ue(0);
        w.write_flag(false); // weighted_pred
        w.write_bits(0, 2);
        w.write_se(0);
        w.write_se(0);
        w.write_se(0);
        w.write_flag(true); // deblocking_filter_control_present
        w.write_flag(false);
        w.write_flag(false); // redundant_pic_cnt_present
        nal(3, 8, &finish_rbsp(w))
    }

    pub fn aud() -> Vec<u8> {
        vec![0x09, 0xF0]
    }

    /// 条带 NAL 描述
    #[derive(Debug, Clone)]
    pub struct Slice {
        pub idr: bool,
        pub ref_idc: u8,
        /// 0=P, 1=B, 2=I
        pub slice_type: u32,
        pub frame_num: u32,
        pub idr_pic_id: u32,
        pub poc_lsb: u32,
        pub long_term_reference: bool,
        /// MMCO1 的 difference_of_pic_nums_minus1
        pub forget_short_term: Option<u32>,
    }

    impl Slice {
        pub fn idr(idr_pic_id: u32) -> Self {
            Self {
                idr: true,
                ref_idc: 3,
                slice_type: 2,
                frame_num: 0,
                idr_pic_id,
                poc_lsb: 0,
                long_term_reference: false,
                forget_short_term: None,
            }
        }

        pub fn p(frame_num: u32, poc_lsb: u32) -> Self {
            Self {
                idr: false,
                ref_idc: 2,
                slice_type: 0,
                frame_num,
                poc_lsb,
                ..Self::idr(0)
            }
        }

        pub fn nal(&self) -> Vec<u8> {
            let mut w = BitWriter::new();
            w.write_ue(0); // first_mb_in_slice
            w.write_ue(self.slice_type + 5);
            w.write_ue(0); // pps_id
            w.write_bits(self.frame_num, LOG2_MAX_FRAME_NUM);
            if self.idr {
                w.write_ue(self.idr_pic_id);
            }
            w.write_bits(self.poc_lsb, LOG2_MAX_POC_LSB);
            if self.slice_type == 1 {
                w.write_flag(true); // direct_spatial_mv_pred
            }
            if self.slice_type != 2 {
                w.write_flag(false); // num_ref_idx_active_override
                w.write_flag(false); // ref_pic_list_modification_flag_l0
            }
            if self.slice_type == 1 {
                w.write_flag(false);
            }
            if self.ref_idc != 0 {
                if self.idr {
                    w.write_flag(false);
                    w.write_flag(self.long_term_reference);
                } else if let Some(diff) = self.forget_short_term {
                    w.write_flag(true);
                    w.write_ue(1);
                    w.write_ue(diff);
                    w.write_ue(0);
                } else {
                    w.write_flag(false);
                }
            }
            w.write_se(0); // slice_qp_delta
            w.write_ue(0); // disable_deblocking_filter_idc
            w.write_se(0);
            w.write_se(0);
            w.write_bits(0xA5, 8);
            let type_id = if self.idr { 5 } else { 1 };
            nal(self.ref_idc, type_id, &finish_rbsp(w))
        }
    }
}

pub mod hevc {
    use super::*;

    /// log2_max_pic_order_cnt_lsb = 8
    pub const LOG2_MAX_POC_LSB: u32 = 8;

    pub const IDR_W_RADL: u8 = 19;
    pub const TRAIL_R: u8 = 1;
    pub const PREFIX_SEI: u8 = 39;

    pub fn nal(type_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut nal = vec![type_id << 1, 1];
        nal.extend_from_slice(payload);
        nal
    }

    fn write_ptl(w: &mut BitWriter) {
        w.write_bits(0, 2);
        w.write_flag(false);
        w.write_bits(1, 5); // Main
        w.write_bits(0x6000_0000, 32);
        w.write_bits(0b1001, 4);
        w.write_bits(0, 32);
        w.write_bits(0, 12);
        w.write_bits(93, 8);
    }

    pub fn vps() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0, 4);
        w.write_flag(true);
        w.write_flag(true);
        w.write_bits(0, 6);
        w.write_bits(0, 3); // max_sub_layers_minus1
        w.write_flag(true);
        w.write_bits(0xFFFF, 16);
        write_ptl(&mut w);
        w.write_flag(false);
        w.write_ue(4);
        w.write_ue(2);
        w.write_ue(0);
        w.write_bits(0, 6);
        w.write_ue(0);
        w.write_flag(false); // timing
        w.write_flag(false); // extension
        nal(32, &finish_rbsp(w))
    }

    /// 320x240, 无 SPS 内参考图像集; `long_term` 打开 long_term_ref_pics_present
    pub fn sps(long_term: bool) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0, 4);
        w.write_bits(0, 3);
        w.write_flag(true);
        write_ptl(&mut w);
        w.write_ue(0); // sps_id
        w.write_ue(1); // 4:2:0
        w.write_ue(320);
        w.write_ue(240);
        w.write_flag(false); // conformance_window
        w.write_ue(0);
        w.write_ue(0);
        w.write_ue(LOG2_MAX_POC_LSB - 4);
        w.write_flag(true);
        w.write_ue(4); // max_dec_pic_buffering_minus1
        w.write_ue(0);
        w.write_ue(0);
        w.write_ue(0);
        w.write_ue(1);
        w.write_ue(0);
        w.write_ue(2);
        w.write_ue(0);
        w.write_ue(0);
        w.write_flag(false); // scaling_list
        w.write_flag(false); // amp
        w.write_flag(false); // sao
        w.write_flag(false); // pcm
        w.write_ue(0); // num_short_term_ref_pic_sets
        w.write_flag(long_term);
        if long_term {
            w.write_ue(0); // num_long_term_ref_pics_sps
        }
        w.write_flag(false); // temporal_mvp
        w.write_flag(false); // strong_intra_smoothing
        w.write_flag(false); // vui
        w.write_flag(false); // extension
        nal(33, &finish_rbsp(w))
    }

    pub fn pps() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_ue(0);
        w.write_ue(0);
        w.write_flag(false); // dependent_slice_segments_enabled
        w.write_flag(false); // output_flag_present
        w.write_bits(0, 3);
        w.write_flag(false);
        w.write_flag(false);
        w.write_ue(0);
        w.write_ue(0);
        w.write_se(0);
        w.write_flag(false);
        w.write_flag(false);
        w.write_flag(false);
        w.write_se(0);
        w.write_se(0);
        w.write_flag(false);
        w.write_flag(false);
        w.write_flag(false);
        w.write_flag(false);
        w.write_flag(false); // tiles
        w.write_flag(false); // entropy_coding_sync
        w.write_flag(false);
        w.write_flag(false); // deblocking_filter_control_present
        w.write_flag(false); // scaling_list_data
        w.write_flag(false); // lists_modification_present
        w.write_ue(0);
        w.write_flag(false);
        w.write_flag(false); // extension
        nal(34, &finish_rbsp(w))
    }

    /// recovery_point 前缀 SEI
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
        nal(PREFIX_SEI, &payload)
    }

    /// 条带段 NAL 描述
    #[derive(Debug, Clone)]
    pub struct Slice {
        pub nal_type: u8,
        /// 0=B, 1=P, 2=I
        pub slice_type: u32,
        pub poc_lsb: u32,
        pub negative: Vec<i32>,
        pub positive: Vec<i32>,
        /// (poc_lsb_lt, used_by_curr)
        pub long_term: Vec<(u32, bool)>,
        /// SPS 打开了 long_term_ref_pics_present
        pub long_term_present: bool,
    }

    impl Slice {
        pub fn idr() -> Self {
            Self {
                nal_type: IDR_W_RADL,
                slice_type: 2,
                poc_lsb: 0,
                negative: Vec::new(),
                positive: Vec::new(),
                long_term: Vec::new(),
                long_term_present: false,
            }
        }

        pub fn trail(poc_lsb: u32, negative: &[i32]) -> Self {
            Self {
                nal_type: TRAIL_R,
                slice_type: 1,
                poc_lsb,
                negative: negative.to_vec(),
                ..Self::idr()
            }
        }

        pub fn b(poc_lsb: u32, negative: &[i32], positive: &[i32]) -> Self {
            Self {
                slice_type: 0,
                positive: positive.to_vec(),
                ..Self::trail(poc_lsb, negative)
            }
        }

        pub fn with_long_term(mut self, entries: &[(u32, bool)]) -> Self {
            self.long_term_present = true;
            self.long_term = entries.to_vec();
            self
        }

        pub fn nal(&self) -> Vec<u8> {
            let irap = (16..=23).contains(&self.nal_type);
            let idr = self.nal_type == 19 || self.nal_type == 20;
            let mut w = BitWriter::new();
            w.write_flag(true); // first_slice_segment_in_pic
            if irap {
                w.write_flag(false);
            }
            w.write_ue(0); // pps_id
            w.write_ue(self.slice_type);
            if !idr {
                w.write_bits(self.poc_lsb, LOG2_MAX_POC_LSB);
                w.write_flag(false); // short_term_ref_pic_set_sps_flag
                w.write_ue(self.negative.len() as u32);
                w.write_ue(self.positive.len() as u32);
                let mut prev = 0;
                for &delta in &self.negative {
                    w.write_ue((prev - delta - 1) as u32);
                    w.write_flag(true);
                    prev = delta;
                }
                prev = 0;
                for &delta in &self.positive {
                    w.write_ue((delta - prev - 1) as u32);
                    w.write_flag(true);
                    prev = delta;
                }
                if self.long_term_present {
                    w.write_ue(self.long_term.len() as u32);
                    for &(lsb, used) in &self.long_term {
                        w.write_bits(lsb, LOG2_MAX_POC_LSB);
                        w.write_flag(used);
                        w.write_flag(false); // delta_poc_msb_present
                    }
                }
            }
            if self.slice_type < 2 {
                w.write_flag(false); // num_ref_idx_active_override
                if self.slice_type == 0 {
                    w.write_flag(false); // mvd_l1_zero
                }
                w.write_ue(0); // five_minus_max_num_merge_cand
            }
            w.write_se(0); // slice_qp_delta
            w.write_bits(0xA5, 8);
            nal(self.nal_type, &finish_rbsp(w))
        }
    }
}
