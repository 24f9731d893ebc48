//! H.264 图像顺序计数 (8.2.1).
//!
//! 计算分两步: [`PocState::compute`] 只读取状态得出当前图像的 POC,
//! 图像结束 (参考标记完成) 后调用 [`PocState::commit`] 更新 "前一图像" 状态.
//! MMCO5 会影响后续图像的推导, 因此提交时需要告知是否执行了 MMCO5.

use super::slice::{PicStructure, SliceHeader};
use super::sps::Sps;

/// 一个图像的 POC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicOrderCount {
    /// TopFieldOrderCnt
    pub top: i32,
    /// BottomFieldOrderCnt
    pub bottom: i32,
    /// 图像结构
    pub structure: PicStructure,
    /// poc_type == 0 时的 PicOrderCntMsb
    msb: i32,
    /// poc_type != 0 时的 FrameNumOffset
    frame_num_offset: i32,
}

impl PicOrderCount {
    /// PicOrderCnt(CurrPic)
    pub fn poc(&self) -> i32 {
        match self.structure {
            PicStructure::Frame => self.top.min(self.bottom),
            PicStructure::TopField => self.top,
            PicStructure::BottomField => self.bottom,
        }
    }

    /// MMCO5 之后的 POC: 两场计数都减去 tempPicOrderCnt
    pub fn cleared(&self) -> Self {
        let temp = self.poc();
        Self {
            top: self.top - temp,
            bottom: self.bottom - temp,
            ..*self
        }
    }
}

/// 跨图像的 POC 推导状态
#[derive(Debug, Clone, Default)]
pub struct PocState {
    prev_poc_msb: i32,
    prev_poc_lsb: i32,
    prev_frame_num_offset: i32,
    prev_frame_num: u32,
}

impl PocState {
    /// 创建初始状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空状态 (序列重新开始)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 计算当前图像的 POC
    pub fn compute(&self, sps: &Sps, slice: &SliceHeader) -> PicOrderCount {
        match sps.poc_type {
            0 => self.compute_type0(sps, slice),
            1 => self.compute_type1(sps, slice),
            _ => self.compute_type2(sps, slice),
        }
    }

    /// 图像完成后更新状态, 返回该图像最终的 POC
    ///
    /// `had_mmco5` 表示该图像的参考标记包含 MMCO5, 此时返回平移后的值.
    pub fn commit(
        &mut self,
        sps: &Sps,
        slice: &SliceHeader,
        poc: &PicOrderCount,
        had_mmco5: bool,
    ) -> PicOrderCount {
        let final_poc = if had_mmco5 { poc.cleared() } else { *poc };
        if sps.poc_type == 0 {
            if slice.is_reference() {
                if had_mmco5 {
                    self.prev_poc_msb = 0;
                    self.prev_poc_lsb = match slice.structure {
                        PicStructure::Frame => final_poc.top,
                        PicStructure::TopField | PicStructure::BottomField => 0,
                    };
                } else {
                    self.prev_poc_msb = poc.msb;
                    self.prev_poc_lsb = slice.pic_order_cnt_lsb as i32;
                }
            }
        } else if had_mmco5 {
            self.prev_frame_num_offset = 0;
        } else {
            self.prev_frame_num_offset = poc.frame_num_offset;
        }
        self.prev_frame_num = if had_mmco5 { 0 } else { slice.frame_num };
        final_poc
    }

    fn compute_type0(&self, sps: &Sps, slice: &SliceHeader) -> PicOrderCount {
        let (prev_msb, prev_lsb) = if slice.is_idr() {
            (0, 0)
        } else {
            (self.prev_poc_msb, self.prev_poc_lsb)
        };
        let max_lsb = sps.max_poc_lsb() as i32;
        let lsb = slice.pic_order_cnt_lsb as i32;

        let msb = if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
            prev_msb + max_lsb
        } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
            prev_msb - max_lsb
        } else {
            prev_msb
        };

        let (top, bottom) = match slice.structure {
            PicStructure::Frame => {
                let top = msb + lsb;
                (top, top + slice.delta_pic_order_cnt_bottom)
            }
            PicStructure::TopField | PicStructure::BottomField => (msb + lsb, msb + lsb),
        };
        PicOrderCount {
            top,
            bottom,
            structure: slice.structure,
            msb,
            frame_num_offset: 0,
        }
    }

    /// FrameNumOffset (8-6 / 8-11)
    fn frame_num_offset(&self, sps: &Sps, slice: &SliceHeader) -> i32 {
        if slice.is_idr() {
            0
        } else if self.prev_frame_num > slice.frame_num {
            self.prev_frame_num_offset + sps.max_frame_num() as i32
        } else {
            self.prev_frame_num_offset
        }
    }

    fn compute_type1(&self, sps: &Sps, slice: &SliceHeader) -> PicOrderCount {
        let frame_num_offset = self.frame_num_offset(sps, slice);
        let cycle = &sps.offset_for_ref_frame;

        let mut abs_frame_num = if cycle.is_empty() {
            0
        } else {
            frame_num_offset + slice.frame_num as i32
        };
        if !slice.is_reference() && abs_frame_num > 0 {
            abs_frame_num -= 1;
        }

        let mut expected = 0i32;
        if abs_frame_num > 0 {
            let cycle_len = cycle.len() as i32;
            let delta_per_cycle: i32 = cycle.iter().sum();
            let cycle_cnt = (abs_frame_num - 1) / cycle_len;
            let in_cycle = (abs_frame_num - 1) % cycle_len;
            expected = cycle_cnt.wrapping_mul(delta_per_cycle);
            for offset in &cycle[..=in_cycle as usize] {
                expected = expected.wrapping_add(*offset);
            }
        }
        if !slice.is_reference() {
            expected += sps.offset_for_non_ref_pic;
        }

        let delta = slice.delta_pic_order_cnt;
        let (top, bottom) = match slice.structure {
            PicStructure::Frame => {
                let top = expected + delta[0];
                (top, top + sps.offset_for_top_to_bottom_field + delta[1])
            }
            PicStructure::TopField => {
                let top = expected + delta[0];
                (top, top)
            }
            PicStructure::BottomField => {
                let bottom = expected + sps.offset_for_top_to_bottom_field + delta[0];
                (bottom, bottom)
            }
        };
        PicOrderCount {
            top,
            bottom,
            structure: slice.structure,
            msb: 0,
            frame_num_offset,
        }
    }

    fn compute_type2(&self, sps: &Sps, slice: &SliceHeader) -> PicOrderCount {
        let frame_num_offset = self.frame_num_offset(sps, slice);
        let temp = if slice.is_idr() {
            0
        } else if !slice.is_reference() {
            2 * (frame_num_offset + slice.frame_num as i32) - 1
        } else {
            2 * (frame_num_offset + slice.frame_num as i32)
        };
        PicOrderCount {
            top: temp,
            bottom: temp,
            structure: slice.structure,
            msb: 0,
            frame_num_offset,
        }
    }
}
