//! H.264 参考帧标记跟踪 (8.2.5).
//!
//! 只维护参考帧的 "身份" (frame_num / POC / 长期索引), 不持有像素数据.
//! 与码流不一致 (MMCO 目标不存在、缓冲已满却没有短期参考等) 时清空跟踪状态,
//! 在下一个 IDR 处重新同步.

use liu_core::{LiuError, LiuResult};
use log::{debug, warn};

use super::slice::{Mmco, PicStructure, RefPicMarking, SliceHeader};
use super::sps::Sps;

const TOP: u8 = 0b01;
const BOTTOM: u8 = 0b10;
const BOTH: u8 = TOP | BOTTOM;

fn parity_bits(structure: PicStructure) -> u8 {
    match structure {
        PicStructure::Frame => BOTH,
        PicStructure::TopField => TOP,
        PicStructure::BottomField => BOTTOM,
    }
}

/// 一个参考帧 (或参考场对)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefFrame {
    /// frame_num
    pub frame_num: u32,
    /// 图像顺序计数
    pub poc: i32,
    /// 长期参考索引, 短期参考为 `None`
    pub long_term_frame_idx: Option<u32>,
    /// 由 frame_num 间隙推断出的 "不存在" 帧
    pub non_existing: bool,
    /// 已标记为参考的场
    fields: u8,
}

impl RefFrame {
    /// 是否为长期参考
    pub fn is_long_term(&self) -> bool {
        self.long_term_frame_idx.is_some()
    }

    /// 两个场是否都被标记为参考
    pub fn is_complete(&self) -> bool {
        self.fields == BOTH
    }
}

/// 一次标记的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkingOutcome {
    /// 当前图像被标记为长期参考
    pub long_term: bool,
    /// 执行了 MMCO5
    pub had_mmco5: bool,
    /// 因 frame_num 间隙插入的不存在帧数量
    pub gap_frames: u32,
    /// 处于失步状态, 当前图像未参与跟踪
    pub skipped: bool,
}

/// 尚未配对的第一场
#[derive(Debug, Clone, Copy)]
struct FirstField {
    frame_num: u32,
    structure: PicStructure,
    reference: bool,
}

/// 参考帧跟踪器
#[derive(Debug, Clone, Default)]
pub struct ReferenceTracker {
    frames: Vec<RefFrame>,
    /// MaxLongTermFrameIdx, `None` 表示 "没有长期帧索引"
    max_long_term_frame_idx: Option<u32>,
    /// PrevRefFrameNum
    prev_ref_frame_num: Option<u32>,
    first_field: Option<FirstField>,
    awaiting_idr: bool,
}

fn inconsistency(msg: String) -> LiuError {
    LiuError::ReferenceTrackingInconsistency(msg)
}

impl ReferenceTracker {
    /// 创建空跟踪器
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前跟踪的参考帧
    pub fn frames(&self) -> &[RefFrame] {
        &self.frames
    }

    /// 参考帧数量
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// 是否没有参考帧
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 短期参考数量
    pub fn short_term_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_long_term()).count()
    }

    /// 长期参考数量
    pub fn long_term_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_long_term()).count()
    }

    /// MaxLongTermFrameIdx
    pub fn max_long_term_frame_idx(&self) -> Option<u32> {
        self.max_long_term_frame_idx
    }

    /// 是否在等待 IDR 重新同步
    pub fn is_awaiting_idr(&self) -> bool {
        self.awaiting_idr
    }

    /// 清空全部状态
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 对一个完整图像执行参考标记
    ///
    /// `slice` 为该图像的第一个条带, `poc` 为其 PicOrderCnt.
    /// 返回 `ReferenceTrackingInconsistency` 时跟踪状态已被清空.
    pub fn mark(&mut self, sps: &Sps, slice: &SliceHeader, poc: i32) -> LiuResult<MarkingOutcome> {
        let second_field = self.pair_field(slice);
        let mut outcome = MarkingOutcome::default();

        if slice.is_idr() && !second_field {
            let long_term = matches!(
                slice.dec_ref_pic_marking,
                RefPicMarking::Idr {
                    long_term_reference: true,
                    ..
                }
            );
            self.frames.clear();
            self.awaiting_idr = false;
            self.max_long_term_frame_idx = long_term.then_some(0);
            self.frames.push(RefFrame {
                frame_num: slice.frame_num,
                poc,
                long_term_frame_idx: long_term.then_some(0),
                non_existing: false,
                fields: parity_bits(slice.structure),
            });
            self.prev_ref_frame_num = Some(slice.frame_num);
            outcome.long_term = long_term;
            return Ok(outcome);
        }

        if self.awaiting_idr {
            outcome.skipped = true;
            return Ok(outcome);
        }

        match self.mark_non_idr(sps, slice, poc, second_field, &mut outcome) {
            Ok(()) => Ok(outcome),
            Err(err) => {
                debug!("H.264: 参考帧跟踪失步, 等待 IDR: {}", err);
                self.frames.clear();
                self.max_long_term_frame_idx = None;
                self.prev_ref_frame_num = None;
                self.first_field = None;
                self.awaiting_idr = true;
                Err(err)
            }
        }
    }

    /// 判断当前图像是否为参考场对的第二场, 并记录未配对的第一场
    fn pair_field(&mut self, slice: &SliceHeader) -> bool {
        let pending = self.first_field.take();
        if !slice.field_pic() {
            return false;
        }
        let paired = pending.is_some_and(|first| {
            first.frame_num == slice.frame_num
                && first.structure != slice.structure
                && first.reference
                && slice.is_reference()
        });
        if !paired {
            self.first_field = Some(FirstField {
                frame_num: slice.frame_num,
                structure: slice.structure,
                reference: slice.is_reference(),
            });
        }
        paired
    }

    fn mark_non_idr(
        &mut self,
        sps: &Sps,
        slice: &SliceHeader,
        poc: i32,
        second_field: bool,
        outcome: &mut MarkingOutcome,
    ) -> LiuResult<()> {
        let max_frame_num = sps.max_frame_num();
        let capacity = sps.dpb_capacity();

        if !second_field {
            outcome.gap_frames = self.fill_frame_num_gap(sps, slice)?;
        }
        if !slice.is_reference() {
            return Ok(());
        }

        let mut current_long_term = None;
        match &slice.dec_ref_pic_marking {
            RefPicMarking::Adaptive(ops) => {
                for op in ops {
                    self.apply_mmco(op, slice, max_frame_num, second_field, &mut current_long_term)?;
                    if *op == Mmco::ClearAll {
                        outcome.had_mmco5 = true;
                    }
                }
            }
            RefPicMarking::SlidingWindow if !second_field => {
                self.sliding_window(slice.frame_num, max_frame_num, capacity, None)?;
            }
            _ => {}
        }

        let (frame_num, poc) = if outcome.had_mmco5 {
            (0, 0)
        } else {
            (slice.frame_num, poc)
        };
        let bits = parity_bits(slice.structure);
        let paired = if second_field {
            self.frames
                .iter()
                .rposition(|f| f.frame_num == frame_num && !f.non_existing && f.fields & bits == 0)
        } else {
            None
        };
        let current = match paired {
            Some(index) => {
                let entry = &mut self.frames[index];
                entry.fields |= bits;
                if current_long_term.is_some() {
                    entry.long_term_frame_idx = current_long_term;
                }
                index
            }
            None => {
                self.frames.push(RefFrame {
                    frame_num,
                    poc,
                    long_term_frame_idx: current_long_term,
                    non_existing: false,
                    fields: bits,
                });
                self.frames.len() - 1
            }
        };
        outcome.long_term = self.frames[current].is_long_term();

        if self.frames.len() > capacity {
            warn!(
                "H.264: 自适应标记后参考帧超出容量 ({} > {}), 按滑动窗口淘汰",
                self.frames.len(),
                capacity
            );
            self.sliding_window(frame_num, max_frame_num, capacity + 1, Some(current))?;
        }
        self.prev_ref_frame_num = Some(frame_num);
        Ok(())
    }

    /// 处理 frame_num 间隙 (8.2.5.2), 返回插入的不存在帧数量
    fn fill_frame_num_gap(&mut self, sps: &Sps, slice: &SliceHeader) -> LiuResult<u32> {
        let Some(prev) = self.prev_ref_frame_num else {
            return Ok(0);
        };
        let max_frame_num = sps.max_frame_num();
        let expected = (prev + 1) % max_frame_num;
        if slice.frame_num == prev || slice.frame_num == expected {
            return Ok(0);
        }
        if !sps.gaps_in_frame_num_allowed {
            warn!(
                "H.264: frame_num 不连续, prev_ref={}, frame_num={}",
                prev, slice.frame_num
            );
            return Ok(0);
        }

        let capacity = sps.dpb_capacity();
        let mut unused = expected;
        let mut inserted = 0;
        while unused != slice.frame_num {
            self.sliding_window(unused, max_frame_num, capacity, None)?;
            self.frames.push(RefFrame {
                frame_num: unused,
                poc: 0,
                long_term_frame_idx: None,
                non_existing: true,
                fields: BOTH,
            });
            self.prev_ref_frame_num = Some(unused);
            unused = (unused + 1) % max_frame_num;
            inserted += 1;
        }
        debug!(
            "H.264: frame_num 间隙, 插入 {} 个不存在帧 ({} -> {})",
            inserted, prev, slice.frame_num
        );
        Ok(inserted)
    }

    /// FrameNumWrap
    fn frame_num_wrap(frame_num: u32, curr_frame_num: u32, max_frame_num: u32) -> i64 {
        if frame_num > curr_frame_num {
            i64::from(frame_num) - i64::from(max_frame_num)
        } else {
            i64::from(frame_num)
        }
    }

    /// 滑动窗口 (8.2.5.3): 数量达到 `capacity` 时淘汰 FrameNumWrap 最小的短期参考
    fn sliding_window(
        &mut self,
        curr_frame_num: u32,
        max_frame_num: u32,
        capacity: usize,
        keep: Option<usize>,
    ) -> LiuResult<()> {
        while self.frames.len() >= capacity {
            let victim = self
                .frames
                .iter()
                .enumerate()
                .filter(|(i, f)| !f.is_long_term() && Some(*i) != keep)
                .min_by_key(|(_, f)| Self::frame_num_wrap(f.frame_num, curr_frame_num, max_frame_num))
                .map(|(i, _)| i);
            let Some(victim) = victim else {
                return Err(inconsistency(format!(
                    "参考帧已满 ({}) 且没有可淘汰的短期参考",
                    self.frames.len()
                )));
            };
            self.frames.remove(victim);
        }
        Ok(())
    }

    /// CurrPicNum
    fn curr_pic_num(slice: &SliceHeader) -> i64 {
        if slice.field_pic() {
            2 * i64::from(slice.frame_num) + 1
        } else {
            i64::from(slice.frame_num)
        }
    }

    /// 由 picNumX 定位短期参考, 返回 (下标, 场位)
    fn find_short_term(&self, pic_num_x: i64, slice: &SliceHeader, max_frame_num: u32) -> Option<(usize, u8)> {
        let wrap = |f: &RefFrame| Self::frame_num_wrap(f.frame_num, slice.frame_num, max_frame_num);
        if !slice.field_pic() {
            return self
                .frames
                .iter()
                .position(|f| !f.is_long_term() && f.is_complete() && wrap(f) == pic_num_x)
                .map(|i| (i, BOTH));
        }
        let same = parity_bits(slice.structure);
        let bits = if pic_num_x.rem_euclid(2) == 1 { same } else { BOTH ^ same };
        let target = pic_num_x.div_euclid(2);
        self.frames
            .iter()
            .position(|f| !f.is_long_term() && f.fields & bits != 0 && wrap(f) == target)
            .map(|i| (i, bits))
    }

    /// 由 LongTermPicNum 定位长期参考
    fn find_long_term(&self, long_term_pic_num: u32, slice: &SliceHeader) -> Option<(usize, u8)> {
        if !slice.field_pic() {
            return self
                .frames
                .iter()
                .position(|f| f.long_term_frame_idx == Some(long_term_pic_num) && f.is_complete())
                .map(|i| (i, BOTH));
        }
        let same = parity_bits(slice.structure);
        let bits = if long_term_pic_num % 2 == 1 { same } else { BOTH ^ same };
        let target = long_term_pic_num / 2;
        self.frames
            .iter()
            .position(|f| f.long_term_frame_idx == Some(target) && f.fields & bits != 0)
            .map(|i| (i, bits))
    }

    fn unmark(&mut self, index: usize, bits: u8) {
        let entry = &mut self.frames[index];
        entry.fields &= !bits;
        if entry.fields == 0 {
            self.frames.remove(index);
        }
    }

    fn check_long_term_idx(&self, idx: u32, op: &str) -> LiuResult<()> {
        match self.max_long_term_frame_idx {
            Some(max) if idx <= max => Ok(()),
            max => Err(inconsistency(format!(
                "{}: long_term_frame_idx={} 超出 MaxLongTermFrameIdx={:?}",
                op, idx, max
            ))),
        }
    }

    fn apply_mmco(
        &mut self,
        op: &Mmco,
        slice: &SliceHeader,
        max_frame_num: u32,
        second_field: bool,
        current_long_term: &mut Option<u32>,
    ) -> LiuResult<()> {
        let curr_pic_num = Self::curr_pic_num(slice);
        match *op {
            Mmco::ForgetShortTerm {
                difference_of_pic_nums_minus1,
            } => {
                let pic_num_x = curr_pic_num - i64::from(difference_of_pic_nums_minus1) - 1;
                let (index, bits) = self
                    .find_short_term(pic_num_x, slice, max_frame_num)
                    .ok_or_else(|| {
                        inconsistency(format!("MMCO1: 短期参考 picNumX={} 不存在", pic_num_x))
                    })?;
                self.unmark(index, bits);
            }
            Mmco::ForgetLongTerm { long_term_pic_num } => {
                let (index, bits) = self.find_long_term(long_term_pic_num, slice).ok_or_else(|| {
                    inconsistency(format!(
                        "MMCO2: 长期参考 LongTermPicNum={} 不存在",
                        long_term_pic_num
                    ))
                })?;
                self.unmark(index, bits);
            }
            Mmco::ShortTermToLongTerm {
                difference_of_pic_nums_minus1,
                long_term_frame_idx,
            } => {
                self.check_long_term_idx(long_term_frame_idx, "MMCO3")?;
                let pic_num_x = curr_pic_num - i64::from(difference_of_pic_nums_minus1) - 1;
                let (mut index, _) = self
                    .find_short_term(pic_num_x, slice, max_frame_num)
                    .ok_or_else(|| {
                        inconsistency(format!("MMCO3: 短期参考 picNumX={} 不存在", pic_num_x))
                    })?;
                // 同一长期索引已被其他帧占用时释放
                if let Some(other) = self
                    .frames
                    .iter()
                    .position(|f| f.long_term_frame_idx == Some(long_term_frame_idx))
                    && other != index
                {
                    self.frames.remove(other);
                    if other < index {
                        index -= 1;
                    }
                }
                self.frames[index].long_term_frame_idx = Some(long_term_frame_idx);
            }
            Mmco::TrimLongTerm {
                max_long_term_frame_idx_plus1,
            } => {
                let max = max_long_term_frame_idx_plus1.checked_sub(1);
                self.max_long_term_frame_idx = max;
                self.frames.retain(|f| match (f.long_term_frame_idx, max) {
                    (None, _) => true,
                    (Some(idx), Some(max)) => idx <= max,
                    (Some(_), None) => false,
                });
            }
            Mmco::ClearAll => {
                self.frames.clear();
                self.max_long_term_frame_idx = None;
            }
            Mmco::CurrentToLongTerm {
                long_term_frame_idx,
            } => {
                self.check_long_term_idx(long_term_frame_idx, "MMCO6")?;
                let frame_num = slice.frame_num;
                let current_bits = parity_bits(slice.structure);
                // 第二场时, 当前帧的第一场可以保留同一索引
                self.frames.retain(|f| {
                    f.long_term_frame_idx != Some(long_term_frame_idx)
                        || (second_field && f.frame_num == frame_num && f.fields & current_bits == 0)
                });
                *current_long_term = Some(long_term_frame_idx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h264::pps::Pps;
    use crate::h264::test_util::{PpsBuilder, SliceBuilder, SpsBuilder, param_sets, parse_slice};

    struct Harness {
        sps: Sps,
        pps: Pps,
        tracker: ReferenceTracker,
    }

    impl Harness {
        fn new(sps: SpsBuilder) -> Self {
            let (sps, pps) = param_sets(&sps, &PpsBuilder::default());
            Self {
                sps,
                pps,
                tracker: ReferenceTracker::new(),
            }
        }

        fn mark(&mut self, b: SliceBuilder) -> LiuResult<MarkingOutcome> {
            let slice = parse_slice(&b, &self.sps, &self.pps);
            self.tracker.mark(&self.sps, &slice, slice.frame_num as i32 * 2)
        }

        fn frame_nums(&self) -> Vec<u32> {
            self.tracker.frames().iter().map(|f| f.frame_num).collect()
        }
    }

    fn refs(n: u32) -> SpsBuilder {
        SpsBuilder {
            max_num_ref_frames: n,
            ..SpsBuilder::default()
        }
    }

    #[test]
    fn test_sliding_window_evicts_oldest() {
        let mut h = Harness::new(refs(2));
        h.mark(SliceBuilder::idr(0)).unwrap();
        h.mark(SliceBuilder::p(1, 2)).unwrap();
        h.mark(SliceBuilder::p(2, 4)).unwrap();
        assert_eq!(h.frame_nums(), vec![1, 2]);
        h.mark(SliceBuilder::b(3, 5)).unwrap();
        assert_eq!(h.tracker.len(), 2, "非参考图像不改变跟踪状态");
    }

    #[test]
    fn test_sliding_window_across_frame_num_wrap() {
        // MaxFrameNum = 16
        let mut h = Harness::new(refs(2));
        h.mark(SliceBuilder::idr(0)).unwrap();
        for n in 1..16 {
            h.mark(SliceBuilder::p(n, 0)).unwrap();
        }
        h.mark(SliceBuilder::p(0, 0)).unwrap();
        h.mark(SliceBuilder::p(1, 0)).unwrap();
        assert_eq!(h.frame_nums(), vec![0, 1]);
    }

    #[test]
    fn test_idr_long_term_reference() {
        let mut h = Harness::new(refs(1));
        let outcome = h
            .mark(SliceBuilder {
                long_term_reference: true,
                ..SliceBuilder::idr(0)
            })
            .unwrap();
        assert!(outcome.long_term);
        assert_eq!(h.tracker.len(), 1);
        assert_eq!(h.tracker.frames()[0].long_term_frame_idx, Some(0));
        assert_eq!(h.tracker.max_long_term_frame_idx(), Some(0));
    }

    #[test]
    fn test_mmco1_removes_short_term() {
        let mut h = Harness::new(refs(4));
        h.mark(SliceBuilder::idr(0)).unwrap();
        h.mark(SliceBuilder::p(1, 2)).unwrap();
        h.mark(SliceBuilder {
            // picNumX = 2 - 2 = 0
            mmco: Some(vec![Mmco::ForgetShortTerm {
                difference_of_pic_nums_minus1: 1,
            }]),
            ..SliceBuilder::p(2, 4)
        })
        .unwrap();
        assert_eq!(h.frame_nums(), vec![1, 2]);
    }

    #[test]
    fn test_mmco1_absent_target_resyncs_at_idr() {
        let mut h = Harness::new(refs(4));
        h.mark(SliceBuilder::idr(0)).unwrap();
        let err = h
            .mark(SliceBuilder {
                mmco: Some(vec![Mmco::ForgetShortTerm {
                    difference_of_pic_nums_minus1: 4,
                }]),
                ..SliceBuilder::p(1, 2)
            })
            .unwrap_err();
        assert!(matches!(err, LiuError::ReferenceTrackingInconsistency(_)), "{err}");
        assert!(h.tracker.is_empty());
        assert!(h.tracker.is_awaiting_idr());

        let outcome = h.mark(SliceBuilder::p(2, 4)).unwrap();
        assert!(outcome.skipped);
        assert!(h.tracker.is_empty());

        h.mark(SliceBuilder::idr(1)).unwrap();
        assert!(!h.tracker.is_awaiting_idr());
        assert_eq!(h.tracker.len(), 1);
    }

    #[test]
    fn test_mmco4_and_mmco6_mark_current_long_term() {
        let mut h = Harness::new(refs(2));
        h.mark(SliceBuilder::idr(0)).unwrap();
        let outcome = h
            .mark(SliceBuilder {
                mmco: Some(vec![
                    Mmco::TrimLongTerm {
                        max_long_term_frame_idx_plus1: 1,
                    },
                    Mmco::CurrentToLongTerm {
                        long_term_frame_idx: 0,
                    },
                ]),
                ..SliceBuilder::p(1, 2)
            })
            .unwrap();
        assert!(outcome.long_term);
        assert_eq!(h.tracker.long_term_count(), 1);
        assert_eq!(h.tracker.short_term_count(), 1);

        // 长期参考不参与滑动窗口
        h.mark(SliceBuilder::p(2, 4)).unwrap();
        assert_eq!(h.tracker.long_term_count(), 1);
        assert_eq!(h.frame_nums(), vec![1, 2]);
    }

    #[test]
    fn test_mmco6_without_long_term_indices_is_inconsistent() {
        let mut h = Harness::new(refs(2));
        h.mark(SliceBuilder::idr(0)).unwrap();
        let err = h
            .mark(SliceBuilder {
                mmco: Some(vec![Mmco::CurrentToLongTerm {
                    long_term_frame_idx: 0,
                }]),
                ..SliceBuilder::p(1, 2)
            })
            .unwrap_err();
        assert!(err.to_string().contains("MMCO6"));
    }

    #[test]
    fn test_mmco5_clears_and_renumbers_current() {
        let mut h = Harness::new(refs(4));
        h.mark(SliceBuilder::idr(0)).unwrap();
        h.mark(SliceBuilder::p(1, 2)).unwrap();
        let outcome = h
            .mark(SliceBuilder {
                mmco: Some(vec![Mmco::ClearAll]),
                ..SliceBuilder::p(2, 4)
            })
            .unwrap();
        assert!(outcome.had_mmco5);
        assert_eq!(h.frame_nums(), vec![0]);
        // MMCO5 后 PrevRefFrameNum = 0
        let outcome = h.mark(SliceBuilder::p(1, 2)).unwrap();
        assert_eq!(outcome.gap_frames, 0);
    }

    #[test]
    fn test_frame_num_gap_inserts_non_existing_frames() {
        let mut h = Harness::new(SpsBuilder {
            max_num_ref_frames: 4,
            gaps_allowed: true,
            ..SpsBuilder::default()
        });
        h.mark(SliceBuilder::idr(0)).unwrap();
        let outcome = h.mark(SliceBuilder::p(3, 6)).unwrap();
        assert_eq!(outcome.gap_frames, 2);
        assert_eq!(h.frame_nums(), vec![0, 1, 2, 3]);
        assert!(h.tracker.frames()[1].non_existing);
        assert!(!h.tracker.frames()[3].non_existing);
    }

    #[test]
    fn test_frame_num_gap_not_allowed_only_warns() {
        let mut h = Harness::new(refs(4));
        h.mark(SliceBuilder::idr(0)).unwrap();
        let outcome = h.mark(SliceBuilder::p(3, 6)).unwrap();
        assert_eq!(outcome.gap_frames, 0);
        assert_eq!(h.frame_nums(), vec![0, 3]);
    }

    #[test]
    fn test_complementary_fields_share_one_entry() {
        let mut h = Harness::new(SpsBuilder {
            max_num_ref_frames: 2,
            frame_mbs_only: false,
            ..SpsBuilder::default()
        });
        h.mark(SliceBuilder::idr(0)).unwrap();
        h.mark(SliceBuilder {
            field: Some(false),
            ..SliceBuilder::p(1, 2)
        })
        .unwrap();
        h.mark(SliceBuilder {
            field: Some(true),
            ..SliceBuilder::p(1, 3)
        })
        .unwrap();
        assert_eq!(h.frame_nums(), vec![0, 1]);
        assert!(h.tracker.frames()[1].is_complete());
    }

    #[test]
    fn test_field_mmco1_unmarks_single_field() {
        let mut h = Harness::new(SpsBuilder {
            max_num_ref_frames: 4,
            frame_mbs_only: false,
            ..SpsBuilder::default()
        });
        h.mark(SliceBuilder::idr(0)).unwrap();
        h.mark(SliceBuilder {
            field: Some(false),
            ..SliceBuilder::p(1, 2)
        })
        .unwrap();
        // 底场: CurrPicNum = 3, picNumX = 3 - 2 = 1 → FrameNumWrap 0 的同极性 (底) 场
        h.mark(SliceBuilder {
            field: Some(true),
            mmco: Some(vec![Mmco::ForgetShortTerm {
                difference_of_pic_nums_minus1: 1,
            }]),
            ..SliceBuilder::p(1, 3)
        })
        .unwrap();
        assert_eq!(h.frame_nums(), vec![0, 1]);
        assert!(!h.tracker.frames()[0].is_complete());
    }
}
