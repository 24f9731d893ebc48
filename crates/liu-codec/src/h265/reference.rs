//! HEVC 图像顺序计数与参考图像集跟踪.
//!
//! - [`PocDecoder`]: 由 slice_pic_order_cnt_lsb 与 prevTid0Pic 推导 PicOrderCntVal (8.3.1)
//! - [`RpsTracker`]: 按每个图像的参考图像集更新参考集合, 构造参考列表 (8.3.2, 8.3.4)
//!
//! 参考集合只记录 POC 与长/短期标记, 不涉及任何像素数据.

use log::{debug, warn};

use super::nal::NalHeader;
use super::rps::RpsEntry;
use super::slice::SliceHeader;
use super::sps::Sps;

/// POC 推导状态
#[derive(Debug, Clone, Default)]
pub struct PocDecoder {
    /// prevTid0Pic 的 PicOrderCntVal
    prev_tid0_poc: Option<i32>,
}

impl PocDecoder {
    /// 创建初始状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空状态
    pub fn reset(&mut self) {
        self.prev_tid0_poc = None;
    }

    /// 计算当前图像的 PicOrderCntVal, 并按需更新 prevTid0Pic
    ///
    /// `no_rasl_output` 为 IRAP 图像的 NoRaslOutputFlag.
    pub fn decode(&mut self, sps: &Sps, nal: &NalHeader, poc_lsb: u32, no_rasl_output: bool) -> i32 {
        let max_lsb = sps.max_poc_lsb() as i32;
        let lsb = poc_lsb as i32;

        let msb = if nal.nal_type.is_irap() && no_rasl_output {
            0
        } else {
            let prev = self.prev_tid0_poc.unwrap_or(0);
            let prev_lsb = prev & (max_lsb - 1);
            let prev_msb = prev - prev_lsb;
            if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
                prev_msb + max_lsb
            } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
                prev_msb - max_lsb
            } else {
                prev_msb
            }
        };
        let poc = msb + lsb;

        let nal_type = nal.nal_type;
        if nal.temporal_id == 0
            && !nal_type.is_rasl()
            && !nal_type.is_radl()
            && !nal_type.is_sub_layer_non_reference()
        {
            self.prev_tid0_poc = Some(poc);
        }
        poc
    }
}

/// 参考集合中的一个图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpbPicture {
    /// PicOrderCntVal
    pub poc: i32,
    /// 是否标记为长期参考
    pub long_term: bool,
    /// 为缺失的参考图像生成的占位项
    pub generated: bool,
}

/// 应用参考图像集的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpsOutcome {
    /// RefPicList0 (POC)
    pub ref_list0: Vec<i32>,
    /// RefPicList1 (POC)
    pub ref_list1: Vec<i32>,
    /// 当前图像要使用但参考集合中不存在的 POC
    pub missing: Vec<i32>,
    /// 超出 POC 取值范围的参考项
    pub out_of_range: Vec<i64>,
}

/// 参考图像集跟踪器
#[derive(Debug, Clone, Default)]
pub struct RpsTracker {
    pictures: Vec<DpbPicture>,
}

/// 一个参考图像集候选项
#[derive(Debug, Clone, Copy)]
struct Candidate {
    poc: i32,
    /// 长期项是否只按 LSB 匹配
    lsb_only: bool,
    used_by_curr: bool,
}

impl RpsTracker {
    /// 创建空跟踪器
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前参考集合 (按加入顺序)
    pub fn pictures(&self) -> &[DpbPicture] {
        &self.pictures
    }

    /// 参考图像数量
    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    /// 短期参考数量
    pub fn short_term_count(&self) -> usize {
        self.pictures.iter().filter(|p| !p.long_term).count()
    }

    /// 长期参考数量
    pub fn long_term_count(&self) -> usize {
        self.pictures.iter().filter(|p| p.long_term).count()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.pictures.clear();
    }

    /// 按当前图像的参考图像集更新参考集合, 构造参考列表, 最后加入当前图像
    ///
    /// `irap_no_rasl` 为真时先清空集合, 且缺失的参考不计入 `missing`
    /// (这类图像的参考图像集只服务于其 RASL 图像).
    pub fn apply(
        &mut self,
        sps: &Sps,
        slice: &SliceHeader,
        poc: i32,
        irap_no_rasl: bool,
    ) -> RpsOutcome {
        if irap_no_rasl {
            self.pictures.clear();
        }
        let max_lsb = sps.max_poc_lsb() as i32;

        // 超出 i32 的候选 POC 不可能对应任何已解码图像
        let mut out_of_range = Vec::new();
        let mut short_term = |entries: &[RpsEntry]| -> Vec<Candidate> {
            entries
                .iter()
                .filter_map(|e| {
                    let candidate = i64::from(poc) + i64::from(e.delta_poc);
                    match i32::try_from(candidate) {
                        Ok(poc) => Some(Candidate {
                            poc,
                            lsb_only: false,
                            used_by_curr: e.used_by_curr,
                        }),
                        Err(_) => {
                            out_of_range.push(candidate);
                            None
                        }
                    }
                })
                .collect()
        };
        let st_before = short_term(slice.short_term_rps.negative.as_slice());
        let st_after = short_term(slice.short_term_rps.positive.as_slice());

        let mut long_term = Vec::with_capacity(slice.long_term.len());
        for e in &slice.long_term {
            match e.delta_poc_msb_cycle {
                Some(cycle) => {
                    let max_lsb = i64::from(max_lsb);
                    let current = i64::from(poc);
                    let candidate = i64::from(e.poc_lsb) + current
                        - i64::from(cycle) * max_lsb
                        - (current & (max_lsb - 1));
                    match i32::try_from(candidate) {
                        Ok(poc) => long_term.push(Candidate {
                            poc,
                            lsb_only: false,
                            used_by_curr: e.used_by_curr,
                        }),
                        Err(_) => out_of_range.push(candidate),
                    }
                }
                None => long_term.push(Candidate {
                    poc: e.poc_lsb as i32,
                    lsb_only: true,
                    used_by_curr: e.used_by_curr,
                }),
            }
        }

        let mut old = std::mem::take(&mut self.pictures);
        let mut missing = Vec::new();

        // 长期参考在全部参考图像中查找; 返回实际 POC 用于列表构造
        let mut lt_pocs = Vec::with_capacity(long_term.len());
        for cand in &long_term {
            let pos = old.iter().position(|p| {
                if cand.lsb_only {
                    p.poc & (max_lsb - 1) == cand.poc
                } else {
                    p.poc == cand.poc
                }
            });
            let resolved = match pos {
                Some(pos) => {
                    let mut pic = old.swap_remove(pos);
                    pic.long_term = true;
                    self.pictures.push(pic);
                    pic.poc
                }
                None => {
                    if cand.used_by_curr && !irap_no_rasl {
                        missing.push(cand.poc);
                        self.pictures.push(DpbPicture {
                            poc: cand.poc,
                            long_term: true,
                            generated: true,
                        });
                    }
                    cand.poc
                }
            };
            lt_pocs.push((resolved, cand.used_by_curr));
        }

        // 短期参考只在短期图像中查找
        for cand in st_before.iter().chain(&st_after) {
            match old.iter().position(|p| !p.long_term && p.poc == cand.poc) {
                Some(pos) => self.pictures.push(old.swap_remove(pos)),
                None if cand.used_by_curr && !irap_no_rasl => {
                    missing.push(cand.poc);
                    self.pictures.push(DpbPicture {
                        poc: cand.poc,
                        long_term: false,
                        generated: true,
                    });
                }
                None => {}
            }
        }

        if !old.is_empty() {
            debug!(
                "HEVC: POC={} 的参考图像集移除 {} 个参考: {:?}",
                poc,
                old.len(),
                old.iter().map(|p| p.poc).collect::<Vec<_>>()
            );
        }

        let mut outcome = RpsOutcome {
            missing,
            out_of_range,
            ..RpsOutcome::default()
        };
        if !slice.slice_type.is_intra() {
            let before: Vec<i32> = used_pocs(&st_before);
            let after: Vec<i32> = used_pocs(&st_after);
            let lt: Vec<i32> = lt_pocs.iter().filter(|(_, used)| *used).map(|&(p, _)| p).collect();
            outcome.ref_list0 = build_list(
                [&before, &after, &lt],
                slice.num_ref_idx_active[0],
                slice.list_entry_l0.as_deref(),
            );
            if slice.slice_type.is_b() {
                outcome.ref_list1 = build_list(
                    [&after, &before, &lt],
                    slice.num_ref_idx_active[1],
                    slice.list_entry_l1.as_deref(),
                );
            }
        }

        self.pictures.push(DpbPicture {
            poc,
            long_term: false,
            generated: false,
        });
        let capacity = sps.dpb_capacity();
        if self.pictures.len() > capacity {
            warn!(
                "HEVC: POC={} 时参考集合数量 {} 超过 sps_max_dec_pic_buffering {}",
                poc,
                self.pictures.len(),
                capacity
            );
        }
        outcome
    }
}

fn used_pocs(candidates: &[Candidate]) -> Vec<i32> {
    candidates
        .iter()
        .filter(|c| c.used_by_curr)
        .map(|c| c.poc)
        .collect()
}

/// 8.3.4: 循环填充 RefPicListTemp, 再按 list_entry 选取
fn build_list(parts: [&Vec<i32>; 3], num_active: u32, list_entry: Option<&[u32]>) -> Vec<i32> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    if total == 0 || num_active == 0 {
        return Vec::new();
    }
    let temp_len = (num_active as usize).max(total);
    let temp: Vec<i32> = parts
        .iter()
        .flat_map(|p| p.iter().copied())
        .cycle()
        .take(temp_len)
        .collect();

    (0..num_active as usize)
        .filter_map(|i| {
            let idx = list_entry.map_or(i, |entries| entries.get(i).map_or(i, |&e| e as usize));
            temp.get(idx).copied()
        })
        .collect()
}
