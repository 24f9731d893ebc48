//! HEVC 短期参考图像集 (st_ref_pic_set) 解析.
//!
//! 支持 inter_ref_pic_set_prediction (由已有的参考集派生新集合).

use liu_core::{BitReader, LiuError, LiuResult};

/// 参考图像集中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpsEntry {
    /// 相对当前图像的 POC 差值
    pub delta_poc: i32,
    /// used_by_curr_pic_flag
    pub used_by_curr: bool,
}

/// 短期参考图像集
///
/// `negative` 按 delta_poc 递减排列 (离当前图像最近的在前),
/// `positive` 按 delta_poc 递增排列.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortTermRps {
    pub negative: Vec<RpsEntry>,
    pub positive: Vec<RpsEntry>,
}

impl ShortTermRps {
    /// NumDeltaPocs
    pub fn num_delta_pocs(&self) -> usize {
        self.negative.len() + self.positive.len()
    }

    /// 被当前图像使用的项数 (NumPicTotalCurr 的短期部分)
    pub fn num_used_by_curr(&self) -> usize {
        self.negative
            .iter()
            .chain(&self.positive)
            .filter(|e| e.used_by_curr)
            .count()
    }
}

/// 每个集合中前向/后向图像的上限
const MAX_PICS: u32 = 16;

/// 解析 st_ref_pic_set(idx)
///
/// - `idx`: 当前集合索引; 在条带头中等于 `num_sps_sets`
/// - `sets`: 已解析的 SPS 集合, 至少包含 `idx` 个 (条带头中为全部 SPS 集合)
pub fn parse_short_term_rps(
    br: &mut BitReader,
    idx: usize,
    num_sps_sets: usize,
    sets: &[ShortTermRps],
) -> LiuResult<ShortTermRps> {
    let inter_rps_pred = idx != 0 && br.read_flag()?;
    if !inter_rps_pred {
        return parse_explicit(br);
    }

    let delta_idx = if idx == num_sps_sets {
        br.read_ue_max(idx as u32 - 1, "delta_idx_minus1")? as usize + 1
    } else {
        1
    };
    let reference = idx
        .checked_sub(delta_idx)
        .and_then(|ref_idx| sets.get(ref_idx))
        .ok_or_else(|| {
            LiuError::InvalidData(format!(
                "参考图像集预测源不存在, idx={}, delta_idx={}",
                idx, delta_idx
            ))
        })?;

    let sign = br.read_flag()?;
    let abs_delta_rps = br.read_ue_max(1 << 15, "abs_delta_rps_minus1")? as i32 + 1;
    let delta_rps = if sign { -abs_delta_rps } else { abs_delta_rps };

    // used_by_curr_pic_flag / use_delta_flag, 下标与参考集合的 [负向..., 正向..., 自身] 对应
    let count = reference.num_delta_pocs() + 1;
    let mut used = Vec::with_capacity(count);
    let mut use_delta = Vec::with_capacity(count);
    for _ in 0..count {
        let used_by_curr = br.read_flag()?;
        used.push(used_by_curr);
        use_delta.push(used_by_curr || br.read_flag()?);
    }

    let num_neg = reference.negative.len();
    let self_idx = reference.num_delta_pocs();
    let mut rps = ShortTermRps::default();

    for (j, entry) in reference.positive.iter().enumerate().rev() {
        let delta_poc = entry.delta_poc + delta_rps;
        if delta_poc < 0 && use_delta[num_neg + j] {
            rps.negative.push(RpsEntry {
                delta_poc,
                used_by_curr: used[num_neg + j],
            });
        }
    }
    if delta_rps < 0 && use_delta[self_idx] {
        rps.negative.push(RpsEntry {
            delta_poc: delta_rps,
            used_by_curr: used[self_idx],
        });
    }
    for (j, entry) in reference.negative.iter().enumerate() {
        let delta_poc = entry.delta_poc + delta_rps;
        if delta_poc < 0 && use_delta[j] {
            rps.negative.push(RpsEntry {
                delta_poc,
                used_by_curr: used[j],
            });
        }
    }

    for (j, entry) in reference.negative.iter().enumerate().rev() {
        let delta_poc = entry.delta_poc + delta_rps;
        if delta_poc > 0 && use_delta[j] {
            rps.positive.push(RpsEntry {
                delta_poc,
                used_by_curr: used[j],
            });
        }
    }
    if delta_rps > 0 && use_delta[self_idx] {
        rps.positive.push(RpsEntry {
            delta_poc: delta_rps,
            used_by_curr: used[self_idx],
        });
    }
    for (j, entry) in reference.positive.iter().enumerate() {
        let delta_poc = entry.delta_poc + delta_rps;
        if delta_poc > 0 && use_delta[num_neg + j] {
            rps.positive.push(RpsEntry {
                delta_poc,
                used_by_curr: used[num_neg + j],
            });
        }
    }

    if rps.negative.len() as u32 > MAX_PICS || rps.positive.len() as u32 > MAX_PICS {
        return Err(LiuError::InvalidData(format!(
            "预测得到的参考图像集过大, negative={}, positive={}",
            rps.negative.len(),
            rps.positive.len()
        )));
    }
    Ok(rps)
}

fn parse_explicit(br: &mut BitReader) -> LiuResult<ShortTermRps> {
    let num_negative = br.read_ue_max(MAX_PICS, "num_negative_pics")?;
    let num_positive = br.read_ue_max(MAX_PICS - num_negative, "num_positive_pics")?;

    let mut rps = ShortTermRps::default();
    let mut poc = 0i32;
    for _ in 0..num_negative {
        poc -= br.read_ue_max(1 << 15, "delta_poc_s0_minus1")? as i32 + 1;
        rps.negative.push(RpsEntry {
            delta_poc: poc,
            used_by_curr: br.read_flag()?,
        });
    }
    poc = 0;
    for _ in 0..num_positive {
        poc += br.read_ue_max(1 << 15, "delta_poc_s1_minus1")? as i32 + 1;
        rps.positive.push(RpsEntry {
            delta_poc: poc,
            used_by_curr: br.read_flag()?,
        });
    }
    Ok(rps)
}
