//! 参数集存储.
//!
//! 以 id 为键保存解析后的参数集及其原始 NAL 字节. 同 id 的新参数集替换旧的,
//! 内容完全相同的重复参数集不触发替换 (码流中常在每个 IDR 前重复发送).

use std::collections::HashMap;

use bytes::Bytes;
use liu_core::{LiuError, LiuResult};

/// 插入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// 首次出现
    Inserted,
    /// 替换了内容不同的旧参数集
    Replaced,
    /// 与已存内容完全相同, 未改动
    Unchanged,
}

#[derive(Debug, Clone)]
struct StoredParameterSet<T> {
    parsed: T,
    raw: Bytes,
}

/// 按 id 索引的参数集存储
#[derive(Debug, Clone)]
pub struct ParameterSetStore<T> {
    kind: &'static str,
    sets: HashMap<u32, StoredParameterSet<T>>,
}

impl<T> ParameterSetStore<T> {
    /// 创建空存储, `kind` 用于错误信息 (如 "SPS")
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            sets: HashMap::new(),
        }
    }

    /// 参数集类别
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// 插入或替换
    ///
    /// `raw` 为完整 NAL 字节 (含头部), 供容器层构造解码器配置记录.
    pub fn insert(&mut self, id: u32, parsed: T, raw: Bytes) -> StoreOutcome {
        match self.sets.get_mut(&id) {
            Some(existing) if existing.raw == raw => StoreOutcome::Unchanged,
            Some(existing) => {
                *existing = StoredParameterSet { parsed, raw };
                StoreOutcome::Replaced
            }
            None => {
                self.sets.insert(id, StoredParameterSet { parsed, raw });
                StoreOutcome::Inserted
            }
        }
    }

    /// 按 id 查找
    pub fn get(&self, id: u32) -> Option<&T> {
        self.sets.get(&id).map(|s| &s.parsed)
    }

    /// 按 id 查找, 不存在时返回 `UnknownParameterSet`
    pub fn require(&self, id: u32) -> LiuResult<&T> {
        self.get(id).ok_or(LiuError::UnknownParameterSet {
            kind: self.kind,
            id,
        })
    }

    /// 原始 NAL 字节
    pub fn raw(&self, id: u32) -> Option<&Bytes> {
        self.sets.get(&id).map(|s| &s.raw)
    }

    /// 已存储的 id, 升序
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.sets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 按 id 升序返回全部原始 NAL
    pub fn raw_all(&self) -> Vec<Bytes> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.raw(id).cloned())
            .collect()
    }

    /// 已存储数量
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.sets.clear();
    }
}
