//! H.265/HEVC 码流分析.
//!
//! 提供对 HEVC 码流的语法分析能力:
//! - NAL 头部与类型识别 (2 字节 NAL 头)
//! - VPS / SPS / PPS 解析 (含 profile_tier_level, VUI)
//! - 短期参考图像集 (含 inter RPS 预测) 与长期参考声明
//! - 条带段头解析 (独立/依赖条带段, 参考列表修改)
//! - POC 推导与参考图像集跟踪, 参考列表构造
//!
//! # HEVC NAL 头部 (2 字节)
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ forbidden(1) | type(6) | layer_id(6) | temporal_id+1(3) │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod nal;
pub mod parser;
pub mod pps;
pub mod reference;
pub mod rps;
pub mod slice;
pub mod sps;
pub mod vps;

#[cfg(test)]
pub(crate) mod test_util;

pub use nal::{NalHeader, NalUnitType};
pub use parser::H265Parser;
pub use pps::{Pps, Tiles, parse_pps};
pub use reference::{DpbPicture, PocDecoder, RpsOutcome, RpsTracker};
pub use rps::{RpsEntry, ShortTermRps, parse_short_term_rps};
pub use slice::{LongTermEntry, SliceHeader, SliceSegmentHeader, parse_slice_segment_header};
pub use sps::{Sps, Vui, parse_sps};
pub use vps::{ProfileTierLevel, Vps, parse_vps};
