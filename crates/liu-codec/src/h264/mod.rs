//! H.264/AVC 码流分析.
//!
//! 提供对 H.264 码流的语法分析能力:
//! - NAL 头部与类型识别 (1 字节 NAL 头, SVC/MVC 扩展头)
//! - SPS / PPS 解析 (含 VUI)
//! - 条带头解析 (参考列表修改, 加权预测表, 参考图像标记)
//! - 图像顺序计数 (POC 类型 0/1/2)
//! - 参考帧标记跟踪 (滑动窗口, MMCO, frame_num 间隙)
//!
//! # H.264 NAL 头部 (1 字节)
//! ```text
//! ┌──────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5)  │
//! └──────────────────────────────────────┘
//! ```

pub mod nal;
pub mod parser;
pub mod poc;
pub mod pps;
pub mod reference;
pub mod slice;
pub mod sps;

#[cfg(test)]
pub(crate) mod test_util;

pub use nal::{NalHeader, NalUnitType};
pub use parser::H264Parser;
pub use poc::{PicOrderCount, PocState};
pub use pps::{Pps, parse_pps};
pub use reference::{MarkingOutcome, RefFrame, ReferenceTracker};
pub use slice::{
    Mmco, PicStructure, PredWeightTable, RefPicListModification, RefPicMarking, SliceHeader,
    parse_slice_header,
};
pub use sps::{Sps, Timing, Vui, parse_sps};
