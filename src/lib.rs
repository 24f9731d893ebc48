//! # Liu (流)
//!
//! 纯 Rust 实现的 H.264/H.265 基本流分析框架.
//!
//! Liu 在不解码像素的前提下理解码流结构:
//! - **字节流**: Annex B 与长度前缀格式的定位与互转
//! - **语法**: 参数集、条带头、SEI 解析
//! - **参考关系**: 参考帧标记与参考图像集跟踪, POC 推导
//! - **流式处理**: 摄取线程 + 有界队列 + 分析会话
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use liu::codec::{Codec, PipelineOptions, run_pipeline};
//!
//! let file = std::fs::File::open("input.264").unwrap();
//! let report = run_pipeline(file, Codec::H264, PipelineOptions::default()).unwrap();
//! println!("{} 个图像, {} 个关键帧", report.pictures.len(), report.keyframe_count());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 错误类型、比特读写、流式缓冲 |
//! | `liu-codec` | NAL 定位、语法解析、参考跟踪、分析会话 |

/// 核心类型与工具
pub use liu_core as core;

/// 码流分析
pub use liu_codec as codec;

pub mod config;
pub mod logging;

pub use config::AnalyzerConfig;

/// 获取 Liu 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
