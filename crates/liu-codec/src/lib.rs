//! # liu-codec
//!
//! Liu 码流分析框架的编解码器层, 对 H.264/H.265 基本流做语法级分析, 不解码像素.
//!
//! ## 功能
//!
//! - **字节流转换**: Annex B 与长度前缀格式互转
//! - **NAL 定位**: 完整缓冲区上的惰性定位器, 分块输入的增量切分器
//! - **语法解析**: 参数集 (VPS/SPS/PPS/VUI)、条带头、SEI
//! - **参考跟踪**: H.264 参考帧标记 (滑动窗口/MMCO), H.265 参考图像集
//! - **分析会话**: 逐图像输出关键帧、参考属性、POC 与参数集 id
//!
//! ## 使用示例
//!
//! ```rust
//! use liu_codec::{Codec, SessionOptions, StreamFormat, StreamSession, locate_all};
//!
//! let data = [0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];
//! let units = locate_all(&data, Codec::H264, StreamFormat::AnnexB).unwrap();
//!
//! let mut session = StreamSession::new(SessionOptions::new(Codec::H264));
//! for nal in &units {
//!     session.send_nal(nal).unwrap();
//! }
//! session.flush();
//! assert_eq!(session.stats().nals, 1);
//! ```

pub mod bytestream;
pub mod codec;
pub mod h264;
pub mod h265;
pub mod locator;
pub mod nal;
pub mod param_set;
pub mod picture;
pub mod pipeline;
pub mod sei;
pub mod session;
pub mod splitter;

// 重导出常用类型
pub use bytestream::{ByteStreamConverter, ConversionOptions, StartCodeSize, StreamFormat};
pub use codec::Codec;
pub use locator::{NalLocator, locate_all};
pub use nal::{NalHeader, NalUnit, OwnedNal};
pub use param_set::{ParameterSetStore, StoreOutcome};
pub use picture::{PictureFlags, PictureInfo, SliceType};
pub use pipeline::{AnalysisReport, PipelineOptions, analyze_buffer, run_pipeline};
pub use sei::{SeiMessage, SeiPayload, parse_sei};
pub use session::{RawParameterSets, SessionOptions, SessionStats, StreamSession};
pub use splitter::{AnnexBSplitter, LengthPrefixedSplitter, StreamSplitter};
