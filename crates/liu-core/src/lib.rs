//! # liu-core
//!
//! Liu 码流分析框架核心库, 提供错误类型、比特流读写和流式缓冲工具.
//!
//! 本 crate 不包含任何编解码器知识, 为 `liu-codec` 提供底层基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod bounded_queue;
pub mod byte_queue;
pub mod emulation;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use bounded_queue::BoundedQueue;
pub use byte_queue::OffsetByteQueue;
pub use error::{ErrorKind, LiuError, LiuResult, PartialError};
pub use rational::Rational;
