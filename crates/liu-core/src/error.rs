//! 统一错误类型定义.
//!
//! 所有 Liu crate 共用的错误类型. 单个 NAL 的解析失败只影响该 NAL,
//! 是否放弃整条码流由上层决定.

use std::fmt;

use thiserror::Error;

/// Liu 框架统一错误类型
#[derive(Debug, Error)]
pub enum LiuError {
    /// 码流封装结构错误 (起始码/长度前缀不合法)
    #[error("码流结构错误: {0}")]
    MalformedStream(String),

    /// 读取越过了可用比特, 通常意味着数据被截断
    #[error("比特流数据不足")]
    BitstreamExhausted,

    /// 参数集语法错误
    #[error("参数集语法错误: {0}")]
    ParameterSetSyntax(String),

    /// 引用了尚未出现的参数集
    #[error("未知参数集: {kind} id={id}")]
    UnknownParameterSet {
        /// 参数集类别 (如 "SPS", "PPS", "VPS")
        kind: &'static str,
        /// 被引用的 id
        id: u32,
    },

    /// 条带头语法错误
    #[error("条带头语法错误: {0}")]
    SliceSyntax(String),

    /// 参考帧跟踪状态与码流不一致, 在下一个 IDR 处重新同步
    #[error("参考帧跟踪不一致: {0}")]
    ReferenceTrackingInconsistency(String),

    /// 读取的偏移已被丢弃
    #[error("数据已被丢弃: offset={offset}, head={head}")]
    DataEvicted {
        /// 请求的绝对偏移
        offset: u64,
        /// 当前队列头部偏移
        head: u64,
    },

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 队列已关闭 (已发出流结束信号)
    #[error("队列已关闭")]
    QueueClosed,

    /// 无效数据 (数值超出语法允许范围等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// Liu 框架统一 Result 类型
pub type LiuResult<T> = Result<T, LiuError>;

/// 错误类别, 用于统计与日志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    MalformedStream,
    BitstreamExhausted,
    ParameterSetSyntax,
    UnknownParameterSet,
    SliceSyntax,
    ReferenceTrackingInconsistency,
    DataEvicted,
    NeedMoreData,
    QueueClosed,
    InvalidData,
    InvalidArgument,
    Io,
}

impl ErrorKind {
    /// 类别名称
    pub fn name(self) -> &'static str {
        match self {
            Self::MalformedStream => "malformed_stream",
            Self::BitstreamExhausted => "bitstream_exhausted",
            Self::ParameterSetSyntax => "parameter_set_syntax",
            Self::UnknownParameterSet => "unknown_parameter_set",
            Self::SliceSyntax => "slice_syntax",
            Self::ReferenceTrackingInconsistency => "reference_tracking_inconsistency",
            Self::DataEvicted => "data_evicted",
            Self::NeedMoreData => "need_more_data",
            Self::QueueClosed => "queue_closed",
            Self::InvalidData => "invalid_data",
            Self::InvalidArgument => "invalid_argument",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl LiuError {
    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedStream(_) => ErrorKind::MalformedStream,
            Self::BitstreamExhausted => ErrorKind::BitstreamExhausted,
            Self::ParameterSetSyntax(_) => ErrorKind::ParameterSetSyntax,
            Self::UnknownParameterSet { .. } => ErrorKind::UnknownParameterSet,
            Self::SliceSyntax(_) => ErrorKind::SliceSyntax,
            Self::ReferenceTrackingInconsistency(_) => ErrorKind::ReferenceTrackingInconsistency,
            Self::DataEvicted { .. } => ErrorKind::DataEvicted,
            Self::NeedMoreData => ErrorKind::NeedMoreData,
            Self::QueueClosed => ErrorKind::QueueClosed,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// 将参数集解析过程中的底层错误归入 `ParameterSetSyntax`
    ///
    /// `UnknownParameterSet` 保持原样, 便于调用方区分 "缺依赖" 与 "语法损坏".
    pub fn into_parameter_set_error(self, what: &str) -> Self {
        match self {
            Self::BitstreamExhausted => Self::ParameterSetSyntax(format!("{what}: 数据被截断")),
            Self::InvalidData(msg) => Self::ParameterSetSyntax(format!("{what}: {msg}")),
            other => other,
        }
    }

    /// 将条带头解析过程中的底层错误归入 `SliceSyntax`
    pub fn into_slice_error(self, what: &str) -> Self {
        match self {
            Self::BitstreamExhausted => Self::SliceSyntax(format!("{what}: 数据被截断")),
            Self::InvalidData(msg) => Self::SliceSyntax(format!("{what}: {msg}")),
            other => other,
        }
    }
}

/// 携带部分结果的错误
///
/// 码流转换与 NAL 定位在遇到结构错误时, 已经成功产出的内容保存在 `produced` 中,
/// 调用方可以决定是否继续使用.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PartialError<T: fmt::Debug> {
    /// 出错前已产出的结果
    pub produced: T,
    /// 导致中止的错误
    pub source: LiuError,
}

impl<T: fmt::Debug> PartialError<T> {
    /// 创建携带部分结果的错误
    pub fn new(produced: T, source: LiuError) -> Self {
        Self { produced, source }
    }

    /// 丢弃部分结果, 只保留错误
    pub fn into_error(self) -> LiuError {
        self.source
    }
}

impl<T: fmt::Debug> From<PartialError<T>> for LiuError {
    fn from(err: PartialError<T>) -> Self {
        err.source
    }
}
