//! 单条码流的分析会话.
//!
//! [`StreamSession`] 按解码顺序接收 NAL, 内部按编解码器分派到
//! [`H264Parser`] 或 [`H265Parser`], 产出逐图像的 [`PictureInfo`].
//!
//! 使用流程:
//! 1. 调用 `send_nal()` / `send_data()` 送入 NAL
//! 2. 调用 `receive_picture()` 取出已完成的图像
//! 3. 码流结束时调用 `flush()`, 再取出最后一个图像
//!
//! 单个 NAL 的错误只影响该 NAL, 会话继续处理后续数据.

use std::collections::{BTreeMap, VecDeque};

use bytes::Bytes;
use liu_core::{ErrorKind, LiuError, LiuResult};
use log::{debug, warn};

use crate::codec::Codec;
use crate::h264::H264Parser;
use crate::h265::H265Parser;
use crate::nal::{NalHeader, NalUnit, OwnedNal};
use crate::picture::PictureInfo;

/// 会话选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// 编解码器
    pub codec: Codec,
    /// 以 warn 级别输出的错误条数, 超过后降为 debug
    pub error_log_limit: u64,
}

impl SessionOptions {
    /// 指定编解码器的默认选项
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            error_log_limit: 100,
        }
    }
}

/// 会话统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 送入的 NAL 数量
    pub nals: u64,
    /// 其中 VCL NAL 数量
    pub vcl_nals: u64,
    /// 产出的图像数量
    pub pictures: u64,
    /// 因错误被跳过的 NAL 数量
    pub skipped_nals: u64,
    /// 按类别统计的错误数量
    pub errors: BTreeMap<ErrorKind, u64>,
}

impl SessionStats {
    /// 某类错误的数量
    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.errors.get(&kind).copied().unwrap_or(0)
    }

    /// 错误总数
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }

    fn record(&mut self, err: &LiuError) {
        *self.errors.entry(err.kind()).or_insert(0) += 1;
    }
}

/// 已存储参数集的原始字节 (含 NAL 头, 含防竞争字节)
///
/// 供容器层构造解码器配置记录 (avcC / hvcC).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParameterSets {
    /// VPS (仅 HEVC)
    pub vps: Vec<Bytes>,
    /// SPS
    pub sps: Vec<Bytes>,
    /// PPS
    pub pps: Vec<Bytes>,
}

impl RawParameterSets {
    /// 是否没有任何参数集
    pub fn is_empty(&self) -> bool {
        self.vps.is_empty() && self.sps.is_empty() && self.pps.is_empty()
    }
}

/// 按编解码器分派的分析器
#[derive(Debug)]
enum CodecParser {
    H264(H264Parser),
    H265(H265Parser),
}

impl CodecParser {
    fn new(codec: Codec) -> Self {
        match codec {
            Codec::H264 => Self::H264(H264Parser::new()),
            Codec::H265 => Self::H265(H265Parser::new()),
        }
    }

    fn push_nal(
        &mut self,
        nal: &NalUnit<'_>,
        out: &mut Vec<PictureInfo>,
        errors: &mut Vec<LiuError>,
    ) -> LiuResult<()> {
        match (self, &nal.header) {
            (Self::H264(parser), NalHeader::H264(header)) => {
                parser.push_nal(header, nal, out, errors);
                Ok(())
            }
            (Self::H265(parser), NalHeader::H265(header)) => {
                parser.push_nal(header, nal, out, errors);
                Ok(())
            }
            (parser, header) => Err(LiuError::InvalidArgument(format!(
                "NAL 编解码器不匹配: 会话为 {}, NAL 为 {}",
                parser.codec(),
                header.codec()
            ))),
        }
    }

    fn flush(&mut self, out: &mut Vec<PictureInfo>, errors: &mut Vec<LiuError>) {
        match self {
            Self::H264(parser) => parser.flush(out, errors),
            Self::H265(parser) => parser.flush(out),
        }
    }

    fn codec(&self) -> Codec {
        match self {
            Self::H264(_) => Codec::H264,
            Self::H265(_) => Codec::H265,
        }
    }

    fn raw_parameter_sets(&self) -> RawParameterSets {
        match self {
            Self::H264(parser) => RawParameterSets {
                vps: Vec::new(),
                sps: parser.sps_store().raw_all(),
                pps: parser.pps_store().raw_all(),
            },
            Self::H265(parser) => RawParameterSets {
                vps: parser.vps_store().raw_all(),
                sps: parser.sps_store().raw_all(),
                pps: parser.pps_store().raw_all(),
            },
        }
    }

    fn reference_count(&self) -> usize {
        match self {
            Self::H264(parser) => parser.tracker().len(),
            Self::H265(parser) => parser.tracker().len(),
        }
    }
}

/// 单条码流的分析会话
///
/// # 示例
/// ```
/// use liu_codec::{Codec, SessionOptions, StreamSession};
///
/// let mut session = StreamSession::new(SessionOptions::new(Codec::H264));
/// // 访问单元分隔符不产生图像
/// session.send_data(&[0x09, 0xF0], 0).unwrap();
/// session.flush();
/// assert!(session.receive_picture().is_err());
/// assert_eq!(session.stats().nals, 1);
/// ```
#[derive(Debug)]
pub struct StreamSession {
    options: SessionOptions,
    parser: CodecParser,
    ready: VecDeque<PictureInfo>,
    next_index: u64,
    stats: SessionStats,
    /// 复用的临时缓冲
    scratch: Vec<PictureInfo>,
    scratch_errors: Vec<LiuError>,
}

impl StreamSession {
    /// 创建会话
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            parser: CodecParser::new(options.codec),
            ready: VecDeque::new(),
            next_index: 0,
            stats: SessionStats::default(),
            scratch: Vec::new(),
            scratch_errors: Vec::new(),
        }
    }

    /// 会话的编解码器
    pub fn codec(&self) -> Codec {
        self.options.codec
    }

    /// 会话选项
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// 统计信息
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// 当前跟踪中的参考图像数量
    pub fn reference_count(&self) -> usize {
        self.parser.reference_count()
    }

    /// 已存储参数集的原始字节
    pub fn raw_parameter_sets(&self) -> RawParameterSets {
        self.parser.raw_parameter_sets()
    }

    /// 送入一个已定位的 NAL
    ///
    /// 返回该 NAL 产生的第一个错误; 其余错误写入日志并计入统计.
    /// 返回错误不影响后续调用.
    pub fn send_nal(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        self.stats.nals += 1;
        if nal.header.is_vcl() {
            self.stats.vcl_nals += 1;
        }
        debug!(
            "{}: NAL {} offset={} size={}",
            self.options.codec,
            nal.header,
            nal.offset,
            nal.size()
        );

        let mut out = std::mem::take(&mut self.scratch);
        let mut errors = std::mem::take(&mut self.scratch_errors);
        if let Err(err) = self.parser.push_nal(nal, &mut out, &mut errors) {
            errors.push(err);
        }
        self.collect(&mut out);
        self.scratch = out;

        let skipped = errors
            .iter()
            .any(|e| e.kind() != ErrorKind::ReferenceTrackingInconsistency);
        if skipped {
            self.stats.skipped_nals += 1;
        }
        let first = self.report_errors(&mut errors, nal.offset);
        self.scratch_errors = errors;
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 送入一段完整的 NAL 数据 (含头部), `offset` 为其在原始流中的偏移
    ///
    /// 头部非法时该 NAL 被跳过并返回 `MalformedStream`.
    pub fn send_data(&mut self, data: &[u8], offset: u64) -> LiuResult<()> {
        match NalUnit::parse(self.options.codec, data, offset) {
            Ok(nal) => self.send_nal(&nal),
            Err(err) => {
                self.stats.nals += 1;
                self.stats.skipped_nals += 1;
                let mut errors = vec![err];
                match self.report_errors(&mut errors, offset) {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }

    /// 送入一个持有数据的 NAL
    pub fn send_owned(&mut self, nal: &OwnedNal) -> LiuResult<()> {
        self.send_data(&nal.data, nal.offset)
    }

    /// 取出一个已完成的图像
    ///
    /// 没有可取的图像时返回 `NeedMoreData`.
    pub fn receive_picture(&mut self) -> LiuResult<PictureInfo> {
        self.ready.pop_front().ok_or(LiuError::NeedMoreData)
    }

    /// 码流结束, 关闭正在累积的图像
    ///
    /// 关闭图像时产生的错误只写入日志与统计.
    pub fn flush(&mut self) {
        let mut out = std::mem::take(&mut self.scratch);
        let mut errors = std::mem::take(&mut self.scratch_errors);
        self.parser.flush(&mut out, &mut errors);
        self.collect(&mut out);
        self.scratch = out;
        if let Some(err) = self.report_errors(&mut errors, u64::MAX) {
            self.log_error(&err, u64::MAX);
        }
        self.scratch_errors = errors;
    }

    /// 为新完成的图像分配解码顺序编号
    fn collect(&mut self, out: &mut Vec<PictureInfo>) {
        for mut picture in out.drain(..) {
            picture.index = self.next_index;
            self.next_index += 1;
            self.stats.pictures += 1;
            self.ready.push_back(picture);
        }
    }

    /// 统计全部错误, 记录除第一个以外的错误, 返回第一个
    fn report_errors(&mut self, errors: &mut Vec<LiuError>, offset: u64) -> Option<LiuError> {
        let mut drained = errors.drain(..);
        let first = drained.next()?;
        self.stats.record(&first);
        let rest: Vec<LiuError> = drained.collect();
        for err in &rest {
            self.stats.record(err);
            self.log_error(err, offset);
        }
        Some(first)
    }

    fn log_error(&self, err: &LiuError, offset: u64) {
        let at = if offset == u64::MAX {
            "flush".to_string()
        } else {
            format!("offset={}", offset)
        };
        if self.stats.total_errors() <= self.options.error_log_limit {
            warn!("{}: {} ({})", self.options.codec, err, at);
        } else {
            debug!("{}: {} ({})", self.options.codec, err, at);
        }
    }
}
