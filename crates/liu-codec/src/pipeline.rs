//! 流式分析流水线.
//!
//! 两个阶段通过 [`BoundedQueue`] 连接:
//! - 摄取线程: 从 `Read` 源按块读取, 经增量切分器得到完整 NAL, 放入队列
//! - 调用线程: 从队列取出 NAL, 送入 [`StreamSession`]
//!
//! 队列满时摄取线程阻塞. 摄取结束 (或读取出错) 时关闭队列,
//! 分析线程取完剩余 NAL 后结束.

use std::io::{self, Read};
use std::thread;

use liu_core::{BoundedQueue, LiuError, LiuResult};
use log::{debug, info, warn};

use crate::bytestream::{AnnexBFrames, LengthPrefixedFrames, RawNal, StreamFormat};
use crate::codec::Codec;
use crate::nal::OwnedNal;
use crate::picture::PictureInfo;
use crate::session::{RawParameterSets, SessionOptions, SessionStats, StreamSession};
use crate::splitter::StreamSplitter;

/// 流水线选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// 输入封装格式
    pub format: StreamFormat,
    /// 队列容量 (NAL 个数)
    pub queue_capacity: usize,
    /// 每次读取的字节数
    pub chunk_size: usize,
    /// 报告中保留的错误条数上限
    pub max_retained_errors: usize,
    /// 以 warn 级别输出的错误条数
    pub error_log_limit: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            format: StreamFormat::AnnexB,
            queue_capacity: 64,
            chunk_size: 64 * 1024,
            max_retained_errors: 1000,
            error_log_limit: 100,
        }
    }
}

impl PipelineOptions {
    /// 校验选项
    pub fn validate(&self) -> LiuResult<()> {
        self.format.validate()?;
        if self.queue_capacity == 0 {
            return Err(LiuError::InvalidArgument("队列容量必须大于 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(LiuError::InvalidArgument("读取块大小必须大于 0".into()));
        }
        Ok(())
    }

    fn session_options(&self, codec: Codec) -> SessionOptions {
        SessionOptions {
            codec,
            error_log_limit: self.error_log_limit,
        }
    }
}

/// 一条码流的分析结果
#[derive(Debug)]
pub struct AnalysisReport {
    /// 编解码器
    pub codec: Codec,
    /// 按解码顺序排列的图像
    pub pictures: Vec<PictureInfo>,
    /// 会话统计 (含分帧错误)
    pub stats: SessionStats,
    /// 按出现顺序保留的错误
    pub errors: Vec<LiuError>,
    /// 超出保留上限而未记录的错误数
    pub dropped_errors: u64,
    /// 读取的字节数
    pub bytes_read: u64,
    /// 流结束时存储的参数集
    pub parameter_sets: RawParameterSets,
}

impl AnalysisReport {
    fn new(codec: Codec) -> Self {
        Self {
            codec,
            pictures: Vec::new(),
            stats: SessionStats::default(),
            errors: Vec::new(),
            dropped_errors: 0,
            bytes_read: 0,
            parameter_sets: RawParameterSets::default(),
        }
    }

    /// 关键帧数量
    pub fn keyframe_count(&self) -> usize {
        self.pictures.iter().filter(|p| p.is_keyframe()).count()
    }

    /// 是否没有任何错误
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.dropped_errors == 0
    }
}

/// 收集结果的辅助结构
struct Collector {
    report: AnalysisReport,
    max_errors: usize,
}

impl Collector {
    fn new(codec: Codec, max_errors: usize) -> Self {
        Self {
            report: AnalysisReport::new(codec),
            max_errors,
        }
    }

    fn keep_error(&mut self, err: LiuError) {
        if self.report.errors.len() < self.max_errors {
            self.report.errors.push(err);
        } else {
            self.report.dropped_errors += 1;
        }
    }

    /// 会话之外的错误 (分帧、读取) 同样计入统计
    fn external_error(&mut self, err: LiuError) {
        *self.report.stats.errors.entry(err.kind()).or_insert(0) += 1;
        warn!("{}: {}", self.report.codec, err);
        self.keep_error(err);
    }

    fn drain(&mut self, session: &mut StreamSession) {
        while let Ok(picture) = session.receive_picture() {
            self.report.pictures.push(picture);
        }
    }

    fn finish(mut self, mut session: StreamSession) -> AnalysisReport {
        session.flush();
        self.drain(&mut session);
        let external = std::mem::take(&mut self.report.stats.errors);
        self.report.stats = session.stats().clone();
        for (kind, count) in external {
            *self.report.stats.errors.entry(kind).or_insert(0) += count;
        }
        self.report.parameter_sets = session.raw_parameter_sets();
        self.report
    }
}

/// 在线程间传递的摄取结果
type Ingested = LiuResult<OwnedNal>;

/// 运行两阶段流水线, 分析 `reader` 中的整条码流
///
/// 只有选项非法或无法创建线程时返回 `Err`; 码流中的错误记录在报告中.
///
/// # 示例
/// ```
/// use liu_codec::{Codec, PipelineOptions, run_pipeline};
///
/// let data: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];
/// let report = run_pipeline(data, Codec::H264, PipelineOptions::default()).unwrap();
/// assert_eq!(report.stats.nals, 1);
/// assert!(report.pictures.is_empty());
/// ```
pub fn run_pipeline<R: Read + Send>(
    reader: R,
    codec: Codec,
    options: PipelineOptions,
) -> LiuResult<AnalysisReport> {
    options.validate()?;
    let queue: BoundedQueue<Ingested> = BoundedQueue::new(options.queue_capacity)?;
    let mut session = StreamSession::new(options.session_options(codec));
    let mut collector = Collector::new(codec, options.max_retained_errors);

    let ingest_result = thread::scope(|scope| -> LiuResult<thread::Result<LiuResult<u64>>> {
        let producer = queue.clone();
        let handle = thread::Builder::new()
            .name("liu-ingest".into())
            .spawn_scoped(scope, move || {
                let result = ingest(reader, options.format, options.chunk_size, &producer);
                producer.close();
                result
            })?;

        while let Some(item) = queue.pop() {
            match item {
                Ok(nal) => {
                    if let Err(err) = session.send_owned(&nal) {
                        collector.keep_error(err);
                    }
                    collector.drain(&mut session);
                }
                Err(err) => collector.external_error(err),
            }
        }
        Ok(handle.join())
    })?;

    match ingest_result {
        Ok(Ok(bytes)) => collector.report.bytes_read = bytes,
        Ok(Err(err)) => collector.external_error(err),
        Err(_) => collector.external_error(LiuError::Io(io::Error::other("摄取线程异常退出"))),
    }

    let report = collector.finish(session);
    info!(
        "{}: 分析完成, {} 字节, {} 个 NAL, {} 个图像, {} 个错误",
        codec,
        report.bytes_read,
        report.stats.nals,
        report.pictures.len(),
        report.stats.total_errors()
    );
    Ok(report)
}

/// 摄取阶段: 读取、切分、入队, 返回读取的字节数
fn ingest<R: Read>(
    mut reader: R,
    format: StreamFormat,
    chunk_size: usize,
    queue: &BoundedQueue<Ingested>,
) -> LiuResult<u64> {
    let mut splitter = StreamSplitter::new(format)?;
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        total += n as u64;
        splitter.push(&buf[..n]);
        loop {
            match splitter.next_nal() {
                Ok(Some(nal)) => queue.push(Ok(nal))?,
                Ok(None) => break,
                Err(err) => queue.push(Err(err))?,
            }
        }
    }

    match splitter.finish() {
        Ok(Some(nal)) => queue.push(Ok(nal))?,
        Ok(None) => {}
        Err(err) => queue.push(Err(err))?,
    }
    debug!("摄取结束, 共读取 {} 字节", total);
    Ok(total)
}

/// 同步分析一个完整缓冲区
///
/// 与 [`run_pipeline`] 产出相同的图像与统计, 不创建线程.
/// 分帧错误终止分析, 已产出的结果保留在报告中.
pub fn analyze_buffer(
    data: &[u8],
    codec: Codec,
    format: StreamFormat,
    options: PipelineOptions,
) -> LiuResult<AnalysisReport> {
    let mut session = StreamSession::new(options.session_options(codec));
    let mut collector = Collector::new(codec, options.max_retained_errors);

    match format {
        StreamFormat::AnnexB => {
            feed_frames(AnnexBFrames::new(data), &mut session, &mut collector);
        }
        StreamFormat::LengthPrefixed { length_size } => {
            let frames = LengthPrefixedFrames::new(data, length_size)?;
            feed_frames(frames, &mut session, &mut collector);
        }
    }
    collector.report.bytes_read = data.len() as u64;
    Ok(collector.finish(session))
}

fn feed_frames<'a, I>(frames: I, session: &mut StreamSession, collector: &mut Collector)
where
    I: Iterator<Item = LiuResult<RawNal<'a>>>,
{
    for frame in frames {
        match frame {
            Ok(raw) => {
                if let Err(err) = session.send_data(raw.data, raw.offset as u64) {
                    collector.keep_error(err);
                }
                collector.drain(session);
            }
            Err(err) => collector.external_error(err),
        }
    }
}
