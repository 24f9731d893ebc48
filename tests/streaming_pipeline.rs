//! 摄取线程 + 有界队列 + 分析会话 的端到端测试

mod common;

use std::io::{self, Cursor, Read};
use std::thread;

use common::{annex_b, avc, hevc, length_prefixed};
use liu::codec::{Codec, PipelineOptions, StreamFormat, analyze_buffer, run_pipeline};
use liu::core::{BoundedQueue, ErrorKind, LiuError};

fn h264_nals() -> Vec<Vec<u8>> {
    vec![
        avc::sps(2),
        avc::pps(),
        avc::Slice::idr(0).nal(),
        avc::Slice::p(1, 2).nal(),
        avc::Slice::p(2, 4).nal(),
        avc::Slice::idr(1).nal(),
        avc::Slice::p(1, 2).nal(),
    ]
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tight_options(format: StreamFormat) -> PipelineOptions {
    PipelineOptions {
        format,
        queue_capacity: 1,
        chunk_size: 3,
        ..PipelineOptions::default()
    }
}

#[test]
fn test_threaded_pipeline_matches_buffer_analysis() {
    init_logger();
    let data = annex_b(&h264_nals());
    let expected = analyze_buffer(
        &data,
        Codec::H264,
        StreamFormat::AnnexB,
        PipelineOptions::default(),
    )
    .unwrap();
    let report = run_pipeline(
        Cursor::new(data.clone()),
        Codec::H264,
        tight_options(StreamFormat::AnnexB),
    )
    .unwrap();

    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.pictures, expected.pictures);
    assert_eq!(report.stats, expected.stats);
    assert_eq!(report.bytes_read, data.len() as u64);
    assert_eq!(report.pictures.len(), 5);
    assert_eq!(report.keyframe_count(), 2);
}

#[test]
fn test_threaded_pipeline_length_prefixed_hevc() {
    init_logger();
    let nals = vec![
        hevc::vps(),
        hevc::sps(false),
        hevc::pps(),
        hevc::Slice::idr().nal(),
        hevc::Slice::trail(1, &[-1]).nal(),
        hevc::Slice::trail(2, &[-1]).nal(),
    ];
    let format = StreamFormat::LengthPrefixed { length_size: 2 };
    let report = run_pipeline(
        Cursor::new(length_prefixed(&nals, 2)),
        Codec::H265,
        tight_options(format),
    )
    .unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.pictures.len(), 3);
    assert_eq!(report.stats.nals, 6);
    assert_eq!(report.parameter_sets.vps.len(), 1);
    let pocs: Vec<i32> = report.pictures.iter().map(|p| p.poc).collect();
    assert_eq!(pocs, vec![0, 1, 2]);
}

/// 读出前半部分数据后报错
struct BrokenReader {
    data: Vec<u8>,
    pos: usize,
    fail_at: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.fail_at {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "连接中断"));
        }
        let end = self.fail_at.min(self.pos + buf.len());
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}

#[test]
fn test_read_error_closes_queue_and_is_reported() {
    init_logger();
    let nals = h264_nals();
    let data = annex_b(&nals);
    // 在第一个 P 条带之后断开, 它因缺少后续起始码而无法完成切分
    let fail_at: usize = nals[..4].iter().map(|n| n.len() + 4).sum();
    let reader = BrokenReader {
        data,
        pos: 0,
        fail_at,
    };
    let report = run_pipeline(reader, Codec::H264, tight_options(StreamFormat::AnnexB)).unwrap();

    assert_eq!(report.stats.error_count(ErrorKind::Io), 1);
    assert!(report.errors.iter().any(|e| matches!(e, LiuError::Io(_))));
    assert!(!report.is_clean());
    // 出错时切分器中残留的 NAL 不再输出
    assert_eq!(report.pictures.len(), 1);
    assert!(report.pictures[0].is_keyframe());
}

#[test]
fn test_invalid_pipeline_options_rejected() {
    let options = PipelineOptions {
        queue_capacity: 0,
        ..PipelineOptions::default()
    };
    let result = run_pipeline(io::empty(), Codec::H264, options);
    assert!(matches!(result, Err(LiuError::InvalidArgument(_))));
}

#[test]
fn test_bounded_queue_preserves_order_under_backpressure() {
    let queue = BoundedQueue::new(1).unwrap();
    let producer = queue.clone();
    let handle = thread::spawn(move || {
        for i in 0..100u32 {
            producer.push(i).unwrap();
        }
        producer.close();
        producer.push(100)
    });

    let mut received = Vec::new();
    while let Some(value) = queue.pop() {
        assert!(queue.len() <= 1);
        received.push(value);
    }
    let after_close = handle.join().unwrap();
    assert_eq!(received, (0..100).collect::<Vec<_>>());
    assert!(matches!(after_close, Err(LiuError::QueueClosed)));
    assert!(queue.is_closed());
}
