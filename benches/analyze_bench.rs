//! Liu 码流分析性能基准测试.
//!
//! 覆盖比特读取、格式转换、NAL 定位与完整会话分析.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use liu::codec::{
    ByteStreamConverter, Codec, ConversionOptions, PipelineOptions, StreamFormat, analyze_buffer,
    locate_all, run_pipeline,
};
use liu::core::{BitReader, BitWriter};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{annex_b, avc};

/// 构造含 `gops` 个 GOP 的 H.264 码流, 每个 GOP 为 1 个 IDR + 15 个 P
fn make_h264_stream(gops: u32) -> Vec<u8> {
    let mut nals = vec![avc::sps(4), avc::pps()];
    for gop in 0..gops {
        nals.push(avc::Slice::idr(gop % 2).nal());
        for i in 1..16 {
            nals.push(avc::Slice::p(i, (i * 2) % 64).nal());
        }
    }
    annex_b(&nals)
}

/// 交替的 ue/se 语法元素
fn make_exp_golomb(count: u32) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(count as usize * 2);
    for i in 0..count {
        w.write_ue(i % 300);
        w.write_se((i % 64) as i32 - 32);
    }
    w.write_rbsp_trailing_bits();
    w.finish()
}

fn bench_bit_reader(c: &mut Criterion) {
    let data = make_exp_golomb(10_000);
    c.bench_function("bitreader_exp_golomb_20k", |b| {
        b.iter(|| {
            let mut br = BitReader::new_raw(black_box(&data));
            let mut sum = 0i64;
            for _ in 0..10_000 {
                sum += i64::from(br.read_ue().unwrap());
                sum += i64::from(br.read_se().unwrap());
            }
            sum
        });
    });
}

fn bench_conversion(c: &mut Criterion) {
    let data = make_h264_stream(64);
    let converter = ByteStreamConverter::new(Codec::H264, ConversionOptions::default()).unwrap();
    let units = converter.to_unit_stream(&data).unwrap();
    c.bench_function("annexb_to_unit_stream_1024_pictures", |b| {
        b.iter(|| converter.to_unit_stream(black_box(&data)).unwrap());
    });
    c.bench_function("unit_stream_to_annexb_1024_pictures", |b| {
        b.iter(|| converter.to_annex_b(black_box(&units)).unwrap());
    });
}

fn bench_locate(c: &mut Criterion) {
    let data = make_h264_stream(64);
    c.bench_function("locate_annexb_1024_pictures", |b| {
        b.iter(|| {
            locate_all(black_box(&data), Codec::H264, StreamFormat::AnnexB)
                .unwrap()
                .len()
        });
    });
}

fn bench_session(c: &mut Criterion) {
    let data = make_h264_stream(64);
    c.bench_function("analyze_buffer_1024_pictures", |b| {
        b.iter(|| {
            analyze_buffer(
                black_box(&data),
                Codec::H264,
                StreamFormat::AnnexB,
                PipelineOptions::default(),
            )
            .unwrap()
            .pictures
            .len()
        });
    });
    c.bench_function("run_pipeline_1024_pictures", |b| {
        b.iter(|| {
            let options = PipelineOptions {
                chunk_size: 4096,
                ..PipelineOptions::default()
            };
            run_pipeline(black_box(data.as_slice()), Codec::H264, options)
                .unwrap()
                .pictures
                .len()
        });
    });
}

criterion_group!(
    benches,
    bench_bit_reader,
    bench_conversion,
    bench_locate,
    bench_session
);
criterion_main!(benches);
