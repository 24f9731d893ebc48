//! liu-probe - 码流结构探测工具
//!
//! 类似 ffprobe, 针对 H.264/H.265 基本流输出逐图像的结构信息:
//! 关键帧、参考属性、POC、参数集 id 与参考列表. 也可以在 Annex B
//! 与长度前缀格式之间转换码流.

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use liu::AnalyzerConfig;
use liu::config::{CodecSetting, InputFormat};
use liu_codec::{
    AnalysisReport, ByteStreamConverter, Codec, NalUnit, PictureInfo, StreamFormat, h264, h265,
    run_pipeline,
};

/// 码流封装格式参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Annex B 起始码格式
    Annexb,
    /// 长度前缀格式
    Length,
}

/// Liu 码流探测工具
#[derive(Parser, Debug)]
#[command(name = "liu-probe", version, about = "H.264/H.265 基本流结构探测工具")]
struct Cli {
    /// 输入文件路径
    input: PathBuf,

    /// 编解码器 (h264/h265), 缺省时根据扩展名推断
    #[arg(long)]
    codec: Option<String>,

    /// 输入封装格式
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// 长度前缀字节数 (1..=4)
    #[arg(long)]
    length_size: Option<u8>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 只输出码流汇总, 不输出逐图像信息
    #[arg(long)]
    summary: bool,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 日志详细程度 (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// 转换码流格式并写入 --output
    #[arg(long, value_enum, requires = "output")]
    convert_to: Option<FormatArg>,

    /// 转换输出文件
    #[arg(short, long)]
    output: Option<PathBuf>,
}

// ============================================================
// JSON 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeOutput {
    stream: StreamSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pictures: Option<Vec<PictureOutput>>,
    errors: Vec<String>,
}

/// 码流汇总
#[derive(Serialize)]
struct StreamSummary {
    filename: String,
    codec: String,
    format: String,
    bytes: u64,
    nals: u64,
    vcl_nals: u64,
    pictures: u64,
    keyframes: usize,
    skipped_nals: u64,
    error_counts: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<SequenceInfo>,
}

/// 第一个 SPS 描述的序列参数
#[derive(Serialize)]
struct SequenceInfo {
    width: u32,
    height: u32,
    profile: u32,
    level: String,
    bit_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_rate: Option<String>,
}

/// 图像信息
#[derive(Serialize)]
struct PictureOutput {
    index: u64,
    offset: u64,
    size: u64,
    nal_type: u8,
    slice_type: String,
    slice_count: u32,
    flags: String,
    poc: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_num: Option<u32>,
    temporal_id: u8,
    sps_id: u32,
    pps_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    vps_id: Option<u32>,
    reference_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ref_list0: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ref_list1: Vec<i32>,
}

impl From<&PictureInfo> for PictureOutput {
    fn from(p: &PictureInfo) -> Self {
        Self {
            index: p.index,
            offset: p.offset,
            size: p.size,
            nal_type: p.nal_type,
            slice_type: p.slice_type.name().to_string(),
            slice_count: p.slice_count,
            flags: p.flags.names(),
            poc: p.poc,
            frame_num: p.frame_num,
            temporal_id: p.temporal_id,
            sps_id: p.sps_id,
            pps_id: p.pps_id,
            vps_id: p.vps_id,
            reference_count: p.reference_count,
            ref_list0: p.ref_list0.clone(),
            ref_list1: p.ref_list1.clone(),
        }
    }
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("错误: {:#}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };
    apply_overrides(&mut config, &cli)?;
    config.validate()?;
    init_logging(&config, cli.verbose)?;

    let codec = resolve_codec(&cli.input, config.codec())?;
    log::debug!("输入: {}, 编解码器: {}", cli.input.display(), codec);

    if let Some(target) = cli.convert_to {
        let output = cli
            .output
            .as_deref()
            .ok_or_else(|| anyhow!("--convert-to 需要同时指定 --output"))?;
        return convert(&cli.input, output, codec, &config, target);
    }

    let file = File::open(&cli.input)
        .with_context(|| format!("无法打开文件 '{}'", cli.input.display()))?;
    let report = run_pipeline(BufReader::new(file), codec, config.pipeline_options())
        .context("分析码流失败")?;

    let output = build_output(&cli.input, &config, &report, !cli.summary);
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("序列化 JSON 失败")?;
        println!("{json}");
    } else {
        print_stream_text(&output.stream);
        if let Some(pictures) = &output.pictures {
            print_pictures_text(pictures);
        }
        print_errors_text(&output.errors, report.dropped_errors);
    }
    Ok(())
}

/// 命令行参数覆盖配置文件
fn apply_overrides(config: &mut AnalyzerConfig, cli: &Cli) -> Result<()> {
    if let Some(name) = &cli.codec {
        let codec: Codec = name.parse().map_err(|e| anyhow!("{}", e))?;
        config.codec = Some(match codec {
            Codec::H264 => CodecSetting::H264,
            Codec::H265 => CodecSetting::H265,
        });
    }
    if let Some(format) = cli.format {
        config.input_format = match format {
            FormatArg::Annexb => InputFormat::AnnexB,
            FormatArg::Length => InputFormat::LengthPrefixed,
        };
    }
    if let Some(length_size) = cli.length_size {
        config.length_size = length_size;
    }
    Ok(())
}

fn init_logging(config: &AnalyzerConfig, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    match &config.logging {
        Some(logging) => {
            let mut logging = logging.clone();
            if let Some(level) = level {
                logging.level = level.to_string();
            }
            liu::logging::init(logging)
        }
        None => liu::logging::init_console(level.unwrap_or("warn")),
    }
}

/// 确定编解码器: 配置/参数优先, 否则根据扩展名推断
fn resolve_codec(input: &Path, configured: Option<Codec>) -> Result<Codec> {
    if let Some(codec) = configured {
        return Ok(codec);
    }
    input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Codec::from_extension)
        .ok_or_else(|| anyhow!("无法根据扩展名推断编解码器, 请使用 --codec 指定"))
}

/// 格式转换
fn convert(
    input: &Path,
    output: &Path,
    codec: Codec,
    config: &AnalyzerConfig,
    target: FormatArg,
) -> Result<()> {
    let data =
        std::fs::read(input).with_context(|| format!("读取文件失败 '{}'", input.display()))?;
    let converter = ByteStreamConverter::new(codec, config.conversion_options())
        .map_err(|e| anyhow!("{}", e))?;

    let result = match (config.stream_format(), target) {
        (StreamFormat::AnnexB, FormatArg::Length) => converter.to_unit_stream(&data),
        (StreamFormat::LengthPrefixed { .. }, FormatArg::Annexb) => converter.to_annex_b(&data),
        // 同格式: 经过一次往返, 规范化起始码并应用过滤选项
        (StreamFormat::AnnexB, FormatArg::Annexb) => converter
            .to_unit_stream(&data)
            .and_then(|units| converter.to_annex_b(&units)),
        (StreamFormat::LengthPrefixed { .. }, FormatArg::Length) => converter
            .to_annex_b(&data)
            .and_then(|annex_b| converter.to_unit_stream(&annex_b)),
    };

    let (bytes, failure) = match result {
        Ok(bytes) => (bytes, None),
        Err(partial) => (partial.produced, Some(partial.source)),
    };
    std::fs::write(output, &bytes)
        .with_context(|| format!("写入文件失败 '{}'", output.display()))?;
    eprintln!(
        "已写入 {} ({} 字节, {} → {})",
        output.display(),
        bytes.len(),
        data.len(),
        bytes.len()
    );
    if let Some(err) = failure {
        bail!("码流在转换过程中出错, 只写入了出错前的部分: {}", err);
    }
    Ok(())
}

fn build_output(
    input: &Path,
    config: &AnalyzerConfig,
    report: &AnalysisReport,
    with_pictures: bool,
) -> ProbeOutput {
    let format = match config.stream_format() {
        StreamFormat::AnnexB => "annexb".to_string(),
        StreamFormat::LengthPrefixed { length_size } => format!("length-prefixed({length_size})"),
    };
    let sequence = report
        .parameter_sets
        .sps
        .first()
        .and_then(|raw| describe_sps(report.codec, raw));
    let stream = StreamSummary {
        filename: input.display().to_string(),
        codec: report.codec.to_string(),
        format,
        bytes: report.bytes_read,
        nals: report.stats.nals,
        vcl_nals: report.stats.vcl_nals,
        pictures: report.stats.pictures,
        keyframes: report.keyframe_count(),
        skipped_nals: report.stats.skipped_nals,
        error_counts: report
            .stats
            .errors
            .iter()
            .map(|(kind, count)| (kind.name().to_string(), *count))
            .collect(),
        sequence,
    };
    ProbeOutput {
        stream,
        pictures: with_pictures.then(|| report.pictures.iter().map(PictureOutput::from).collect()),
        errors: report.errors.iter().map(|e| e.to_string()).collect(),
    }
}

/// 重新解析存储的 SPS, 提取分辨率等信息
fn describe_sps(codec: Codec, raw: &[u8]) -> Option<SequenceInfo> {
    let nal = NalUnit::parse(codec, raw, 0).ok()?;
    match codec {
        Codec::H264 => {
            let sps = h264::parse_sps(&mut nal.reader()).ok()?;
            Some(SequenceInfo {
                width: sps.width,
                height: sps.height,
                profile: u32::from(sps.profile_idc),
                level: format!("{:.1}", f32::from(sps.level_idc) / 10.0),
                bit_depth: sps.bit_depth_luma,
                frame_rate: sps.fps().map(|r| format!("{}/{}", r.num, r.den)),
            })
        }
        Codec::H265 => {
            let sps = h265::parse_sps(&mut nal.reader()).ok()?;
            Some(SequenceInfo {
                width: sps.width,
                height: sps.height,
                profile: u32::from(sps.ptl.profile_idc),
                level: format!("{:.1}", sps.ptl.level()),
                bit_depth: sps.bit_depth_luma,
                frame_rate: sps.fps().map(|r| format!("{}/{}", r.num, r.den)),
            })
        }
    }
}

/// 文本输出: 码流汇总
fn print_stream_text(stream: &StreamSummary) {
    println!("[STREAM]");
    println!("  文件名       : {}", stream.filename);
    println!("  编解码器     : {}", stream.codec);
    println!("  封装格式     : {}", stream.format);
    println!("  字节数       : {}", stream.bytes);
    if let Some(seq) = &stream.sequence {
        println!("  分辨率       : {}x{}", seq.width, seq.height);
        println!("  Profile      : {}", seq.profile);
        println!("  Level        : {}", seq.level);
        println!("  位深         : {}", seq.bit_depth);
        if let Some(fr) = &seq.frame_rate {
            println!("  帧率         : {fr}");
        }
    }
    println!("  NAL 数量     : {} (VCL {})", stream.nals, stream.vcl_nals);
    println!("  图像数量     : {}", stream.pictures);
    println!("  关键帧数量   : {}", stream.keyframes);
    if stream.skipped_nals > 0 {
        println!("  跳过的 NAL   : {}", stream.skipped_nals);
    }
    for (kind, count) in &stream.error_counts {
        println!("  错误 {:<30}: {}", kind, count);
    }
    println!("[/STREAM]");
    println!();
}

/// 文本输出: 逐图像信息
fn print_pictures_text(pictures: &[PictureOutput]) {
    for p in pictures {
        println!("[PICTURE #{}]", p.index);
        println!("  偏移/大小    : {} / {}", p.offset, p.size);
        println!(
            "  类型         : {} (nal_type={}, {} 个条带)",
            p.slice_type, p.nal_type, p.slice_count
        );
        println!("  标志         : {}", p.flags);
        println!("  POC          : {}", p.poc);
        if let Some(frame_num) = p.frame_num {
            println!("  frame_num    : {frame_num}");
        }
        match p.vps_id {
            Some(vps_id) => println!(
                "  参数集       : VPS {} / SPS {} / PPS {} (tid={})",
                vps_id, p.sps_id, p.pps_id, p.temporal_id
            ),
            None => println!("  参数集       : SPS {} / PPS {}", p.sps_id, p.pps_id),
        }
        println!("  参考图像数   : {}", p.reference_count);
        if !p.ref_list0.is_empty() {
            println!("  RefPicList0  : {:?}", p.ref_list0);
        }
        if !p.ref_list1.is_empty() {
            println!("  RefPicList1  : {:?}", p.ref_list1);
        }
        println!("[/PICTURE]");
    }
    if !pictures.is_empty() {
        println!();
    }
}

/// 文本输出: 错误列表
fn print_errors_text(errors: &[String], dropped: u64) {
    if errors.is_empty() {
        return;
    }
    println!("[ERRORS]");
    for err in errors {
        println!("  {err}");
    }
    if dropped > 0 {
        println!("  ... 另有 {dropped} 个错误未记录");
    }
    println!("[/ERRORS]");
}
