//! 分析器配置.
//!
//! 可从 JSON 文件加载, 每个字段都有默认值. 配置在这里校验后转换为
//! `liu-codec` 中的普通选项结构, 编解码器层不依赖 serde.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

use liu_codec::{
    Codec, ConversionOptions, PipelineOptions, SessionOptions, StartCodeSize, StreamFormat,
};

use crate::logging::LoggingConfig;

/// 编解码器设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecSetting {
    H264,
    H265,
}

impl From<CodecSetting> for Codec {
    fn from(value: CodecSetting) -> Self {
        match value {
            CodecSetting::H264 => Codec::H264,
            CodecSetting::H265 => Codec::H265,
        }
    }
}

/// 输入封装格式设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum InputFormat {
    #[default]
    #[serde(rename = "annexb")]
    AnnexB,
    #[serde(rename = "length-prefixed")]
    LengthPrefixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// 未指定时由调用方推断 (如根据文件扩展名)
    #[serde(default)]
    pub codec: Option<CodecSetting>,
    #[serde(default)]
    pub input_format: InputFormat,
    /// 长度前缀字节数, 仅 `length-prefixed` 使用
    #[serde(default = "default_length_size")]
    pub length_size: u8,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_retained_errors")]
    pub max_retained_errors: usize,
    #[serde(default)]
    pub strip_access_unit_delimiters: bool,
    #[serde(default)]
    pub strip_parameter_sets: bool,
    /// 生成 Annex B 时是否使用 3 字节起始码
    #[serde(default)]
    pub short_start_codes: bool,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_length_size() -> u8 {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_max_retained_errors() -> usize {
    1000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            codec: None,
            input_format: InputFormat::AnnexB,
            length_size: default_length_size(),
            queue_capacity: default_queue_capacity(),
            chunk_size: default_chunk_size(),
            max_retained_errors: default_max_retained_errors(),
            strip_access_unit_delimiters: false,
            strip_parameter_sets: false,
            short_start_codes: false,
            logging: None,
        }
    }
}

impl AnalyzerConfig {
    /// 从 JSON 文本解析并校验
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("解析配置失败")?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载并校验
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("配置文件非法, path={}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            bail!("queue_capacity 必须大于 0");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size 必须大于 0");
        }
        if !(1..=4).contains(&self.length_size) {
            bail!("length_size 必须在 1..=4 之间, 实际为 {}", self.length_size);
        }
        if let Some(logging) = &self.logging
            && logging.retention_days < 0
        {
            bail!("logging.retention_days 不能为负数");
        }
        Ok(())
    }

    /// 配置的编解码器
    pub fn codec(&self) -> Option<Codec> {
        self.codec.map(Codec::from)
    }

    /// 输入封装格式
    pub fn stream_format(&self) -> StreamFormat {
        match self.input_format {
            InputFormat::AnnexB => StreamFormat::AnnexB,
            InputFormat::LengthPrefixed => StreamFormat::LengthPrefixed {
                length_size: self.length_size,
            },
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            format: self.stream_format(),
            queue_capacity: self.queue_capacity,
            chunk_size: self.chunk_size,
            max_retained_errors: self.max_retained_errors,
            ..PipelineOptions::default()
        }
    }

    pub fn session_options(&self, codec: Codec) -> SessionOptions {
        SessionOptions::new(codec)
    }

    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            length_size: self.length_size,
            start_code: if self.short_start_codes {
                StartCodeSize::Three
            } else {
                StartCodeSize::Four
            },
            strip_access_unit_delimiters: self.strip_access_unit_delimiters,
            strip_parameter_sets: self.strip_parameter_sets,
        }
    }
}
