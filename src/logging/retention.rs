use super::{LoggingConfig, build_log_path};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// 清理日志目录
///
/// 早于 `retention_days` 的文件被删除; 其余非当天的文件在 `compress_history` 时压缩为 `.gz`.
/// 返回 (删除数, 压缩数).
pub fn cleanup_logs(config: &LoggingConfig) -> Result<(usize, usize)> {
    let today = Local::now().date_naive();
    cleanup_logs_at(config, today)
}

pub(super) fn cleanup_logs_at(config: &LoggingConfig, today: NaiveDate) -> Result<(usize, usize)> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok((0, 0));
    }

    let cutoff = today - ChronoDuration::days(config.retention_days);
    let mut removed = 0;
    let mut compressed = 0;

    let entries = fs::read_dir(directory)
        .with_context(|| format!("读取日志目录失败, path={}", directory.display()))?;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let file_path = entry.path();

        let Some((date, is_gz)) = parse_log_name(&file_name, &config.file_prefix) else {
            continue;
        };

        if date < cutoff {
            match fs::remove_file(&file_path) {
                Ok(()) => removed += 1,
                Err(err) => warn!("删除过期日志失败, path={}: {}", file_path.display(), err),
            }
            continue;
        }

        if config.compress_history && !is_gz && date < today {
            match compress_to_gz(&file_path) {
                Ok(true) => compressed += 1,
                Ok(false) => {}
                Err(err) => warn!("压缩日志失败, path={}: {:#}", file_path.display(), err),
            }
        }
    }

    Ok((removed, compressed))
}

/// 压缩并删除原文件; 目标已存在时跳过并返回 false
fn compress_to_gz(path: &Path) -> Result<bool> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(false);
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());

    let mut buf = [0u8; 8 * 1024];
    loop {
        let read = input.read(&mut buf)?;
        if read == 0 {
            break;
        }
        encoder.write_all(&buf[..read])?;
    }

    encoder.finish()?;
    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(true)
}

/// 解析 `prefix.YYYY-MM-DD.log[.gz]`
fn parse_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;

    if let Some(date_part) = rest.strip_suffix(".log") {
        return Some((parse_date(date_part)?, false));
    }
    if let Some(date_part) = rest.strip_suffix(".log.gz") {
        return Some((parse_date(date_part)?, true));
    }
    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
