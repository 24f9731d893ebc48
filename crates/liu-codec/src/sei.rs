//! SEI (补充增强信息) 解析.
//!
//! H.264 与 HEVC 的 SEI 消息使用相同的 `0xFF` 扩展编码:
//! payload_type 与 payload_size 各由若干 `0xFF` 字节加一个结束字节累加而成.
//! 逐字节解析前先去除防竞争字节.

use liu_core::emulation::remove_emulation_prevention;
use liu_core::{BitReader, LiuError, LiuResult};

use crate::codec::Codec;

/// SEI 负载类型编号
pub mod payload_type {
    /// buffering_period
    pub const BUFFERING_PERIOD: u32 = 0;
    /// pic_timing
    pub const PIC_TIMING: u32 = 1;
    /// user_data_registered_itu_t_t35
    pub const USER_DATA_REGISTERED: u32 = 4;
    /// user_data_unregistered
    pub const USER_DATA_UNREGISTERED: u32 = 5;
    /// recovery_point
    pub const RECOVERY_POINT: u32 = 6;
}

/// 一条 SEI 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeiPayload {
    /// payloadType
    pub payload_type: u32,
    /// payloadSize (字节)
    pub payload_size: usize,
    /// 解析后的内容
    pub message: SeiMessage,
}

/// SEI 消息内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeiMessage {
    /// 恢复点
    RecoveryPoint(RecoveryPoint),
    /// ITU-T T.35 注册用户数据 (如 CEA-608/708 字幕)
    UserDataRegistered(UserDataRegistered),
    /// 未注册用户数据 (UUID + 任意字节, 编码器常用来写版本信息)
    UserDataUnregistered(UserDataUnregistered),
    /// 其他类型, 保留原始负载
    Raw(Vec<u8>),
}

/// recovery_point SEI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPoint {
    /// H.264 为 recovery_frame_cnt (ue), HEVC 为 recovery_poc_cnt (se, 可为负)
    pub recovery_cnt: i32,
    /// exact_match_flag
    pub exact_match: bool,
    /// broken_link_flag
    pub broken_link: bool,
}

/// user_data_registered_itu_t_t35 SEI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataRegistered {
    /// itu_t_t35_country_code
    pub country_code: u8,
    /// country_code == 0xFF 时的扩展字节
    pub country_code_extension: Option<u8>,
    /// 其余负载
    pub payload: Vec<u8>,
}

/// user_data_unregistered SEI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataUnregistered {
    /// uuid_iso_iec_11578
    pub uuid: [u8; 16],
    /// 其余负载
    pub payload: Vec<u8>,
}

impl SeiPayload {
    /// 若为恢复点消息则返回其内容
    pub fn recovery_point(&self) -> Option<&RecoveryPoint> {
        match &self.message {
            SeiMessage::RecoveryPoint(rp) => Some(rp),
            _ => None,
        }
    }
}

/// 解析 SEI NAL 的载荷 (不含 NAL 头部, 含防竞争字节)
///
/// 单条消息内容解析失败时保留原始负载, 只有消息边界本身不合法才返回错误.
pub fn parse_sei(payload: &[u8], codec: Codec) -> LiuResult<Vec<SeiPayload>> {
    let codec_name = codec.to_string();
    let codec_name = codec_name.as_str();
    let rbsp = remove_emulation_prevention(payload);
    let mut messages = Vec::new();
    let mut offset = 0usize;

    while offset < rbsp.len() && !is_rbsp_trailing_bits(&rbsp[offset..]) {
        let payload_type = read_ff_coded(&rbsp, &mut offset, codec_name, "payload_type")?;
        let payload_size = read_ff_coded(&rbsp, &mut offset, codec_name, "payload_size")? as usize;
        let end = offset
            .checked_add(payload_size)
            .filter(|&end| end <= rbsp.len())
            .ok_or_else(|| {
                LiuError::InvalidData(format!(
                    "{} SEI: 负载被截断, type={}, size={}, remaining={}",
                    codec_name,
                    payload_type,
                    payload_size,
                    rbsp.len() - offset
                ))
            })?;
        let body = &rbsp[offset..end];
        offset = end;

        let message = match decode_message(codec, payload_type, body) {
            Ok(message) => message,
            Err(err) => {
                log::debug!(
                    "{} SEI: type={} 内容解析失败, 保留原始负载: {}",
                    codec_name,
                    payload_type,
                    err
                );
                SeiMessage::Raw(body.to_vec())
            }
        };
        messages.push(SeiPayload {
            payload_type,
            payload_size,
            message,
        });
    }
    Ok(messages)
}

fn is_rbsp_trailing_bits(rest: &[u8]) -> bool {
    rest[0] == 0x80 && rest[1..].iter().all(|&b| b == 0)
}

fn read_ff_coded(
    data: &[u8],
    offset: &mut usize,
    codec_name: &str,
    field: &str,
) -> LiuResult<u32> {
    let mut value = 0u32;
    loop {
        let byte = *data.get(*offset).ok_or_else(|| {
            LiuError::InvalidData(format!("{} SEI: {} 被截断", codec_name, field))
        })?;
        *offset += 1;
        value = value.checked_add(u32::from(byte)).ok_or_else(|| {
            LiuError::InvalidData(format!("{} SEI: {} 溢出", codec_name, field))
        })?;
        if byte != 0xFF {
            return Ok(value);
        }
    }
}

fn decode_message(codec: Codec, payload_type: u32, body: &[u8]) -> LiuResult<SeiMessage> {
    Ok(match payload_type {
        payload_type::RECOVERY_POINT => {
            let mut br = BitReader::new_raw(body);
            let recovery_cnt = match codec {
                Codec::H264 => i32::try_from(br.read_ue()?).map_err(|_| {
                    LiuError::InvalidData("recovery_frame_cnt 超出范围".into())
                })?,
                Codec::H265 => br.read_se()?,
            };
            let exact_match = br.read_flag()?;
            let broken_link = br.read_flag()?;
            SeiMessage::RecoveryPoint(RecoveryPoint {
                recovery_cnt,
                exact_match,
                broken_link,
            })
        }
        payload_type::USER_DATA_REGISTERED => {
            let (&country_code, rest) = body
                .split_first()
                .ok_or_else(|| LiuError::InvalidData("T.35 负载为空".into()))?;
            let (country_code_extension, rest) = if country_code == 0xFF {
                let (&ext, rest) = rest
                    .split_first()
                    .ok_or_else(|| LiuError::InvalidData("T.35 缺少扩展国家码".into()))?;
                (Some(ext), rest)
            } else {
                (None, rest)
            };
            SeiMessage::UserDataRegistered(UserDataRegistered {
                country_code,
                country_code_extension,
                payload: rest.to_vec(),
            })
        }
        payload_type::USER_DATA_UNREGISTERED => {
            if body.len() < 16 {
                return Err(LiuError::InvalidData(format!(
                    "user_data_unregistered 过短, len={}",
                    body.len()
                )));
            }
            let mut uuid = [0u8; 16];
            uuid.copy_from_slice(&body[..16]);
            SeiMessage::UserDataUnregistered(UserDataUnregistered {
                uuid,
                payload: body[16..].to_vec(),
            })
        }
        _ => SeiMessage::Raw(body.to_vec()),
    })
}
