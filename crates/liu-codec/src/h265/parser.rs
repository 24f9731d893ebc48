//! HEVC 逐 NAL 分析器.
//!
//! 按解码顺序接收 NAL, 维护 VPS/SPS/PPS 存储、POC 状态与参考图像集跟踪.
//! 图像边界由 first_slice_segment_in_pic_flag 与访问单元起始 NAL 决定.

use bytes::Bytes;
use liu_core::{LiuError, LiuResult};
use log::{debug, warn};

use super::nal::{NalHeader, NalUnitType};
use super::pps::{Pps, parse_pps};
use super::reference::{PocDecoder, RpsTracker};
use super::slice::{SliceSegmentHeader, parse_slice_segment_header};
use super::sps::{Sps, parse_sps};
use super::vps::{Vps, parse_vps};
use crate::codec::Codec;
use crate::nal::NalUnit;
use crate::param_set::{ParameterSetStore, StoreOutcome};
use crate::picture::{PictureFlags, PictureInfo};
use crate::sei::parse_sei;

/// 正在累积条带段的图像
#[derive(Debug)]
struct PendingPicture {
    pps_id: u32,
    info: PictureInfo,
}

/// HEVC 码流分析器
#[derive(Debug)]
pub struct H265Parser {
    vps: ParameterSetStore<Vps>,
    sps: ParameterSetStore<Sps>,
    pps: ParameterSetStore<Pps>,
    poc: PocDecoder,
    tracker: RpsTracker,
    current: Option<PendingPicture>,
    /// 下一个 CRA 的 NoRaslOutputFlag 为 1 (流开始或 EOS 之后)
    cra_starts_sequence: bool,
    /// 已遇到过 IRAP 图像
    seen_irap: bool,
    /// 最近的 IRAP 的 NoRaslOutputFlag; 为真时其 RASL 图像不可解码
    skip_rasl: bool,
    /// 下一个图像前出现过恢复点 SEI
    recovery_point: bool,
}

impl Default for H265Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl H265Parser {
    /// 创建分析器
    pub fn new() -> Self {
        Self {
            vps: ParameterSetStore::new("VPS"),
            sps: ParameterSetStore::new("SPS"),
            pps: ParameterSetStore::new("PPS"),
            poc: PocDecoder::new(),
            tracker: RpsTracker::new(),
            current: None,
            cra_starts_sequence: true,
            seen_irap: false,
            skip_rasl: false,
            recovery_point: false,
        }
    }

    /// VPS 存储
    pub fn vps_store(&self) -> &ParameterSetStore<Vps> {
        &self.vps
    }

    /// SPS 存储
    pub fn sps_store(&self) -> &ParameterSetStore<Sps> {
        &self.sps
    }

    /// PPS 存储
    pub fn pps_store(&self) -> &ParameterSetStore<Pps> {
        &self.pps
    }

    /// 参考图像集跟踪器
    pub fn tracker(&self) -> &RpsTracker {
        &self.tracker
    }

    /// 处理一个 NAL
    ///
    /// 完成的图像追加到 `out`; 该 NAL 产生的错误追加到 `errors`.
    pub fn push_nal(
        &mut self,
        header: &NalHeader,
        nal: &NalUnit<'_>,
        out: &mut Vec<PictureInfo>,
        errors: &mut Vec<LiuError>,
    ) {
        if header.layer_id > 0 {
            debug!(
                "HEVC: 忽略增强层 NAL, layer_id={}, type={}, offset={}",
                header.layer_id, header.nal_type, nal.offset
            );
            return;
        }
        let result = match header.nal_type {
            NalUnitType::Vps => {
                self.finish_picture(out);
                self.handle_vps(nal)
            }
            NalUnitType::Sps => {
                self.finish_picture(out);
                self.handle_sps(nal)
            }
            NalUnitType::Pps => {
                self.finish_picture(out);
                self.handle_pps(nal)
            }
            NalUnitType::PrefixSei => {
                self.finish_picture(out);
                parse_sei(nal.payload(), Codec::H265).map(|messages| {
                    if messages.iter().any(|m| m.recovery_point().is_some()) {
                        self.recovery_point = true;
                    }
                })
            }
            NalUnitType::Eos | NalUnitType::Eob => {
                self.finish_picture(out);
                self.cra_starts_sequence = true;
                Ok(())
            }
            NalUnitType::Unknown(id) if id < 32 => {
                debug!("HEVC: 忽略保留的 VCL NAL type={}, offset={}", id, nal.offset);
                Ok(())
            }
            other if other.is_vcl() => self.handle_slice(header, nal, out, errors),
            other if other.starts_access_unit() => {
                self.finish_picture(out);
                Ok(())
            }
            other => {
                debug!("HEVC: 忽略 NAL type={}, offset={}", other, nal.offset);
                Ok(())
            }
        };
        if let Err(err) = result {
            errors.push(err);
        }
    }

    /// 流结束, 输出最后一个图像
    pub fn flush(&mut self, out: &mut Vec<PictureInfo>) {
        self.finish_picture(out);
    }

    fn handle_vps(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        let vps = parse_vps(&mut nal.reader())?;
        let id = vps.vps_id;
        if self.vps.insert(id, vps, Bytes::copy_from_slice(nal.data())) == StoreOutcome::Replaced {
            debug!("HEVC: VPS id={} 被新内容替换", id);
        }
        Ok(())
    }

    fn handle_sps(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        let sps = parse_sps(&mut nal.reader())?;
        let id = sps.sps_id;
        debug!(
            "HEVC: SPS id={}, profile={}, level={:.1}, {}x{}",
            id,
            sps.ptl.profile_idc,
            sps.ptl.level(),
            sps.width,
            sps.height
        );
        if self.sps.insert(id, sps, Bytes::copy_from_slice(nal.data())) == StoreOutcome::Replaced {
            debug!("HEVC: SPS id={} 被新内容替换", id);
        }
        Ok(())
    }

    fn handle_pps(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        let pps = parse_pps(&mut nal.reader())?;
        let id = pps.pps_id;
        if self.pps.insert(id, pps, Bytes::copy_from_slice(nal.data())) == StoreOutcome::Replaced {
            debug!("HEVC: PPS id={} 被新内容替换", id);
        }
        Ok(())
    }

    fn handle_slice(
        &mut self,
        header: &NalHeader,
        nal: &NalUnit<'_>,
        out: &mut Vec<PictureInfo>,
        errors: &mut Vec<LiuError>,
    ) -> LiuResult<()> {
        let segment = parse_slice_segment_header(&mut nal.reader(), header, &self.sps, &self.pps)?;

        if !segment.first_slice_segment_in_pic {
            let Some(pending) = self.current.as_mut() else {
                return Err(LiuError::SliceSyntax(format!(
                    "HEVC slice: 缺少图像的首个条带段, address={}, offset={}",
                    segment.segment_address, nal.offset
                )));
            };
            if pending.pps_id != segment.pps_id {
                return Err(LiuError::SliceSyntax(format!(
                    "HEVC slice: 同一图像的条带段引用了不同的 PPS ({} != {}), offset={}",
                    segment.pps_id, pending.pps_id, nal.offset
                )));
            }
            pending.info.size += nal.size() as u64;
            if let Some(slice) = &segment.slice {
                pending.info.slice_count += 1;
                pending.info.slice_type = pending.info.slice_type.merge(slice.slice_type);
            }
            return Ok(());
        }

        self.finish_picture(out);
        self.start_picture(header, nal, &segment, errors)
    }

    fn start_picture(
        &mut self,
        header: &NalHeader,
        nal: &NalUnit<'_>,
        segment: &SliceSegmentHeader,
        errors: &mut Vec<LiuError>,
    ) -> LiuResult<()> {
        let Some(slice) = segment.slice.as_ref() else {
            return Err(LiuError::SliceSyntax(format!(
                "HEVC slice: 图像首个条带段不能是依赖条带段, offset={}",
                nal.offset
            )));
        };
        let sps = self.sps.require(segment.sps_id)?;
        let nal_type = header.nal_type;

        let no_rasl_output = nal_type.is_idr()
            || nal_type.is_bla()
            || (nal_type == NalUnitType::Cra && self.cra_starts_sequence);
        if nal_type.is_irap() {
            self.skip_rasl = no_rasl_output;
            self.cra_starts_sequence = false;
            self.seen_irap = true;
        }
        let poc = self.poc.decode(sps, header, slice.pic_order_cnt_lsb, no_rasl_output);

        let mut flags = PictureFlags::empty();
        if nal_type.is_irap() {
            flags |= PictureFlags::KEYFRAME | PictureFlags::IRAP;
        }
        if nal_type.is_idr() {
            flags |= PictureFlags::IDR;
        }
        if nal_type.is_rasl() || nal_type.is_radl() {
            flags |= PictureFlags::LEADING;
        }
        if !nal_type.is_sub_layer_non_reference() {
            flags |= PictureFlags::REFERENCE;
        }
        if std::mem::take(&mut self.recovery_point) {
            flags |= PictureFlags::KEYFRAME | PictureFlags::RECOVERY_POINT;
        }

        let mut ref_list0 = Vec::new();
        let mut ref_list1 = Vec::new();
        if nal_type.is_rasl() && self.skip_rasl {
            debug!("HEVC: RASL 图像 POC={} 的参考不可用, 跳过参考跟踪", poc);
        } else {
            let outcome = self
                .tracker
                .apply(sps, slice, poc, nal_type.is_irap() && no_rasl_output);
            if !outcome.missing.is_empty() {
                if self.seen_irap {
                    warn!(
                        "HEVC: 图像 POC={} offset={} 引用的参考图像缺失: {:?}",
                        poc, nal.offset, outcome.missing
                    );
                    flags |= PictureFlags::RESYNC;
                    errors.push(LiuError::ReferenceTrackingInconsistency(format!(
                        "HEVC: POC={} 的参考图像集引用了不存在的图像 {:?}",
                        poc, outcome.missing
                    )));
                } else {
                    debug!(
                        "HEVC: 首个 IRAP 之前的图像 POC={} 缺少参考 {:?}",
                        poc, outcome.missing
                    );
                }
            }
            if !outcome.out_of_range.is_empty() {
                warn!(
                    "HEVC: 图像 POC={} offset={} 的参考项 POC 越界: {:?}",
                    poc, nal.offset, outcome.out_of_range
                );
                flags |= PictureFlags::RESYNC;
                errors.push(LiuError::ReferenceTrackingInconsistency(format!(
                    "HEVC: POC={} 的参考图像集包含越界 POC {:?}",
                    poc, outcome.out_of_range
                )));
            }
            ref_list0 = outcome.ref_list0;
            ref_list1 = outcome.ref_list1;
        }

        let info = PictureInfo {
            index: 0,
            codec: Codec::H265,
            flags,
            slice_type: slice.slice_type,
            slice_count: 1,
            nal_type: nal_type.type_id(),
            poc,
            frame_num: None,
            temporal_id: header.temporal_id,
            sps_id: segment.sps_id,
            pps_id: segment.pps_id,
            vps_id: Some(sps.vps_id),
            offset: nal.offset,
            size: nal.size() as u64,
            reference_count: self.tracker.len() as u32,
            ref_list0,
            ref_list1,
        };
        self.current = Some(PendingPicture {
            pps_id: segment.pps_id,
            info,
        });
        Ok(())
    }

    fn finish_picture(&mut self, out: &mut Vec<PictureInfo>) {
        let Some(PendingPicture { info, .. }) = self.current.take() else {
            return;
        };
        debug!(
            "HEVC: 图像 type={}, nal={}, poc={}, tid={}, slices={}, flags={}, refs={}, L0={:?}, L1={:?}",
            info.slice_type,
            NalUnitType::from_type_id(info.nal_type),
            info.poc,
            info.temporal_id,
            info.slice_count,
            info.flags.names(),
            info.reference_count,
            info.ref_list0,
            info.ref_list1
        );
        out.push(info);
    }
}
