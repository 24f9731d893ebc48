//! H.264 逐 NAL 分析器.
//!
//! 按解码顺序接收 NAL, 维护参数集存储、POC 状态与参考帧跟踪,
//! 在检测到图像边界时产出 [`PictureInfo`].

use bytes::Bytes;
use liu_core::{LiuError, LiuResult};
use log::{debug, warn};

use super::nal::{NalHeader, NalUnitType};
use super::poc::{PicOrderCount, PocState};
use super::pps::{Pps, parse_pps};
use super::reference::ReferenceTracker;
use super::slice::{SliceHeader, parse_slice_header};
use super::sps::{Sps, parse_sps};
use crate::codec::Codec;
use crate::nal::NalUnit;
use crate::param_set::{ParameterSetStore, StoreOutcome};
use crate::picture::{PictureFlags, PictureInfo};
use crate::sei::parse_sei;

/// 正在累积条带的图像
#[derive(Debug)]
struct PendingPicture {
    first: SliceHeader,
    sps: Sps,
    poc: PicOrderCount,
    info: PictureInfo,
}

/// H.264 码流分析器
#[derive(Debug)]
pub struct H264Parser {
    sps: ParameterSetStore<Sps>,
    pps: ParameterSetStore<Pps>,
    poc: PocState,
    tracker: ReferenceTracker,
    current: Option<PendingPicture>,
    /// 下一个图像前出现过恢复点 SEI
    recovery_point: bool,
}

impl Default for H264Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl H264Parser {
    /// 创建分析器
    pub fn new() -> Self {
        Self {
            sps: ParameterSetStore::new("SPS"),
            pps: ParameterSetStore::new("PPS"),
            poc: PocState::new(),
            tracker: ReferenceTracker::new(),
            current: None,
            recovery_point: false,
        }
    }

    /// SPS 存储
    pub fn sps_store(&self) -> &ParameterSetStore<Sps> {
        &self.sps
    }

    /// PPS 存储
    pub fn pps_store(&self) -> &ParameterSetStore<Pps> {
        &self.pps
    }

    /// 参考帧跟踪器
    pub fn tracker(&self) -> &ReferenceTracker {
        &self.tracker
    }

    /// 处理一个 NAL
    ///
    /// 完成的图像追加到 `out`; 该 NAL 或被它关闭的图像产生的错误追加到 `errors`.
    pub fn push_nal(
        &mut self,
        header: &NalHeader,
        nal: &NalUnit<'_>,
        out: &mut Vec<PictureInfo>,
        errors: &mut Vec<LiuError>,
    ) {
        match header.nal_type {
            NalUnitType::Sps => {
                self.finish_picture(out, errors);
                if let Err(err) = self.handle_sps(nal) {
                    errors.push(err);
                }
            }
            NalUnitType::Pps => {
                self.finish_picture(out, errors);
                if let Err(err) = self.handle_pps(nal) {
                    errors.push(err);
                }
            }
            NalUnitType::Sei => {
                self.finish_picture(out, errors);
                match parse_sei(nal.payload(), Codec::H264) {
                    Ok(messages) => {
                        if messages.iter().any(|m| m.recovery_point().is_some()) {
                            self.recovery_point = true;
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }
            NalUnitType::Slice | NalUnitType::SliceIdr | NalUnitType::SliceDpa => {
                if let Err(err) = self.handle_slice(header, nal, out, errors) {
                    errors.push(err);
                }
            }
            NalUnitType::SliceDpb | NalUnitType::SliceDpc => {
                // 分区 B/C 只计入所属图像的大小
                if let Some(pending) = self.current.as_mut() {
                    pending.info.size += nal.size() as u64;
                }
            }
            NalUnitType::EndOfSequence | NalUnitType::EndOfStream => {
                self.finish_picture(out, errors);
            }
            other if other.starts_access_unit() => self.finish_picture(out, errors),
            other => debug!("H.264: 忽略 NAL type={}, offset={}", other, nal.offset),
        }
    }

    /// 流结束, 输出最后一个图像
    pub fn flush(&mut self, out: &mut Vec<PictureInfo>, errors: &mut Vec<LiuError>) {
        self.finish_picture(out, errors);
    }

    fn handle_sps(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        let sps = parse_sps(&mut nal.reader())?;
        let id = sps.sps_id;
        debug!(
            "H.264: SPS id={}, profile={}, level={}, {}x{}",
            id, sps.profile_idc, sps.level_idc, sps.width, sps.height
        );
        if self.sps.insert(id, sps, Bytes::copy_from_slice(nal.data())) == StoreOutcome::Replaced {
            debug!("H.264: SPS id={} 被新内容替换", id);
        }
        Ok(())
    }

    fn handle_pps(&mut self, nal: &NalUnit<'_>) -> LiuResult<()> {
        let pps = parse_pps(&mut nal.reader(), &self.sps)?;
        let id = pps.pps_id;
        if self.pps.insert(id, pps, Bytes::copy_from_slice(nal.data())) == StoreOutcome::Replaced {
            debug!("H.264: PPS id={} 被新内容替换", id);
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
        let slice = parse_slice_header(&mut nal.reader(), header, &self.sps, &self.pps)?;
        if slice.redundant_pic_cnt > 0 {
            debug!(
                "H.264: 忽略冗余条带, redundant_pic_cnt={}, offset={}",
                slice.redundant_pic_cnt, nal.offset
            );
            return Ok(());
        }
        let sps = self.sps.require(slice.sps_id)?;

        let continues = self.current.as_ref().is_some_and(|pending| {
            slice.first_mb_in_slice != 0 && !slice.starts_new_picture(&pending.first, sps)
        });
        if let Some(pending) = self.current.as_mut().filter(|_| continues) {
            pending.info.slice_count += 1;
            pending.info.size += nal.size() as u64;
            pending.info.slice_type = pending.info.slice_type.merge(slice.slice_type);
            return Ok(());
        }

        let sps = sps.clone();
        self.finish_picture(out, errors);
        self.start_picture(header, nal, slice, sps);
        Ok(())
    }

    fn start_picture(&mut self, header: &NalHeader, nal: &NalUnit<'_>, slice: SliceHeader, sps: Sps) {
        let poc = self.poc.compute(&sps, &slice);

        let mut flags = PictureFlags::empty();
        if slice.is_idr() {
            flags |= PictureFlags::KEYFRAME | PictureFlags::IDR;
        }
        if slice.is_reference() {
            flags |= PictureFlags::REFERENCE;
        }
        if std::mem::take(&mut self.recovery_point) {
            flags |= PictureFlags::KEYFRAME | PictureFlags::RECOVERY_POINT;
        }

        let info = PictureInfo {
            index: 0,
            codec: Codec::H264,
            flags,
            slice_type: slice.slice_type,
            slice_count: 1,
            nal_type: header.nal_type.type_id(),
            poc: poc.poc(),
            frame_num: Some(slice.frame_num),
            temporal_id: 0,
            sps_id: slice.sps_id,
            pps_id: slice.pps_id,
            vps_id: None,
            offset: nal.offset,
            size: nal.size() as u64,
            reference_count: 0,
            ref_list0: Vec::new(),
            ref_list1: Vec::new(),
        };
        self.current = Some(PendingPicture {
            first: slice,
            sps,
            poc,
            info,
        });
    }

    /// 结束当前图像: 执行参考标记并输出
    fn finish_picture(&mut self, out: &mut Vec<PictureInfo>, errors: &mut Vec<LiuError>) {
        let Some(PendingPicture {
            first,
            sps,
            poc,
            mut info,
        }) = self.current.take()
        else {
            return;
        };

        match self.tracker.mark(&sps, &first, poc.poc()) {
            Ok(outcome) => {
                if outcome.long_term {
                    info.flags |= PictureFlags::LONG_TERM;
                }
            }
            Err(err) => {
                warn!(
                    "H.264: 图像 offset={} 参考标记失败, 等待 IDR 重新同步: {}",
                    info.offset, err
                );
                info.flags |= PictureFlags::RESYNC;
                errors.push(err);
            }
        }
        info.poc = self
            .poc
            .commit(&sps, &first, &poc, first.dec_ref_pic_marking.has_clear_all())
            .poc();
        info.reference_count = self.tracker.len() as u32;

        debug!(
            "H.264: 图像 type={}, frame_num={}, poc={}, slices={}, flags={}, refs={}",
            info.slice_type,
            first.frame_num,
            info.poc,
            info.slice_count,
            info.flags.names(),
            info.reference_count
        );
        out.push(info);
    }
}
