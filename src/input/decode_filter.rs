/// FFmpeg 采集过滤器: 摄像头帧 (YUV420P) → RGB → 有界通道
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};

use super::yuv::{yuv420p_to_rgb, Yuv420pPlanes};
use crate::preprocess::RawFrame;

/// 通道中传递的采集结果; Err 只在解码线程启动失败时出现
pub type CaptureMessage = std::result::Result<RawFrame, String>;

pub struct CaptureFilter {
    tx: Sender<CaptureMessage>,
    // 通道满时丢弃最旧的一帧
    stale: Receiver<CaptureMessage>,
    stop: Arc<AtomicBool>,
    total_frames: usize,
    dropped_frames: usize,
    stale_frames: usize,
    last_report: Instant,
}

impl CaptureFilter {
    pub fn new(
        tx: Sender<CaptureMessage>,
        stale: Receiver<CaptureMessage>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tx,
            stale,
            stop,
            total_frames: 0,
            dropped_frames: 0,
            stale_frames: 0,
            last_report: Instant::now(),
        }
    }

    fn convert(&mut self, frame: &Frame) -> Option<RawFrame> {
        // SAFETY: 指针非空, FFmpeg 在 filter_frame 期间保证 AVFrame 有效;
        // 平面长度由 linesize × 行数给出
        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                return None;
            }
            let f = &*frame.as_ptr();
            let (w, h) = (f.width, f.height);
            if w <= 0 || h <= 0 || w > 8192 || h > 8192 {
                return None;
            }
            let (w, h) = (w as usize, h as usize);
            let strides = [f.linesize[0], f.linesize[1], f.linesize[2]];
            if strides.iter().any(|s| *s <= 0) || f.data[..3].iter().any(|p| p.is_null()) {
                return None;
            }
            let [ys, us, vs] = strides.map(|s| s as usize);
            let ch = h.div_ceil(2);
            let planes = Yuv420pPlanes {
                y: std::slice::from_raw_parts(f.data[0], ys * h),
                u: std::slice::from_raw_parts(f.data[1], us * ch),
                v: std::slice::from_raw_parts(f.data[2], vs * ch),
                y_stride: ys,
                u_stride: us,
                v_stride: vs,
            };
            let rgb = yuv420p_to_rgb(&planes, w, h)?;
            RawFrame::from_raw(w as u32, h as u32, rgb)
        }
    }
}

impl FrameFilter for CaptureFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("采集线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("capture stopped".to_string());
        }

        self.total_frames += 1;
        let Some(rgb) = self.convert(&frame) else {
            self.dropped_frames += 1;
            if self.dropped_frames <= 10 {
                log::warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧/格式异常", self.total_frames);
            }
            return Ok(None);
        };

        let mut msg = Ok(rgb);
        loop {
            match self.tx.try_send(msg) {
                Ok(()) => break,
                Err(TrySendError::Full(back)) => {
                    // 消费端跟不上: 扔掉最旧的一帧再试
                    let _ = self.stale.try_recv();
                    self.stale_frames += 1;
                    msg = back;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err("capture receiver dropped".to_string());
                }
            }
        }

        if self.last_report.elapsed().as_secs() >= 10 {
            log::debug!(
                "📺 采集统计: 总帧{} | 丢弃{} | 过期{}",
                self.total_frames,
                self.dropped_frames,
                self.stale_frames
            );
            self.last_report = Instant::now();
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!(
            "采集线程退出 (总帧{}, 丢弃{}, 过期{})",
            self.total_frames,
            self.dropped_frames,
            self.stale_frames
        );
    }
}
