//! 摄像头输入 - 按索引打开本地设备
//!
//! DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux).
//! 解码在独立线程中进行, 帧通过容量为 2 的有界通道交给流水线,
//! `capture` 最多等待 `timeout`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::decode_filter::{CaptureFilter, CaptureMessage};
use super::FrameSource;
use crate::error::{PipelineError, Result};
use crate::preprocess::RawFrame;

const CHANNEL_CAPACITY: usize = 2;

pub struct CameraSource {
    name: String,
    rx: Option<Receiver<CaptureMessage>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl CameraSource {
    /// 打开第 `index` 个摄像头
    pub fn open(index: usize, timeout: Duration, video_size: Option<String>) -> Result<Self> {
        let url = format_camera_url(index)?;
        let format = camera_format();
        log::info!("📷 打开摄像头 #{}: {} ({})", index, url, format);

        let (tx, rx) = bounded::<CaptureMessage>(CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = CaptureFilter::new(tx.clone(), rx.clone(), stop.clone());
        let name = format!("camera #{}", index);

        let worker = std::thread::Builder::new()
            .name(format!("camera-{}", index))
            .spawn(move || {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("capture", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let mut input = Input::new(url.as_str()).set_format(format);
                if let Some(size) = video_size.as_deref() {
                    input = input.set_input_opts([("video_size", size)].into());
                }

                let ctx = match FfmpegContext::builder()
                    .input(input)
                    .filter_desc("format=yuv420p")
                    .output(out)
                    .build()
                {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.try_send(Err(format!("cannot open {}: {}", url, e)));
                        return;
                    }
                };
                let sch = match ctx.start() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = tx.try_send(Err(format!("cannot start {}: {}", url, e)));
                        return;
                    }
                };
                drop(tx);
                let _ = sch.wait();
                log::info!("📹 摄像头解码结束: {}", url);
            })?;

        Ok(Self {
            name,
            rx: Some(rx),
            stop,
            worker: Some(worker),
            timeout,
        })
    }
}

impl FrameSource for CameraSource {
    fn capture(&mut self) -> Result<RawFrame> {
        let rx = self
            .rx
            .as_ref()
            .ok_or_else(|| PipelineError::Capture(format!("{} is closed", self.name)))?;
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(msg)) => Err(PipelineError::Capture(msg)),
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::Capture(format!(
                "{}: no frame within {:?}",
                self.name, self.timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::Capture(format!(
                "{}: decoder stopped",
                self.name
            ))),
        }
    }

    fn close(&mut self) {
        let Some(rx) = self.rx.take() else {
            return;
        };
        self.stop.store(true, Ordering::Relaxed);
        drop(rx);

        // 解码线程在下一帧到达时退出; 设备无帧时不无限等待
        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + self.timeout;
            while !worker.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            if worker.is_finished() {
                let _ = worker.join();
                log::info!("📷 摄像头已释放: {}", self.name);
            } else {
                log::warn!("⚠️ 摄像头线程未在 {:?} 内退出: {}", self.timeout, self.name);
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn camera_format() -> &'static str {
    #[cfg(target_os = "windows")]
    let format = "dshow";
    #[cfg(target_os = "macos")]
    let format = "avfoundation";
    #[cfg(target_os = "linux")]
    let format = "v4l2";
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    let format = "video4linux2";
    format
}

/// 设备索引 → FFmpeg 输入地址
fn format_camera_url(index: usize) -> Result<String> {
    #[cfg(target_os = "windows")]
    {
        let devices = list_devices();
        devices
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| format!("video={}", name))
            .ok_or_else(|| PipelineError::Capture(format!("no camera with index {}", index)))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(format!("/dev/video{}", index))
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        Ok(index.to_string())
    }
}

/// 可用的摄像头设备列表
pub fn list_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            log::warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
