/// 视频输入系统 (Video Input System)
///
/// 流水线只通过 `FrameSource` 拉取帧:
/// - CameraSource: 本地摄像头 (ez-ffmpeg 独立解码线程, feature `camera`)
/// - StillImageSource: 循环播放静态图片
/// - yuv: YUV420P → RGB 转换
#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "camera")]
pub mod decode_filter;
pub mod still;
pub mod yuv;

#[cfg(feature = "camera")]
pub use camera::{list_devices, CameraSource};
pub use still::StillImageSource;

use crate::error::Result;
use crate::preprocess::RawFrame;

/// 帧来源
///
/// `close` 可以重复调用; 关闭后 `capture` 返回 `PipelineError::Capture`.
pub trait FrameSource {
    /// 阻塞直到拿到一帧
    fn capture(&mut self) -> Result<RawFrame>;

    /// 释放设备
    fn close(&mut self);

    fn name(&self) -> &str;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture(&mut self) -> Result<RawFrame> {
        (**self).capture()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
