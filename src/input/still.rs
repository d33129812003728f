//! 静态图片输入 - 循环播放一组图片, 用于无摄像头演示与测试

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::FrameSource;
use crate::error::{PipelineError, Result};
use crate::preprocess::RawFrame;

pub struct StillImageSource {
    name: String,
    frames: Vec<RawFrame>,
    cursor: usize,
    interval: Option<Duration>,
    closed: bool,
}

impl StillImageSource {
    /// 一次性加载所有图片; 任何一张无法读取都视为采集失败
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut frames = Vec::with_capacity(paths.len());
        for p in paths {
            let p = p.as_ref();
            let img = image::open(p).map_err(|e| {
                PipelineError::Capture(format!("cannot read image {}: {}", p.display(), e))
            })?;
            frames.push(img.to_rgb8());
        }
        let name = match paths.first() {
            Some(p) if paths.len() == 1 => p.as_ref().display().to_string(),
            _ => format!("{} images", paths.len()),
        };
        Self::build(name, frames)
    }

    /// 目录下所有 jpg/jpeg/png (按文件名排序)
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PipelineError::Capture(format!("cannot read directory {}: {}", dir.display(), e))
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        let mut source = Self::from_paths(&paths)?;
        source.name = dir.display().to_string();
        Ok(source)
    }

    pub fn from_frames(frames: Vec<RawFrame>) -> Result<Self> {
        let name = format!("{} frames", frames.len());
        Self::build(name, frames)
    }

    fn build(name: String, frames: Vec<RawFrame>) -> Result<Self> {
        if frames.is_empty() {
            return Err(PipelineError::Capture("no images to play".to_string()));
        }
        if let Some(f) = frames.iter().find(|f| f.width() == 0 || f.height() == 0) {
            return Err(PipelineError::Capture(format!(
                "empty image {}x{}",
                f.width(),
                f.height()
            )));
        }
        Ok(Self {
            name,
            frames,
            cursor: 0,
            interval: None,
            closed: false,
        })
    }

    /// 每次采集前休眠, 模拟摄像头帧率
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSource for StillImageSource {
    fn capture(&mut self) -> Result<RawFrame> {
        if self.closed {
            return Err(PipelineError::Capture(format!("{} is closed", self.name)));
        }
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            log::info!("输入源已关闭: {}", self.name);
            self.closed = true;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(v: u8) -> RawFrame {
        RawFrame::from_pixel(4, 3, Rgb([v, v, v]))
    }

    #[test]
    fn test_cycles_forever() {
        let mut src = StillImageSource::from_frames(vec![solid(1), solid(2)]).unwrap();
        let seen: Vec<u8> = (0..5)
            .map(|_| src.capture().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(seen, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_empty_list_is_capture_error() {
        assert!(matches!(
            StillImageSource::from_frames(vec![]),
            Err(PipelineError::Capture(_))
        ));
        let none: [&str; 0] = [];
        assert!(StillImageSource::from_paths(&none).is_err());
    }

    #[test]
    fn test_unreadable_file_is_capture_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"garbage").unwrap();
        assert!(matches!(
            StillImageSource::from_paths(&[file.path()]),
            Err(PipelineError::Capture(_))
        ));
    }

    #[test]
    fn test_loads_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        solid(9).save(dir.path().join("b.png")).unwrap();
        solid(3).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let mut src = StillImageSource::from_dir(dir.path()).unwrap();
        assert_eq!(src.len(), 2);
        assert_eq!(src.capture().unwrap().get_pixel(0, 0)[0], 3);
        assert_eq!(src.capture().unwrap().get_pixel(0, 0)[0], 9);
    }

    #[test]
    fn test_capture_after_close_fails() {
        let mut src = StillImageSource::from_frames(vec![solid(1)]).unwrap();
        src.close();
        src.close();
        assert!(src.is_closed());
        assert!(matches!(src.capture(), Err(PipelineError::Capture(_))));
    }
}
