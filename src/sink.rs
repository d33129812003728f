//! 显示输出 (Display sink)
//!
//! 流水线在每帧编码前把分析结果交给 sink. 默认什么都不做;
//! `SnapshotSink` 把出现违规的帧存成带时间戳的 JPEG.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::pipeline::{encode_jpeg, FrameAnalysis};

pub trait FrameSink {
    fn consume(&mut self, analysis: &FrameAnalysis) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl FrameSink for NoopSink {
    fn consume(&mut self, _analysis: &FrameAnalysis) -> Result<()> {
        Ok(())
    }
}

pub struct SnapshotSink {
    dir: PathBuf,
    min_interval: Duration,
    quality: u8,
    last_saved: Option<Instant>,
    saved: usize,
}

impl SnapshotSink {
    /// 目录不存在时自动创建
    pub fn new<P: AsRef<Path>>(dir: P, min_interval: Duration, quality: u8) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        log::info!("📸 违规截图目录: {}", dir.display());
        Ok(Self {
            dir,
            min_interval,
            quality,
            last_saved: None,
            saved: 0,
        })
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    fn due(&self, now: Instant) -> bool {
        self.last_saved
            .map(|t| now.saturating_duration_since(t) >= self.min_interval)
            .unwrap_or(true)
    }
}

impl FrameSink for SnapshotSink {
    fn consume(&mut self, analysis: &FrameAnalysis) -> Result<()> {
        let now = Instant::now();
        if !analysis.has_violations() || !self.due(now) {
            return Ok(());
        }

        let jpeg = encode_jpeg(&analysis.annotated, self.quality)?;
        // 同一毫秒内的重名用序号区分
        let path = self
            .dir
            .join(format!("{}_{:04}.jpg", gen_time_string("-"), self.saved));
        std::fs::write(&path, jpeg)?;

        self.last_saved = Some(now);
        self.saved += 1;
        log::info!(
            "📸 保存违规截图: {} ({} 对)",
            path.display(),
            analysis.pairs.len()
        );
        Ok(())
    }
}

/// 本地时间戳, 各字段之间用 `delimiter` 连接
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = ["%Y", "%m", "%d", "%H", "%M", "%S", "%3f"].join(delimiter);
    chrono::Local::now().format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Centroid, PersonDetection, PixelBox, ProximityPair};
    use image::RgbImage;

    fn analysis(violating: bool) -> FrameAnalysis {
        let bbox = PixelBox {
            x_min: 1,
            y_min: 1,
            x_max: 5,
            y_max: 5,
        };
        let p = PersonDetection {
            confidence: 0.9,
            bbox,
            centroid: Centroid::of(&bbox),
        };
        let pairs = if violating {
            vec![ProximityPair {
                i: 0,
                j: 1,
                distance: 0.0,
            }]
        } else {
            vec![]
        };
        FrameAnalysis {
            persons: vec![p, p],
            pairs,
            annotated: RgbImage::new(8, 8),
            fps: 0,
        }
    }

    fn jpg_count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .map(|x| x == "jpg")
                    .unwrap_or(false)
            })
            .count()
    }

    #[test]
    fn test_only_violating_frames_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotSink::new(dir.path(), Duration::ZERO, 80).unwrap();
        sink.consume(&analysis(false)).unwrap();
        assert_eq!(jpg_count(dir.path()), 0);
        sink.consume(&analysis(true)).unwrap();
        sink.consume(&analysis(true)).unwrap();
        assert_eq!(sink.saved(), 2);
        assert_eq!(jpg_count(dir.path()), 2);
    }

    #[test]
    fn test_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotSink::new(dir.path(), Duration::from_secs(3600), 80).unwrap();
        for _ in 0..5 {
            sink.consume(&analysis(true)).unwrap();
        }
        assert_eq!(sink.saved(), 1);
    }

    #[test]
    fn test_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        SnapshotSink::new(&nested, Duration::ZERO, 80).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_time_string_delimiter() {
        let s = gen_time_string("_");
        assert_eq!(s.split('_').count(), 7);
    }

    #[test]
    fn test_noop_sink() {
        assert!(NoopSink.consume(&analysis(true)).is_ok());
    }
}
