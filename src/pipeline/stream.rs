//! 视频流 (Streaming loop)
//!
//! 拉模式迭代器: 每次 `next()` 采集一帧 → 分析 → 渲染 → JPEG → multipart 分帧.
//! - 采集失败: 产出一次 `Err(Capture)`, 之后永远返回 `None`
//! - 推理/预处理失败: 跳过该帧, 继续下一次采集
//! - 取消或关闭: 输入源只关闭一次

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::context::PipelineContext;
use super::fps::FpsCounter;
use super::mjpeg::{encode_jpeg, multipart_chunk};
use crate::error::Result;
use crate::input::FrameSource;
use crate::sink::{FrameSink, NoopSink};

/// 跨线程取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// 成功产出的帧
    pub frames: u64,
    /// 因推理/预处理失败跳过的帧
    pub skipped: u64,
    /// 累计违规对数
    pub violations: u64,
}

pub struct FrameStream<'a, S: FrameSource> {
    ctx: &'a mut PipelineContext,
    source: S,
    sink: Box<dyn FrameSink + 'a>,
    cancel: CancelToken,
    fps: FpsCounter,
    stats: StreamStats,
    fused: bool,
    closed: bool,
}

impl<'a, S: FrameSource> FrameStream<'a, S> {
    pub fn new(ctx: &'a mut PipelineContext, source: S, cancel: CancelToken) -> Self {
        log::info!("▶️ 视频流开始: {}", source.name());
        Self {
            ctx,
            source,
            sink: Box::new(NoopSink),
            cancel,
            fps: FpsCounter::new(),
            stats: StreamStats::default(),
            fused: false,
            closed: false,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink + 'a>) -> Self {
        self.sink = sink;
        self
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 释放输入源; 重复调用无效果
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.fused = true;
        self.source.close();
        log::info!(
            "⏹️ 视频流结束: {} (输出 {} 帧, 跳过 {} 帧, 违规 {} 次)",
            self.source.name(),
            self.stats.frames,
            self.stats.skipped,
            self.stats.violations
        );
    }

    fn produce(&mut self) -> Result<Vec<u8>> {
        let frame = self.source.capture()?;
        let fps = self.fps.tick();

        let analysis = self.ctx.process_frame(&frame, fps)?;
        if let Err(e) = self.sink.consume(&analysis) {
            log::warn!("⚠️ 显示输出失败: {}", e);
        }

        let t = Instant::now();
        let jpeg = encode_jpeg(&analysis.annotated, self.ctx.settings().jpeg_quality)?;
        if self.ctx.settings().profile {
            log::info!("[Encode]: {:?}", t.elapsed());
        }

        self.stats.frames += 1;
        self.stats.violations += analysis.pairs.len() as u64;
        Ok(multipart_chunk(&jpeg))
    }
}

impl<S: FrameSource> Iterator for FrameStream<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.fused {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.close();
                return None;
            }
            match self.produce() {
                Ok(chunk) => return Some(Ok(chunk)),
                Err(e) if e.is_recoverable() => {
                    self.stats.skipped += 1;
                    log::warn!("⚠️ 跳过一帧: {}", e);
                }
                Err(e) => {
                    log::error!("❌ 视频流中止: {}", e);
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: FrameSource> Drop for FrameStream<'_, S> {
    fn drop(&mut self) {
        self.close();
    }
}
