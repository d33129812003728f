//! 错误类型 (Error taxonomy)
//!
//! 启动阶段的错误 (`ModelLoad`, `Configuration`) 是致命的;
//! `Capture` 会结束当前视频流; `Inference` / `Preprocess` 只丢弃当前帧.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 模型文件或类别表缺失/损坏
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// 摄像头读帧失败
    #[error("frame capture failed: {0}")]
    Capture(String),

    /// 单帧推理失败
    #[error("inference failed: {0}")]
    Inference(String),

    /// 单帧预处理失败 (例如空帧)
    #[error("preprocess failed: {0}")]
    Preprocess(String),

    /// 非法配置参数
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// JPEG 编码失败
    #[error("jpeg encode failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// 是否只影响当前帧 (流水线可以继续处理下一帧)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Inference(_) | Self::Preprocess(_))
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
