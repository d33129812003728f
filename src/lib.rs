// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行与配置文件
pub mod detection; // 行人过滤与距离分析
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod ort_backend; // ONNX Runtime 推理后端
pub mod pipeline; // 单帧处理与视频流
pub mod preprocess; // 帧预处理
pub mod renderer; // 标注渲染
pub mod sink; // 显示输出 (截图等)

pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{
    extract_persons, find_close_pairs, ClassLabelTable, PersonDetection, ProximityPair,
    RawDetectionSet,
};
pub use crate::error::{PipelineError, Result};
pub use crate::input::{FrameSource, StillImageSource};
pub use crate::models::{Model, SsdDetector};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::pipeline::{
    AnalysisSettings, CancelToken, FrameAnalysis, FrameStream, PipelineContext,
    MULTIPART_CONTENT_TYPE,
};
pub use crate::preprocess::{prepare, PreparedTensor, RawFrame, TensorLayout};
pub use crate::renderer::{RenderSettings, Renderer};
