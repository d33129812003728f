/// 视频处理流水线 (Video Processing Pipeline)
///
/// 单线程同步: 采集 → 预处理 → 推理 → 行人过滤 → 距离分析 → 渲染 → JPEG
/// - context: 启动时构建的模型/类别表/渲染器
/// - stream:  拉模式帧迭代器 + 取消
/// - fps:     瞬时帧率
/// - mjpeg:   multipart 分帧
pub mod context;
pub mod fps;
pub mod mjpeg;
pub mod stream;

pub use context::{AnalysisSettings, FrameAnalysis, PipelineContext};
pub use fps::FpsCounter;
pub use mjpeg::{encode_jpeg, multipart_chunk, split_chunk, MULTIPART_CONTENT_TYPE};
pub use stream::{CancelToken, FrameStream, StreamStats};
