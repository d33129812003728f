/// 检测模型统一接口
///
/// ## Model Trait
/// 流水线只依赖这个 trait: 预处理好的张量 → 原始检测输出 `[1,1,N,7]`.
///
/// ```text
/// PreparedTensor ──infer──▶ RawDetectionSet
/// ```
///
/// 具体实现:
/// - **SsdDetector**: ONNX Runtime 上的 SSD (DetectionOutput) 模型, 文件 `ssd.rs`
///
/// 测试中可以用任意返回固定输出的 mock 实现替代.
use crate::detection::RawDetectionSet;
use crate::error::Result;
use crate::preprocess::{PreparedTensor, TensorLayout};

pub trait Model {
    /// 模型期望的输入尺寸 (width, height)
    fn input_size(&self) -> (u32, u32);

    /// 模型期望的输入布局
    fn input_layout(&self) -> TensorLayout;

    /// 同步推理
    ///
    /// 单次推理失败返回 `PipelineError::Inference`, 由流水线跳过该帧.
    fn infer(&mut self, xs: &PreparedTensor) -> Result<RawDetectionSet>;

    /// 打印模型信息
    fn summary(&self);
}

pub mod ssd;

pub use ssd::SsdDetector;
