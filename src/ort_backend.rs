// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 负责: 会话构建、执行提供者选择、输入形状推断、同步推理

use std::path::{Path, PathBuf};

use ndarray::{Array4, ArrayD};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{PipelineError, Result};
use crate::preprocess::TensorLayout;

/// 动态维度时的默认输入尺寸 (SSD 300×300)
pub const DEFAULT_INPUT_SIZE: u32 = 300;

/// 执行提供者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl std::fmt::Display for OrtEP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrtEP::CPU => write!(f, "CPU"),
            OrtEP::CUDA(id) => write!(f, "CUDA:{}", id),
            OrtEP::Trt(id) => write!(f, "TensorRT:{}", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    /// (width, height) 覆盖, None 表示从模型读取
    pub image_size: (Option<u32>, Option<u32>),
    pub layout: Option<TensorLayout>,
    pub output_name: Option<String>,
    pub intra_threads: usize,
}

impl Default for OrtConfig {
    fn default() -> Self {
        Self {
            f: PathBuf::new(),
            ep: OrtEP::CPU,
            image_size: (None, None),
            layout: None,
            output_name: None,
            intra_threads: 4,
        }
    }
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    output_name: String,
    width: u32,
    height: u32,
    layout: TensorLayout,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !config.f.is_file() {
            return Err(PipelineError::ModelLoad(format!(
                "model file not found: {}",
                config.f.display()
            )));
        }

        let path = config.f.as_path();
        let mut builder = Session::builder()
            .map_err(load_err(path))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err(path))?
            .with_intra_threads(config.intra_threads.max(1))
            .map_err(load_err(path))?;

        builder = match config.ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(id) => builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()])
                .map_err(load_err(path))?,
            OrtEP::Trt(id) => builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_device_id(id)
                        .build(),
                    CUDAExecutionProvider::default().with_device_id(id).build(),
                ])
                .map_err(load_err(path))?,
        };

        let session = builder.commit_from_file(path).map_err(load_err(path))?;

        // 输入: 名称 + 形状
        let input = session
            .inputs
            .first()
            .ok_or_else(|| PipelineError::ModelLoad("model has no inputs".to_string()))?;
        let input_name = input.name.clone();
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|s| s.to_vec())
            .unwrap_or_default();

        let (layout, width, height) =
            resolve_input_geometry(config.image_size, config.layout, &dims)?;

        // 输出: 默认取第一个
        let output_name = match config.output_name {
            Some(name) => {
                if !session.outputs.iter().any(|o| o.name == name) {
                    return Err(PipelineError::ModelLoad(format!(
                        "model has no output named '{}'",
                        name
                    )));
                }
                name
            }
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| PipelineError::ModelLoad("model has no outputs".to_string()))?,
        };

        log::info!(
            "模型已加载: {} [{}] 输入 {}={:?} → {}x{} {} 输出 {}",
            path.display(),
            config.ep,
            input_name,
            dims,
            width,
            height,
            layout,
            output_name
        );

        Ok(Self {
            session,
            ep: config.ep,
            input_name,
            output_name,
            width,
            height,
            layout,
        })
    }

    /// 同步推理, 返回输出张量的拷贝
    pub fn run(&mut self, xs: &Array4<f32>) -> Result<ArrayD<f32>> {
        let tensor = Tensor::from_array(xs.clone())
            .map_err(|e| PipelineError::Inference(format!("cannot create input tensor: {}", e)))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let ys = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Inference(format!("cannot read output: {}", e)))?;
        Ok(ys.to_owned())
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }
}

fn load_err<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> PipelineError + '_ {
    move |e| PipelineError::ModelLoad(format!("{}: {}", path.display(), e))
}

/// 从输入维度推断布局与尺寸: [1,3,H,W] → NCHW, [1,H,W,3] → NHWC.
/// 动态维度 (≤0) 记为 None.
pub fn infer_input_geometry(dims: &[i64]) -> (Option<TensorLayout>, Option<u32>, Option<u32>) {
    let fixed = |d: i64| (d > 0).then_some(d as u32);
    match dims {
        [_, 3, h, w] => (Some(TensorLayout::Nchw), fixed(*w), fixed(*h)),
        [_, h, w, 3] => (Some(TensorLayout::Nhwc), fixed(*w), fixed(*h)),
        _ => (None, None, None),
    }
}

/// 配置与模型输入维度合并: 配置只能填补动态维度, 与固定维度或推断布局矛盾时报错.
/// 都未知时使用 NCHW + `DEFAULT_INPUT_SIZE`.
pub fn resolve_input_geometry(
    image_size: (Option<u32>, Option<u32>),
    layout: Option<TensorLayout>,
    dims: &[i64],
) -> Result<(TensorLayout, u32, u32)> {
    let (inferred_layout, inferred_w, inferred_h) = infer_input_geometry(dims);

    let layout = match (layout, inferred_layout) {
        (Some(wanted), Some(actual)) if wanted != actual => {
            return Err(PipelineError::Configuration(format!(
                "input_layout {:?} contradicts model input {:?} ({:?})",
                wanted, dims, actual
            )));
        }
        (wanted, actual) => wanted.or(actual).unwrap_or(TensorLayout::Nchw),
    };

    let side = |name: &str, wanted: Option<u32>, fixed: Option<u32>| -> Result<u32> {
        match (wanted, fixed) {
            (Some(0), _) => Err(PipelineError::Configuration(format!(
                "{} must be positive",
                name
            ))),
            (Some(w), Some(f)) if w != f => Err(PipelineError::Configuration(format!(
                "{} {} contradicts fixed model input {:?}",
                name, w, dims
            ))),
            (wanted, fixed) => Ok(wanted.or(fixed).unwrap_or(DEFAULT_INPUT_SIZE)),
        }
    };
    let width = side("input_width", image_size.0, inferred_w)?;
    let height = side("input_height", image_size.1, inferred_h)?;
    Ok((layout, width, height))
}
