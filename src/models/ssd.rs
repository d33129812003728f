// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// SSD 检测模型 (DetectionOutput 输出)
// 输入: 原始像素张量 (不做归一化), 输出: [1, 1, N, 7]

use crate::detection::RawDetectionSet;
use crate::error::{PipelineError, Result};
use crate::models::Model;
use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
use crate::preprocess::{PreparedTensor, TensorLayout};

pub struct SsdDetector {
    engine: OrtBackend,
}

impl SsdDetector {
    pub fn new(config: OrtConfig) -> Result<Self> {
        let engine = OrtBackend::build(config)?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &OrtBackend {
        &self.engine
    }
}

impl Model for SsdDetector {
    fn input_size(&self) -> (u32, u32) {
        (self.engine.width(), self.engine.height())
    }

    fn input_layout(&self) -> TensorLayout {
        self.engine.layout()
    }

    fn infer(&mut self, xs: &PreparedTensor) -> Result<RawDetectionSet> {
        if xs.layout() != self.input_layout() || xs.spatial_size() != self.input_size() {
            return Err(PipelineError::Preprocess(format!(
                "tensor {:?} {} does not match model input {:?} {}",
                xs.spatial_size(),
                xs.layout(),
                self.input_size(),
                self.input_layout()
            )));
        }
        let ys = self.engine.run(xs.data())?;
        RawDetectionSet::from_array(ys)
    }

    fn summary(&self) {
        let (w, h) = self.input_size();
        println!(
            "\nSummary:\n\
             > Model: SSD DetectionOutput\n\
             > EP: {} {}\n\
             > Input: {} ({}x{}, {})\n\
             > Output: {}\n",
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            self.engine.input_name(),
            w,
            h,
            self.input_layout(),
            self.engine.output_name(),
        );
    }
}
