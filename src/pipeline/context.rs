//! 流水线上下文: 启动时加载一次, 之后以引用传给视频流

use std::time::Instant;

use crate::detection::{
    extract_label, find_close_pairs, ClassLabelTable, PersonDetection, ProximityPair,
    DEFAULT_DISTANCE_THRESHOLD, PERSON_LABEL,
};
use crate::error::{PipelineError, Result};
use crate::models::Model;
use crate::preprocess::{prepare_ordered, ChannelOrder, RawFrame};
use crate::renderer::Renderer;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub confidence_threshold: f32,
    pub person_label: String,
    pub distance_threshold: f64,
    pub channel_order: ChannelOrder,
    pub jpeg_quality: u8,
    /// 打印每个阶段的耗时
    pub profile: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            person_label: PERSON_LABEL.to_string(),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            channel_order: ChannelOrder::Bgr,
            jpeg_quality: 90,
            profile: false,
        }
    }
}

/// 单帧分析结果
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub persons: Vec<PersonDetection>,
    pub pairs: Vec<ProximityPair>,
    pub annotated: RawFrame,
    pub fps: u32,
}

impl FrameAnalysis {
    pub fn has_violations(&self) -> bool {
        !self.pairs.is_empty()
    }
}

pub struct PipelineContext {
    model: Box<dyn Model + Send>,
    classes: ClassLabelTable,
    settings: AnalysisSettings,
    renderer: Renderer,
}

impl PipelineContext {
    pub fn new(
        model: Box<dyn Model + Send>,
        classes: ClassLabelTable,
        settings: AnalysisSettings,
        renderer: Renderer,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&settings.confidence_threshold) {
            return Err(PipelineError::Configuration(format!(
                "confidence threshold {} outside [0, 1]",
                settings.confidence_threshold
            )));
        }
        if !settings.distance_threshold.is_finite() || settings.distance_threshold <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "distance threshold must be positive, got {}",
                settings.distance_threshold
            )));
        }
        if classes.id_of(&settings.person_label).is_none() {
            log::warn!(
                "⚠️ 类别表中没有 '{}', 不会检测到任何行人",
                settings.person_label
            );
        }
        Ok(Self {
            model,
            classes,
            settings,
            renderer,
        })
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// 预处理 → 推理 → 行人过滤 → 距离分析
    pub fn analyze(&mut self, frame: &RawFrame) -> Result<(Vec<PersonDetection>, Vec<ProximityPair>)> {
        let s = &self.settings;

        let t = Instant::now();
        let xs = prepare_ordered(
            frame,
            self.model.input_size(),
            self.model.input_layout(),
            s.channel_order,
        )?;
        let t_pre = t.elapsed();

        let t = Instant::now();
        let detections = self.model.infer(&xs)?;
        let t_inf = t.elapsed();

        let t = Instant::now();
        let persons = extract_label(
            &detections,
            &self.classes,
            &s.person_label,
            s.confidence_threshold,
            frame.width(),
            frame.height(),
        );
        let pairs = find_close_pairs(&persons, s.distance_threshold);
        let t_post = t.elapsed();

        if s.profile {
            log::info!(
                "[Preprocess]: {:?} [Model Inference]: {:?} [Postprocess]: {:?}",
                t_pre,
                t_inf,
                t_post
            );
        }
        log::debug!(
            "候选 {} | 行人 {} | 违规 {}",
            detections.len(),
            persons.len(),
            pairs.len()
        );
        Ok((persons, pairs))
    }

    /// 分析并渲染一帧
    pub fn process_frame(&mut self, frame: &RawFrame, fps: u32) -> Result<FrameAnalysis> {
        let (persons, pairs) = self.analyze(frame)?;

        let t = Instant::now();
        let annotated = self.renderer.render(frame, &persons, &pairs, fps);
        if self.settings.profile {
            log::info!("[Render]: {:?}", t.elapsed());
        }

        Ok(FrameAnalysis {
            persons,
            pairs,
            annotated,
            fps,
        })
    }
}
