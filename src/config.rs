//! 运行配置
//!
//! - `Args`: 命令行 (clap)
//! - `PipelineConfig`: JSON 配置文件, 不存在时写出默认值

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::ort_backend::{OrtConfig, OrtEP};
use crate::pipeline::AnalysisSettings;
use crate::preprocess::{ChannelOrder, TensorLayout};
use crate::renderer::RenderSettings;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "社交距离检测 (MJPEG 推流)", long_about = None)]
pub struct Args {
    /// ONNX 模型文件 (SSD DetectionOutput)
    #[arg(long, default_value = "models/ssd/model.onnx")]
    pub model: PathBuf,

    /// 类别表 JSON, 默认为模型同目录下的 classes.json
    #[arg(long)]
    pub classes: Option<PathBuf>,

    /// 配置文件, 不存在时创建
    #[arg(long, default_value = "social_distance.json")]
    pub config: PathBuf,

    /// 摄像头索引
    #[arg(long, default_value_t = 0)]
    pub camera: usize,

    /// 用图片文件或目录代替摄像头
    #[arg(long, num_args = 1..)]
    pub images: Vec<PathBuf>,

    /// HTTP 监听地址
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub addr: String,

    /// using CUDA EP
    #[arg(long)]
    pub cuda: bool,

    /// using TensorRT EP
    #[arg(long)]
    pub trt: bool,

    /// device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 覆盖置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// 覆盖距离阈值 (像素)
    #[arg(long)]
    pub distance: Option<f64>,

    /// 标签/FPS 字体 (TTF/OTF), 默认使用内置字体
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 违规截图保存目录
    #[arg(long)]
    pub snapshots: Option<PathBuf>,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    pub fn classes_path(&self) -> PathBuf {
        match &self.classes {
            Some(p) => p.clone(),
            None => self
                .model
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("classes.json"),
        }
    }

    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测/距离 ===
    pub confidence_threshold: f32, // 行人置信度阈值 (含等号)
    pub person_label: String,      // 类别表中的行人类别名
    pub distance_threshold: f64,   // 质心距离 < 阈值 即违规 (像素)

    // === 模型输入 ===
    pub input_width: Option<u32>,           // None: 从模型读取
    pub input_height: Option<u32>,          // None: 从模型读取
    pub input_layout: Option<TensorLayout>, // None: 从模型读取, 读不到用 NCHW
    pub channel_order: ChannelOrder,        // 送入模型的通道顺序
    pub output_name: Option<String>,        // None: 第一个输出
    pub intra_threads: usize,               // ORT 线程数

    // === 渲染 (RGB) ===
    pub box_color: [u8; 3],
    pub violation_color: [u8; 3],
    pub centroid_color: [u8; 3],
    pub label_text_color: [u8; 3],
    pub fps_color: [u8; 3],
    pub box_thickness: u32,
    pub line_thickness: u32,
    pub centroid_radius: u32,
    pub label_scale: f32,
    pub fps_scale: f32,
    pub fps_position: (i32, i32), // FPS 文字基线左端
    pub font_path: Option<PathBuf>,

    // === 输出/采集 ===
    pub jpeg_quality: u8,
    pub capture_timeout_ms: u64,
    pub camera_video_size: Option<String>, // 例如 "1280x720", None: 设备默认
    pub snapshot_interval_ms: u64,         // 两次违规截图的最小间隔
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let render = RenderSettings::default();
        let analysis = AnalysisSettings::default();
        Self {
            confidence_threshold: analysis.confidence_threshold,
            person_label: analysis.person_label,
            distance_threshold: analysis.distance_threshold,

            input_width: None,
            input_height: None,
            input_layout: None,
            channel_order: analysis.channel_order,
            output_name: None,
            intra_threads: 4,

            box_color: render.box_color,
            violation_color: render.violation_color,
            centroid_color: render.centroid_color,
            label_text_color: render.label_text_color,
            fps_color: render.fps_color,
            box_thickness: render.box_thickness,
            line_thickness: render.line_thickness,
            centroid_radius: render.centroid_radius,
            label_scale: render.label_scale,
            fps_scale: render.fps_scale,
            fps_position: render.fps_position,
            font_path: None,

            jpeg_quality: analysis.jpeg_quality,
            capture_timeout_ms: 5000,
            camera_video_size: None,
            snapshot_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载; 文件不存在时创建默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("📝 配置文件不存在, 创建默认配置: {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PipelineError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        log::info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        fs::write(path, json)?;
        log::debug!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数优先于配置文件
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(conf) = args.conf {
            self.confidence_threshold = conf;
        }
        if let Some(distance) = args.distance {
            self.distance_threshold = distance;
        }
        if let Some(font) = &args.font {
            self.font_path = Some(font.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::Configuration(msg));

        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return invalid(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            ));
        }
        if self.person_label.trim().is_empty() {
            return invalid("person_label is empty".to_string());
        }
        if self.input_width == Some(0) || self.input_height == Some(0) {
            return invalid("input size must be non-zero".to_string());
        }
        if self.intra_threads == 0 {
            return invalid("intra_threads must be at least 1".to_string());
        }
        for (name, v) in [
            ("box_thickness", self.box_thickness),
            ("line_thickness", self.line_thickness),
            ("centroid_radius", self.centroid_radius),
        ] {
            if v == 0 {
                return invalid(format!("{} must be positive", name));
            }
        }
        for (name, v) in [("label_scale", self.label_scale), ("fps_scale", self.fps_scale)] {
            if !v.is_finite() || v <= 0.0 {
                return invalid(format!("{} must be positive, got {}", name, v));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            ));
        }
        if self.capture_timeout_ms == 0 {
            return invalid("capture_timeout_ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            box_color: self.box_color,
            violation_color: self.violation_color,
            centroid_color: self.centroid_color,
            label_text_color: self.label_text_color,
            fps_color: self.fps_color,
            box_thickness: self.box_thickness,
            line_thickness: self.line_thickness,
            centroid_radius: self.centroid_radius,
            label: self.person_label.clone(),
            label_scale: self.label_scale,
            fps_scale: self.fps_scale,
            fps_position: self.fps_position,
        }
    }

    pub fn analysis_settings(&self, profile: bool) -> AnalysisSettings {
        AnalysisSettings {
            confidence_threshold: self.confidence_threshold,
            person_label: self.person_label.clone(),
            distance_threshold: self.distance_threshold,
            channel_order: self.channel_order,
            jpeg_quality: self.jpeg_quality,
            profile,
        }
    }

    pub fn ort_config(&self, model: &Path, ep: OrtEP) -> OrtConfig {
        OrtConfig {
            f: model.to_path_buf(),
            ep,
            image_size: (self.input_width, self.input_height),
            layout: self.input_layout,
            output_name: self.output_name.clone(),
            intra_threads: self.intra_threads,
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        println!("\n🎛️  当前配置:");
        println!("  行人类别: {}", self.person_label);
        println!("  置信度阈值: {:.2}", self.confidence_threshold);
        println!("  距离阈值: {:.1}px", self.distance_threshold);
        println!(
            "  模型输入: {}x{} {} {:?}",
            self.input_width
                .map_or_else(|| "auto".to_string(), |w| w.to_string()),
            self.input_height
                .map_or_else(|| "auto".to_string(), |h| h.to_string()),
            self.input_layout
                .map_or_else(|| "auto".to_string(), |l| l.to_string()),
            self.channel_order
        );
        println!("  JPEG质量: {}", self.jpeg_quality);
        println!(
            "  字体: {}\n",
            self.font_path
                .as_ref()
                .map_or_else(|| "内置 (DejaVu Sans)".to_string(), |p| p.display().to_string())
        );
    }
}
