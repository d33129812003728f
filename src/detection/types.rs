/// 检测系统数据结构定义
/// Data structures for the detection → proximity pipeline
use ndarray::{Array2, ArrayD, Axis};

use crate::error::{PipelineError, Result};

// ========== 公共常量 ==========

/// DetectionOutput 每行的字段数: (image_id, class_id, conf, x_min, y_min, x_max, y_max)
pub const DETECTION_ROW_LEN: usize = 7;

/// 默认社交距离阈值 (像素)
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 250.0;

// ========== 原始检测输出 ==========

/// 模型原始输出中的一行 (坐标归一化到 [0,1])
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionRow {
    pub image_id: f32,
    pub class_id: f32,
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl DetectionRow {
    /// 类别ID (截断取整); 负数没有对应类别
    pub fn class_index(&self) -> Option<u32> {
        let id = self.class_id.trunc();
        if id.is_finite() && id >= 0.0 && id <= u32::MAX as f32 {
            Some(id as u32)
        } else {
            None
        }
    }

    /// image_id < 0 是 DetectionOutput 的结束标记
    pub fn is_terminator(&self) -> bool {
        self.image_id < 0.0
    }
}

impl From<[f32; DETECTION_ROW_LEN]> for DetectionRow {
    fn from(v: [f32; DETECTION_ROW_LEN]) -> Self {
        Self {
            image_id: v[0],
            class_id: v[1],
            confidence: v[2],
            x_min: v[3],
            y_min: v[4],
            x_max: v[5],
            y_max: v[6],
        }
    }
}

/// 一次推理的原始检测结果, 形状 [1, 1, N, 7]
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetectionSet {
    rows: Array2<f32>, // N × 7
}

impl RawDetectionSet {
    /// 从模型输出张量构造, 校验形状 [1, 1, N, 7]
    pub fn from_array(xs: ArrayD<f32>) -> Result<Self> {
        let shape = xs.shape().to_vec();
        let valid = shape.len() == 4
            && shape[0] == 1
            && shape[1] == 1
            && shape[3] == DETECTION_ROW_LEN;
        if !valid {
            return Err(PipelineError::Inference(format!(
                "unexpected detection output shape {:?}, expected [1, 1, N, {}]",
                shape, DETECTION_ROW_LEN
            )));
        }

        let rows = xs
            .index_axis_move(Axis(0), 0)
            .index_axis_move(Axis(0), 0)
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        Ok(Self { rows })
    }

    /// 直接从行数据构造 (测试/离线回放用)
    pub fn from_rows(rows: &[[f32; DETECTION_ROW_LEN]]) -> Self {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        // 长度恒为 N*7
        let rows = Array2::from_shape_vec((rows.len(), DETECTION_ROW_LEN), flat)
            .unwrap_or_else(|_| Array2::zeros((0, DETECTION_ROW_LEN)));
        Self { rows }
    }

    pub fn empty() -> Self {
        Self {
            rows: Array2::zeros((0, DETECTION_ROW_LEN)),
        }
    }

    /// 候选行数 N (包含结束标记之后的填充行)
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按模型输出顺序遍历
    pub fn rows(&self) -> impl Iterator<Item = DetectionRow> + '_ {
        self.rows.outer_iter().map(|r| DetectionRow {
            image_id: r[0],
            class_id: r[1],
            confidence: r[2],
            x_min: r[3],
            y_min: r[4],
            x_max: r[5],
            y_max: r[6],
        })
    }
}

// ========== 派生数据 ==========

/// 像素坐标检测框 (左上/右下, 含端点)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl PixelBox {
    pub fn width(&self) -> i32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> i32 {
        self.y_max.saturating_sub(self.y_min)
    }
}

/// 质心: 水平取中点, 垂直取框的上沿 (代表人头位置, 不是几何中心)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Centroid {
    pub x: i32,
    pub y: i32,
}

impl Centroid {
    pub fn of(bbox: &PixelBox) -> Self {
        Self {
            // i64 求和, 两个 i32 的平均值总在 i32 范围内
            x: ((i64::from(bbox.x_min) + i64::from(bbox.x_max)) / 2) as i32,
            y: bbox.y_min,
        }
    }

    /// 欧氏距离
    pub fn distance(&self, other: &Centroid) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// 一个被保留的行人检测
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonDetection {
    pub confidence: f32,
    pub bbox: PixelBox,
    pub centroid: Centroid,
}

/// 距离过近的一对行人 (i < j, 为 PersonDetection 列表下标)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityPair {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}
