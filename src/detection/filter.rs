//! 行人过滤与几何提取 (Detection filter & geometry extractor)
//!
//! 按模型输出顺序遍历候选行:
//! 1. 类别名 ≠ 行人标签 → 丢弃 (未知类别ID同样丢弃)
//! 2. confidence < threshold → 丢弃 (阈值包含等号)
//! 3. 归一化坐标 × 帧宽/高, 向零截断为整数; 质心 = (水平中点, 上沿)

use super::labels::ClassLabelTable;
use super::types::{Centroid, PersonDetection, PixelBox, RawDetectionSet};

/// 默认行人类别名
pub const PERSON_LABEL: &str = "person";

/// 提取行人检测, 输出顺序与输入行顺序一致
pub fn extract_persons(
    detections: &RawDetectionSet,
    classes: &ClassLabelTable,
    threshold: f32,
    frame_w: u32,
    frame_h: u32,
) -> Vec<PersonDetection> {
    extract_label(detections, classes, PERSON_LABEL, threshold, frame_w, frame_h)
}

/// 同 [`extract_persons`], 但行人标签可配置
pub fn extract_label(
    detections: &RawDetectionSet,
    classes: &ClassLabelTable,
    label: &str,
    threshold: f32,
    frame_w: u32,
    frame_h: u32,
) -> Vec<PersonDetection> {
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let mut persons = Vec::new();

    for row in detections.rows() {
        if row.is_terminator() {
            break;
        }

        let name = row.class_index().and_then(|id| classes.name(id));
        if name != Some(label) {
            continue;
        }

        // NaN 置信度与低于阈值同样丢弃
        if row.confidence.is_nan() || row.confidence < threshold {
            log::trace!("丢弃低置信度检测: conf={:.3}", row.confidence);
            continue;
        }

        let bbox = PixelBox {
            x_min: (row.x_min * fw) as i32,
            y_min: (row.y_min * fh) as i32,
            x_max: (row.x_max * fw) as i32,
            y_max: (row.y_max * fh) as i32,
        };
        persons.push(PersonDetection {
            confidence: row.confidence,
            bbox,
            centroid: Centroid::of(&bbox),
        });
    }

    persons
}
