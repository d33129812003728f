/// 检测分析系统 (Detection analysis)
///
/// 模型原始输出 → 行人检测 → 距离分析
/// - labels:    类别表
/// - filter:    行人过滤与像素坐标换算
/// - proximity: 两两距离与违规判定
pub mod filter;
pub mod labels;
pub mod proximity;
pub mod types;

pub use filter::{extract_label, extract_persons, PERSON_LABEL};
pub use labels::ClassLabelTable;
pub use proximity::{find_close_pairs, violators};
pub use types::{
    Centroid, DetectionRow, PersonDetection, PixelBox, ProximityPair, RawDetectionSet,
    DEFAULT_DISTANCE_THRESHOLD,
};
