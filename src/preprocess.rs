//! 帧预处理 (Frame Preprocessor)
//!
//! 原始帧 (H×W×3, u8) → 固定尺寸的 4 维张量:
//! - resize 到模型输入尺寸 (不保持宽高比)
//! - NCHW 时把通道轴换到最前
//! - 增加 batch 维 (=1)
//!
//! 注意: 不做归一化/减均值, 张量里是原始像素值 (0~255).

use std::fmt;
use std::str::FromStr;

use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, Array4};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// 摄像头帧: H×W×3, 每通道 8 位
pub type RawFrame = RgbImage;

/// 张量轴顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorLayout {
    #[serde(rename = "NCHW")]
    Nchw,
    #[serde(rename = "NHWC")]
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NCHW" => Ok(Self::Nchw),
            "NHWC" => Ok(Self::Nhwc),
            other => Err(PipelineError::Configuration(format!(
                "unknown tensor layout '{}', expected NCHW or NHWC",
                other
            ))),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nchw => write!(f, "NCHW"),
            Self::Nhwc => write!(f, "NHWC"),
        }
    }
}

/// 送入模型的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// 预处理后的张量 (batch=1)
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTensor {
    data: Array4<f32>,
    layout: TensorLayout,
}

impl PreparedTensor {
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// 张量对应的空间尺寸 (W, H)
    pub fn spatial_size(&self) -> (u32, u32) {
        let shape = self.data.shape();
        match self.layout {
            TensorLayout::Nchw => (shape[3] as u32, shape[2] as u32),
            TensorLayout::Nhwc => (shape[2] as u32, shape[1] as u32),
        }
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// 预处理 (保持源通道顺序)
///
/// `target_size` 为 (W, H).
pub fn prepare(
    frame: &RawFrame,
    target_size: (u32, u32),
    target_layout: TensorLayout,
) -> Result<PreparedTensor> {
    prepare_ordered(frame, target_size, target_layout, ChannelOrder::Rgb)
}

/// 预处理, 并按 `order` 排列颜色通道
///
/// 帧本身是 RGB; `ChannelOrder::Bgr` 会交换 R/B (OpenCV 训练出来的模型期望 BGR 输入).
pub fn prepare_ordered(
    frame: &RawFrame,
    target_size: (u32, u32),
    target_layout: TensorLayout,
    order: ChannelOrder,
) -> Result<PreparedTensor> {
    let (tw, th) = target_size;
    if tw == 0 || th == 0 {
        return Err(PipelineError::Configuration(format!(
            "target size must be non-zero, got {}x{}",
            tw, th
        )));
    }
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return Err(PipelineError::Preprocess(format!("empty frame {}x{}", w, h)));
    }

    let resized = resize_rgb(frame, tw, th)?;
    let (tw, th) = (tw as usize, th as usize);

    // HWC 缓冲区中像素 (y, x) 的通道 c
    let channel = |c: usize| match order {
        ChannelOrder::Rgb => c,
        ChannelOrder::Bgr => 2 - c,
    };
    let at = |y: usize, x: usize, c: usize| resized[(y * tw + x) * 3 + channel(c)] as f32;

    let data = match target_layout {
        TensorLayout::Nchw => Array::from_shape_fn((1, 3, th, tw), |(_, c, y, x)| at(y, x, c)),
        TensorLayout::Nhwc => Array::from_shape_fn((1, th, tw, 3), |(_, y, x, c)| at(y, x, c)),
    };

    Ok(PreparedTensor {
        data,
        layout: target_layout,
    })
}

/// 双线性缩放到 tw×th, 返回紧凑的 RGB 缓冲区
fn resize_rgb(frame: &RawFrame, tw: u32, th: u32) -> Result<Vec<u8>> {
    let (w, h) = frame.dimensions();
    if (w, h) == (tw, th) {
        return Ok(frame.as_raw().clone());
    }

    let src_image = fr::images::Image::from_vec_u8(w, h, frame.as_raw().clone(), fr::PixelType::U8x3)
        .map_err(|e| PipelineError::Preprocess(format!("source buffer: {}", e)))?;
    let mut dst_image = fr::images::Image::new(tw, th, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| PipelineError::Preprocess(format!("resize: {}", e)))?;

    Ok(dst_image.buffer().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, px: [u8; 3]) -> RawFrame {
        RgbImage::from_pixel(w, h, Rgb(px))
    }

    #[test]
    fn test_nchw_shape_and_raw_values() {
        let frame = solid(640, 480, [10, 20, 30]);
        let t = prepare(&frame, (300, 300), TensorLayout::Nchw).unwrap();
        assert_eq!(t.data().shape(), &[1, 3, 300, 300]);
        assert_eq!(t.spatial_size(), (300, 300));
        // 无归一化
        assert_eq!(t.data()[[0, 0, 150, 150]], 10.0);
        assert_eq!(t.data()[[0, 1, 0, 299]], 20.0);
        assert_eq!(t.data()[[0, 2, 299, 0]], 30.0);
    }

    #[test]
    fn test_nhwc_no_transpose() {
        let frame = solid(64, 32, [1, 2, 3]);
        let t = prepare(&frame, (16, 8), TensorLayout::Nhwc).unwrap();
        assert_eq!(t.data().shape(), &[1, 8, 16, 3]);
        assert_eq!(t.spatial_size(), (16, 8));
        assert_eq!(t.data()[[0, 7, 15, 0]], 1.0);
        assert_eq!(t.data()[[0, 7, 15, 2]], 3.0);
    }

    #[test]
    fn test_non_square_target_is_exact() {
        let frame = solid(100, 50, [0, 0, 0]);
        let t = prepare(&frame, (320, 240), TensorLayout::Nchw).unwrap();
        assert_eq!(t.data().shape(), &[1, 3, 240, 320]);
    }

    #[test]
    fn test_channel_first_keeps_pixel_positions() {
        // 同尺寸时不缩放, 可以逐像素比对
        let mut frame = solid(4, 2, [0, 0, 0]);
        frame.put_pixel(3, 1, Rgb([200, 100, 50]));
        let t = prepare(&frame, (4, 2), TensorLayout::Nchw).unwrap();
        assert_eq!(t.data()[[0, 0, 1, 3]], 200.0);
        assert_eq!(t.data()[[0, 1, 1, 3]], 100.0);
        assert_eq!(t.data()[[0, 2, 1, 3]], 50.0);
        assert_eq!(t.data()[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_bgr_order_swaps_red_and_blue() {
        let frame = solid(8, 8, [10, 20, 30]);
        let t = prepare_ordered(&frame, (8, 8), TensorLayout::Nchw, ChannelOrder::Bgr).unwrap();
        assert_eq!(t.data()[[0, 0, 0, 0]], 30.0);
        assert_eq!(t.data()[[0, 1, 0, 0]], 20.0);
        assert_eq!(t.data()[[0, 2, 0, 0]], 10.0);
    }

    #[test]
    fn test_input_frame_untouched() {
        let frame = solid(32, 32, [5, 6, 7]);
        let before = frame.clone();
        let _ = prepare(&frame, (16, 16), TensorLayout::Nchw).unwrap();
        assert_eq!(frame, before);
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let frame = solid(8, 8, [0, 0, 0]);
        assert!(matches!(
            prepare(&frame, (0, 300), TensorLayout::Nchw),
            Err(PipelineError::Configuration(_))
        ));
        let empty = RgbImage::new(0, 0);
        assert!(matches!(
            prepare(&empty, (300, 300), TensorLayout::Nchw),
            Err(PipelineError::Preprocess(_))
        ));
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("nchw".parse::<TensorLayout>().unwrap(), TensorLayout::Nchw);
        assert_eq!("NHWC".parse::<TensorLayout>().unwrap(), TensorLayout::Nhwc);
        assert!("NCWH".parse::<TensorLayout>().is_err());
    }
}
