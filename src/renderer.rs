//! 帧渲染器 (Frame renderer)
//!
//! 在原始帧的副本上绘制:
//! 1. 每个行人: 检测框 → 质心圆点 → 标签背景 + 标签文字 (框左下角)
//! 2. 每个违规对: 质心连线 + 两个框都重绘为警告色 (覆盖第 1 步的颜色)
//! 3. 左上角 FPS
//!
//! 文字默认使用内置的 DejaVu Sans (`assets/font`), `--font` 可以替换.

use std::path::Path;

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::detection::{PersonDetection, PixelBox, ProximityPair};
use crate::error::{PipelineError, Result};
use crate::preprocess::RawFrame;

/// 内置字体
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/font/DejaVuSans.ttf");

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    // ========== 颜色 (RGB) ==========
    pub box_color: [u8; 3],
    pub violation_color: [u8; 3],
    pub centroid_color: [u8; 3],
    pub label_text_color: [u8; 3],
    pub fps_color: [u8; 3],

    // ========== 线宽/尺寸 (像素) ==========
    pub box_thickness: u32,
    pub line_thickness: u32,
    pub centroid_radius: u32,

    // ========== 文字 ==========
    pub label: String,
    pub label_scale: f32,
    pub fps_scale: f32,
    /// FPS 文字基线左端
    pub fps_position: (i32, i32),
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            box_color: [0, 0, 255],
            violation_color: [255, 0, 0],
            centroid_color: [0, 255, 0],
            label_text_color: [255, 255, 255],
            fps_color: [0, 255, 100],
            box_thickness: 2,
            line_thickness: 4,
            centroid_radius: 5,
            label: "person".to_string(),
            label_scale: 24.0,
            fps_scale: 40.0,
            fps_position: (7, 70),
        }
    }
}

pub struct Renderer {
    settings: RenderSettings,
    font: Option<FontVec>,
}

impl Renderer {
    /// `font` 为 None 时使用内置字体
    pub fn new(settings: RenderSettings, font: Option<FontVec>) -> Self {
        let font = font.or_else(|| match default_font() {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("⚠️ {}, 不绘制文字", e);
                None
            }
        });
        Self { settings, font }
    }

    /// 不绘制任何文字, 只画框、质心和连线
    pub fn geometry_only(settings: RenderSettings) -> Self {
        Self {
            settings,
            font: None,
        }
    }

    /// 从文件加载 TrueType/OpenType 字体
    pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        FontVec::try_from_vec(data).map_err(|e| {
            PipelineError::Configuration(format!("invalid font {}: {}", path.display(), e))
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 渲染一帧, 输入帧保持不变
    pub fn render(
        &self,
        frame: &RawFrame,
        persons: &[PersonDetection],
        pairs: &[ProximityPair],
        fps: u32,
    ) -> RgbImage {
        let s = &self.settings;
        let mut canvas = frame.clone();

        for p in persons {
            draw_box(&mut canvas, &p.bbox, s.box_thickness, Rgb(s.box_color));
            let c = (p.centroid.x as f32, p.centroid.y as f32);
            if near_canvas(&canvas, c, s.centroid_radius as f32) {
                draw_filled_circle_mut(
                    &mut canvas,
                    (p.centroid.x, p.centroid.y),
                    s.centroid_radius as i32,
                    Rgb(s.centroid_color),
                );
            }
            self.draw_label(&mut canvas, &p.bbox);
        }

        // 违规着色必须在所有默认框之后
        for pair in pairs {
            let (Some(a), Some(b)) = (persons.get(pair.i), persons.get(pair.j)) else {
                continue;
            };
            draw_thick_line(
                &mut canvas,
                (a.centroid.x as f32, a.centroid.y as f32),
                (b.centroid.x as f32, b.centroid.y as f32),
                s.line_thickness,
                Rgb(s.violation_color),
            );
            draw_box(&mut canvas, &a.bbox, s.box_thickness, Rgb(s.violation_color));
            draw_box(&mut canvas, &b.bbox, s.box_thickness, Rgb(s.violation_color));
        }

        // FPS 的 (x, y) 是文字基线的左端
        if let Some(font) = &self.font {
            let text = fps.to_string();
            let scale = PxScale::from(s.fps_scale);
            let ascent = font.as_scaled(scale).ascent().round() as i32;
            let (x, baseline) = s.fps_position;
            draw_text_mut(
                &mut canvas,
                Rgb(s.fps_color),
                x,
                baseline - ascent,
                scale,
                font,
                &text,
            );
        }

        canvas
    }

    // 标签贴在框的左下角内侧, 背景用框的颜色
    fn draw_label(&self, canvas: &mut RgbImage, bbox: &PixelBox) {
        let Some(font) = &self.font else {
            return;
        };
        let s = &self.settings;
        let scale = PxScale::from(s.label_scale);
        let Some((tw, th, ink_top)) = ink_extent(font, scale, &s.label) else {
            return;
        };
        if !near_canvas(canvas, (bbox.x_min as f32, bbox.y_max as f32), (tw + th) as f32) {
            return;
        }
        let top = bbox.y_max - th as i32;
        draw_filled_rect_mut(
            canvas,
            Rect::at(bbox.x_min, top).of_size(tw, th),
            Rgb(s.box_color),
        );
        draw_text_mut(
            canvas,
            Rgb(s.label_text_color),
            bbox.x_min,
            top - ink_top,
            scale,
            font,
            &s.label,
        );
    }
}

/// 文字的 (宽, 墨迹高, 墨迹上沿相对绘制点 y 的偏移); 没有可见字形时为 None
fn ink_extent(font: &FontVec, scale: PxScale, text: &str) -> Option<(u32, u32, i32)> {
    let scaled = font.as_scaled(scale);
    let mut top = i32::MAX;
    let mut bottom = i32::MIN;
    for c in text.chars() {
        let glyph = scaled
            .glyph_id(c)
            .with_scale_and_position(scale, point(0.0, scaled.ascent()));
        if let Some(outlined) = scaled.outline_glyph(glyph) {
            let bb = outlined.px_bounds();
            let y0 = bb.min.y.round() as i32;
            top = top.min(y0);
            bottom = bottom.max(y0 + bb.height() as i32);
        }
    }
    let (tw, _) = text_size(scale, font, text);
    if tw == 0 || bottom <= top {
        return None;
    }
    Some((tw, (bottom - top) as u32, top))
}

/// 内置字体 (DejaVu Sans)
pub fn default_font() -> Result<FontVec> {
    FontVec::try_from_vec(DEFAULT_FONT.to_vec())
        .map_err(|e| PipelineError::Configuration(format!("invalid built-in font: {}", e)))
}

/// 点是否落在画布外扩 `margin` 的范围内
fn near_canvas(canvas: &RgbImage, (x, y): (f32, f32), margin: f32) -> bool {
    let (w, h) = canvas.dimensions();
    x >= -margin && y >= -margin && x <= w as f32 + margin && y <= h as f32 + margin
}

/// 空心框, 角点含端点; 线宽向外扩展
fn draw_box(canvas: &mut RgbImage, bbox: &PixelBox, thickness: u32, color: Rgb<u8>) {
    let t = thickness.max(1) as i32;
    // 画布外的边收到画布边缘之外, 避免巨大坐标溢出
    let (cw, ch) = canvas.dimensions();
    let pad = t + 1;
    let cx = |v: i32| v.clamp(-pad, cw as i32 + pad);
    let cy = |v: i32| v.clamp(-pad, ch as i32 + pad);
    let (x_min, y_min) = (cx(bbox.x_min), cy(bbox.y_min));
    let w = (cx(bbox.x_max) - x_min).max(0);
    let h = (cy(bbox.y_max) - y_min).max(0);

    let inner = (t - 1) / 2;
    for k in 0..t {
        let g = k - inner;
        let (rw, rh) = (w + 1 + 2 * g, h + 1 + 2 * g);
        if rw <= 0 || rh <= 0 {
            continue;
        }
        let rect = Rect::at(x_min - g, y_min - g).of_size(rw as u32, rh as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// 粗线: 沿法线方向铺多条平行线段
fn draw_thick_line(
    canvas: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    // 任一端点离画布超过线长 + 线宽时整条线都不可见
    let margin = len + thickness as f32;
    if !len.is_finite() || !near_canvas(canvas, start, margin) || !near_canvas(canvas, end, margin) {
        return;
    }
    if len == 0.0 {
        let r = (thickness / 2) as i32;
        draw_filled_circle_mut(canvas, (start.0 as i32, start.1 as i32), r, color);
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let half = (thickness.max(1) - 1) as f32 / 2.0;
    // 半像素步长避免斜线出现空隙
    let steps = (thickness.max(1) - 1) * 2;
    for k in 0..=steps {
        let off = k as f32 * 0.5 - half;
        draw_line_segment_mut(
            canvas,
            (start.0 + nx * off, start.1 + ny * off),
            (end.0 + nx * off, end.1 + ny * off),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Centroid;

    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn person(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> PersonDetection {
        let bbox = PixelBox {
            x_min,
            y_min,
            x_max,
            y_max,
        };
        PersonDetection {
            confidence: 0.9,
            bbox,
            centroid: Centroid::of(&bbox),
        }
    }

    fn renderer() -> Renderer {
        Renderer::geometry_only(RenderSettings::default())
    }

    #[test]
    fn test_draws_box_and_centroid() {
        let frame = RgbImage::new(100, 100);
        let p = person(10, 20, 50, 80);
        let out = renderer().render(&frame, &[p], &[], 0);

        // 四条边 (含端点)
        assert_eq!(*out.get_pixel(10, 50), BLUE);
        assert_eq!(*out.get_pixel(50, 50), BLUE);
        assert_eq!(*out.get_pixel(20, 80), BLUE);
        // 线宽 2: 向外一像素
        assert_eq!(*out.get_pixel(9, 50), BLUE);
        assert_eq!(*out.get_pixel(51, 50), BLUE);
        // 框内不填充
        assert_eq!(*out.get_pixel(30, 50), BLACK);
        // 质心在上沿中点, 画在框之后
        assert_eq!(*out.get_pixel(30, 20), GREEN);
        assert_eq!(*out.get_pixel(30, 24), GREEN);
    }

    #[test]
    fn test_input_frame_untouched() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([7, 7, 7]));
        let out = renderer().render(&frame, &[person(5, 5, 40, 40)], &[], 30);
        assert!(frame.pixels().all(|p| *p == Rgb([7, 7, 7])));
        assert_ne!(frame, out);
    }

    #[test]
    fn test_violation_recolors_both_boxes_and_draws_line() {
        let frame = RgbImage::new(200, 100);
        let a = person(10, 20, 50, 80);
        let b = person(110, 20, 150, 80);
        let c = person(160, 20, 190, 80);
        let pairs = [ProximityPair {
            i: 0,
            j: 1,
            distance: 100.0,
        }];
        let out = renderer().render(&frame, &[a, b, c], &pairs, 0);

        assert_eq!(*out.get_pixel(10, 50), RED);
        assert_eq!(*out.get_pixel(110, 50), RED);
        // 第三个人不在违规对中
        assert_eq!(*out.get_pixel(160, 50), BLUE);
        // 质心连线 (30,20) → (130,20)
        assert_eq!(*out.get_pixel(80, 20), RED);
        assert_eq!(*out.get_pixel(80, 21), RED);
        assert_eq!(*out.get_pixel(80, 19), RED);
        assert_eq!(*out.get_pixel(80, 30), BLACK);
    }

    #[test]
    fn test_out_of_range_pair_is_ignored() {
        let frame = RgbImage::new(50, 50);
        let pairs = [ProximityPair {
            i: 0,
            j: 5,
            distance: 1.0,
        }];
        let out = renderer().render(&frame, &[person(5, 5, 20, 20)], &pairs, 0);
        assert_eq!(*out.get_pixel(5, 10), BLUE);
    }

    #[test]
    fn test_boxes_outside_frame_are_clipped() {
        let frame = RgbImage::new(40, 40);
        let p = person(-30, -30, 100, 100);
        let out = renderer().render(&frame, &[p], &[], 0);
        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(*out.get_pixel(20, 20), BLACK);
    }

    #[test]
    fn test_geometry_only_draws_no_text() {
        let frame = RgbImage::new(120, 120);
        let r = renderer();
        assert!(!r.has_font());
        let out = r.render(&frame, &[], &[], 57);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_builtin_font_is_default() {
        assert!(default_font().is_ok());
        assert!(Renderer::new(RenderSettings::default(), None).has_font());
    }

    #[test]
    fn test_label_background_at_bottom_left() {
        let frame = RgbImage::new(200, 220);
        let p = person(20, 100, 150, 190);
        let out = Renderer::new(RenderSettings::default(), None).render(&frame, &[p], &[], 0);

        let font = default_font().unwrap();
        let (tw, th, _) = ink_extent(&font, PxScale::from(24.0), "person").unwrap();
        assert!(th < 40);
        let top = 190 - th;

        // 背景为框色, 文字为白色 (抗锯齿时介于两者之间), 不会是黑色
        let mut background = 0;
        let mut ink = 0;
        for y in top..190 {
            for x in 20..20 + tw {
                let px = *out.get_pixel(x, y);
                assert_ne!(px, BLACK, "unpainted pixel at ({}, {})", x, y);
                if px == BLUE {
                    background += 1;
                } else {
                    ink += 1;
                }
            }
        }
        assert!(background > 0);
        assert!(ink > 0);
        // 标签上方仍是框内部
        assert_eq!(*out.get_pixel(60, top - 3), BLACK);
        assert_eq!(*out.get_pixel(20 + tw + 3, 180), BLACK);
    }

    #[test]
    fn test_fps_painted_near_top_left() {
        let frame = RgbImage::new(200, 120);
        let out = Renderer::new(RenderSettings::default(), None).render(&frame, &[], &[], 30);

        let painted: Vec<(u32, u32)> = out
            .enumerate_pixels()
            .filter(|(_, _, px)| **px != BLACK)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!painted.is_empty());
        // 数字落在基线 (7, 70) 上
        assert!(painted.iter().all(|&(x, y)| x >= 5 && x < 100 && y < 72));
        assert!(painted.iter().any(|&(_, y)| y > 55));
        assert!(out
            .pixels()
            .any(|px| px[1] > 200 && px[0] < 60 && px[2] > 60 && px[2] < 140));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let frame = RgbImage::new(80, 80);
        let bbox = PixelBox {
            x_min: 10,
            y_min: i32::MAX,
            x_max: i32::MAX,
            y_max: i32::MAX,
        };
        let huge = PersonDetection {
            confidence: 0.9,
            bbox,
            centroid: Centroid::of(&bbox),
        };
        let pairs = [ProximityPair {
            i: 0,
            j: 1,
            distance: 0.0,
        }];
        let out = Renderer::new(RenderSettings::default(), None).render(
            &frame,
            &[huge, huge],
            &pairs,
            0,
        );
        assert_eq!(out.dimensions(), (80, 80));
    }

    #[test]
    fn test_coincident_centroids() {
        let frame = RgbImage::new(60, 60);
        let a = person(10, 10, 30, 30);
        let pairs = [ProximityPair {
            i: 0,
            j: 1,
            distance: 0.0,
        }];
        let out = renderer().render(&frame, &[a, a], &pairs, 0);
        assert_eq!(*out.get_pixel(10, 20), RED);
    }

    #[test]
    fn test_load_font_errors() {
        assert!(matches!(
            Renderer::load_font("/nonexistent/font.ttf"),
            Err(PipelineError::Io(_))
        ));
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();
        assert!(matches!(
            Renderer::load_font(file.path()),
            Err(PipelineError::Configuration(_))
        ));
    }
}
