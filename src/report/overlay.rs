//! 確認用画像の描画
//!
//! 照合結果のボックスと「ラベル 信頼度」をページ画像に重ねる。
//! フォントがない場合は枠だけ描く。

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use omr_grader_common::{Assignment, BBox};
use std::path::Path;
use tracing::{debug, info};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// 描画設定
pub struct OverlayStyle {
    /// ラベル描画フォント（None ならテキストは省略）
    pub font: Option<FontVec>,
    pub font_scale: f32,
    pub thickness: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 32.0,
            thickness: 3,
        }
    }
}

impl OverlayStyle {
    pub fn with_font_path(font_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| format!("Failed to parse font file: {}", font_path.display()))?;

        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// よくある場所からシステムフォントを探す
    pub fn with_system_font() -> Self {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];

        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(font_data) {
                    info!("Loaded system font: {}", path);
                    return Self {
                        font: Some(font),
                        ..Self::default()
                    };
                }
            }
        }

        debug!("No system font found, labels will be skipped");
        Self::default()
    }
}

/// 1ページ分の照合結果を描画した画像を返す
///
/// 問題マーカーは `q{番号}`、解答は検出ラベルで表示する。未回答（面積ゼロ）の
/// ボックスは描かない。
pub fn render_overlay(page: &RgbImage, assignments: &[Assignment], style: &OverlayStyle) -> RgbImage {
    let mut img = page.clone();

    for assignment in assignments {
        if let Some(marker) = assignment.question_marker {
            let text = format!("q{}   {:.4}", assignment.question_id, marker.confidence);
            draw_labelled_box(&mut img, &marker.bbox, &text, style);
        }
        if !assignment.is_unanswered() {
            let text = format!("{}   {:.4}", assignment.label, assignment.confidence);
            draw_labelled_box(&mut img, &assignment.bbox, &text, style);
        }
    }

    img
}

fn draw_labelled_box(img: &mut RgbImage, bbox: &BBox, text: &str, style: &OverlayStyle) {
    if bbox.is_zero_area() {
        return;
    }
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);
    if img_w == 0 || img_h == 0 {
        return;
    }
    // 画像外の座標は画像内へ収めてから描く
    let (left, top, right, bottom) = bbox.to_pixels();
    let left = left.clamp(0, img_w - 1);
    let top = top.clamp(0, img_h - 1);
    let right = right.clamp(0, img_w - 1);
    let bottom = bottom.clamp(0, img_h - 1);

    for t in 0..style.thickness {
        let x = left.saturating_sub(t).max(0);
        let y = top.saturating_sub(t).max(0);
        let w = right.saturating_add(t).min(img_w - 1) - x + 1;
        let h = bottom.saturating_add(t).min(img_h - 1) - y + 1;
        if w <= 0 || h <= 0 {
            continue;
        }
        draw_hollow_rect_mut(img, Rect::at(x, y).of_size(w as u32, h as u32), BOX_COLOR);
    }

    if let Some(ref font) = style.font {
        let scale = PxScale::from(style.font_scale);
        let text_y = top
            .saturating_sub(10)
            .saturating_sub(style.font_scale as i32)
            .max(0);
        draw_text_mut(img, BOX_COLOR, left, text_y, scale, font, text);
    }
}
