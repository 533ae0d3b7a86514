//! 幾何ユーティリティ
//!
//! ボックス形式の変換（xywh → ltrb）、IoU計算、解像度間のスケーリング。
//! 座標はすべて画像ピクセル空間の `f64`。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 矩形ボックス (left, top, right, bottom)
///
/// `left <= right`, `top <= bottom` で、全座標が有限値であることを保証する。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BBox {
    /// 角座標からボックスを生成（不正な座標は拒否）
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Result<Self> {
        if ![left, top, right, bottom].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite box coordinates ({}, {}, {}, {})",
                left, top, right, bottom
            )));
        }
        if right < left || bottom < top {
            return Err(Error::InvalidInput(format!(
                "inverted box ({}, {}, {}, {})",
                left, top, right, bottom
            )));
        }
        Ok(Self { left, top, right, bottom })
    }

    /// 面積ゼロの原点ボックス（未回答センチネル用）
    pub const fn zero() -> Self {
        Self { left: 0.0, top: 0.0, right: 0.0, bottom: 0.0 }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_zero_area(&self) -> bool {
        self.area() == 0.0
    }

    /// 別解像度へスケーリング
    ///
    /// 各座標に比率を掛けて0方向へ切り捨てる。保存済みリファレンスとの互換のため
    /// 丸めは行わない。
    pub fn scale_truncated(&self, w_ratio: f64, h_ratio: f64) -> Self {
        Self {
            left: (self.left * w_ratio).trunc(),
            top: (self.top * h_ratio).trunc(),
            right: (self.right * w_ratio).trunc(),
            bottom: (self.bottom * h_ratio).trunc(),
        }
    }

    /// 整数ピクセル座標（描画用）
    pub fn to_pixels(&self) -> (i32, i32, i32, i32) {
        (
            self.left as i32,
            self.top as i32,
            self.right as i32,
            self.bottom as i32,
        )
    }
}

/// (x, y, width, height) を (left, top, right, bottom) へ変換
///
/// (x, y) は左上。幅・高さが負の場合は `InvalidInput`。
pub fn to_corners(x: f64, y: f64, width: f64, height: f64) -> Result<BBox> {
    if width < 0.0 || height < 0.0 {
        return Err(Error::InvalidInput(format!(
            "negative box size (w={}, h={})",
            width, height
        )));
    }
    BBox::new(x, y, x + width, y + height)
}

/// IoU (Intersection over Union)
///
/// union = area(a) + area(b) - intersection。union が0の場合は0。
/// 結果が [0, 1] を外れた場合はデータかアルゴリズムのバグなので `Error::Geometry`
/// を返す（クランプしない）。
pub fn iou(a: &BBox, b: &BBox) -> Result<f64> {
    let x1 = a.left.max(b.left);
    let y1 = a.top.max(b.top);
    let x2 = a.right.min(b.right);
    let y2 = a.bottom.min(b.bottom);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union <= 0.0 {
        return Ok(0.0);
    }

    let value = intersection / union;
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Geometry(format!(
            "iou {} out of range for {:?} / {:?}",
            value, a, b
        )));
    }
    Ok(value)
}
