//! リファレンスアノテーションストア
//!
//! 事前のラベリングで作成したCOCO形式のアノテーションから、試験ごとの
//! ページ情報と問題/解答領域を引く。読み取り専用。

use crate::error::{Error, Result};
use crate::geometry::{to_corners, BBox};
use crate::types::{PageRecord, ReferencePage, ReferenceRegion, RegionKind};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// COCO形式の images エントリ
#[derive(Debug, Clone, Deserialize)]
struct CocoImage {
    id: u64,
    file_name: String,
    width: u32,
    height: u32,
}

/// COCO形式の annotations エントリ
#[derive(Debug, Clone, Deserialize)]
struct CocoAnnotation {
    image_id: u64,
    category_id: u32,
    bbox: [f64; 4],
}

#[derive(Debug, Clone, Deserialize)]
struct CocoFile {
    images: Vec<CocoImage>,
    #[serde(default)]
    annotations: Vec<CocoAnnotation>,
}

/// アノテーションストア全体
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    pages: Vec<ReferencePage>,
}

impl ReferenceStore {
    /// JSONファイルから読み込み
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let coco: CocoFile = serde_json::from_str(json)?;

        let mut regions_by_image: HashMap<u64, Vec<ReferenceRegion>> = HashMap::new();
        for ann in &coco.annotations {
            let [x, y, w, h] = ann.bbox;
            let bbox = to_corners(x, y, w, h)?;
            regions_by_image
                .entry(ann.image_id)
                .or_default()
                .push(ReferenceRegion::new(bbox, ann.category_id));
        }

        let pages = coco
            .images
            .into_iter()
            .map(|img| {
                let regions = regions_by_image.remove(&img.id).unwrap_or_default();
                ReferencePage {
                    record: PageRecord {
                        id: img.id,
                        file_name: img.file_name,
                        width: img.width,
                        height: img.height,
                    },
                    regions,
                }
            })
            .collect();

        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 試験IDに該当するページ一覧（ファイル名順）
    ///
    /// ファイル名に `exam_id` を部分文字列として含むページを返す。該当なしは空。
    pub fn regions_for_exam(&self, exam_id: &str) -> Vec<&ReferencePage> {
        let mut pages: Vec<&ReferencePage> = self
            .pages
            .iter()
            .filter(|p| p.record.file_name.contains(exam_id))
            .collect();
        pages.sort_by(|a, b| a.record.file_name.cmp(&b.record.file_name));
        pages
    }

    /// 試験IDに該当するページ一覧（該当なしは `NotFound`）
    pub fn require_exam(&self, exam_id: &str) -> Result<Vec<&ReferencePage>> {
        let pages = self.regions_for_exam(exam_id);
        if pages.is_empty() {
            return Err(Error::NotFound(format!("exam '{}'", exam_id)));
        }
        Ok(pages)
    }

    /// ストアに含まれる試験IDの一覧
    ///
    /// ファイル名 `2021_f_a_p1.jpg` の `_p` より前を試験IDとみなす。
    pub fn exam_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .pages
            .iter()
            .map(|p| exam_prefix(&p.record.file_name).to_string())
            .collect();
        ids.into_iter().collect()
    }
}

fn exam_prefix(file_name: &str) -> &str {
    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
    stem.rfind("_p").map(|i| &stem[..i]).unwrap_or(stem)
}

impl ReferencePage {
    /// 実行時の画像サイズへの倍率 (幅比, 高さ比)
    pub fn scale_ratio(&self, width: u32, height: u32) -> Result<(f64, f64)> {
        if self.record.width == 0 || self.record.height == 0 {
            return Err(Error::InvalidInput(format!(
                "reference page '{}' has zero size",
                self.record.file_name
            )));
        }
        Ok((
            width as f64 / self.record.width as f64,
            height as f64 / self.record.height as f64,
        ))
    }

    pub fn questions(&self) -> impl Iterator<Item = &ReferenceRegion> {
        self.regions
            .iter()
            .filter(|r| matches!(r.kind, RegionKind::Question(_)))
    }

    pub fn answers(&self) -> impl Iterator<Item = &ReferenceRegion> {
        self.regions
            .iter()
            .filter(|r| matches!(r.kind, RegionKind::Answer(_)))
    }

    /// 問題領域を実行時の画像サイズにスケーリングして返す
    ///
    /// 切り捨てスケール（丸めなし）。
    pub fn question_regions(&self, width: u32, height: u32) -> Result<BTreeMap<u32, BBox>> {
        let (w_ratio, h_ratio) = self.scale_ratio(width, height)?;
        Ok(self
            .questions()
            .filter_map(|r| {
                r.question_id()
                    .map(|q| (q, r.bbox.scale_truncated(w_ratio, h_ratio)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "images": [
            {"id": 2, "file_name": "2021_f_a_p2.jpg", "width": 1000, "height": 2000},
            {"id": 1, "file_name": "2021_f_a_p1.jpg", "width": 1000, "height": 2000},
            {"id": 3, "file_name": "2020_9_b_p1.jpg", "width": 1000, "height": 2000}
        ],
        "annotations": [
            {"id": 10, "image_id": 1, "category_id": 7, "bbox": [100, 100, 300, 50]},
            {"id": 11, "image_id": 1, "category_id": 3, "bbox": [150, 110, 40, 30]},
            {"id": 12, "image_id": 2, "category_id": 8, "bbox": [33, 47, 10, 10]}
        ]
    }"#;

    #[test]
    fn test_regions_for_exam_sorted_by_file_name() {
        let store = ReferenceStore::from_json(SAMPLE).unwrap();
        let pages = store.regions_for_exam("2021_f_a");
        let names: Vec<&str> = pages.iter().map(|p| p.record.file_name.as_str()).collect();
        assert_eq!(names, vec!["2021_f_a_p1.jpg", "2021_f_a_p2.jpg"]);
        assert_eq!(pages[0].regions.len(), 2);
    }

    #[test]
    fn test_unknown_exam_is_empty_not_error() {
        let store = ReferenceStore::from_json(SAMPLE).unwrap();
        assert!(store.regions_for_exam("2013_6_a").is_empty());
        assert!(matches!(store.require_exam("2013_6_a"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_question_regions_scaled_with_truncation() {
        let store = ReferenceStore::from_json(SAMPLE).unwrap();
        let pages = store.regions_for_exam("2021_f_a_p2");
        // 1000x2000 → 500x3000 : 幅0.5, 高さ1.5
        let regions = pages[0].question_regions(500, 3000).unwrap();
        let q2 = regions[&2];
        assert_eq!((q2.left, q2.top, q2.right, q2.bottom), (16.0, 70.0, 21.0, 85.0));
    }

    #[test]
    fn test_question_regions_excludes_answers() {
        let store = ReferenceStore::from_json(SAMPLE).unwrap();
        let pages = store.regions_for_exam("2021_f_a_p1");
        let regions = pages[0].question_regions(1000, 2000).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[&1], BBox::new(100.0, 100.0, 400.0, 150.0).unwrap());
    }

    #[test]
    fn test_negative_bbox_rejected() {
        let json = r#"{"images": [{"id": 1, "file_name": "a.jpg", "width": 10, "height": 10}],
            "annotations": [{"image_id": 1, "category_id": 1, "bbox": [0, 0, -5, 5]}]}"#;
        assert!(matches!(ReferenceStore::from_json(json), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_exam_ids() {
        let store = ReferenceStore::from_json(SAMPLE).unwrap();
        assert_eq!(store.exam_ids(), vec!["2020_9_b".to_string(), "2021_f_a".to_string()]);
    }

    #[test]
    fn test_zero_size_reference_rejected() {
        let json = r#"{"images": [{"id": 1, "file_name": "x_p1.jpg", "width": 0, "height": 10}]}"#;
        let store = ReferenceStore::from_json(json).unwrap();
        let pages = store.regions_for_exam("x");
        assert!(pages[0].question_regions(100, 100).is_err());
    }
}
