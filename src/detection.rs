//! 検出器との境界
//!
//! 検出モデル自体は外部。ここではページ画像ごとの検出結果
//! (box, confidence, class_id) を候補リストとして受け取る。

use crate::error::{GraderError, Result};
use crate::scanner::LoadedPage;
use omr_grader_common::{BBox, Candidate};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// ページ画像 → 候補ボックス
pub trait Detector {
    fn detect(&self, page: &LoadedPage) -> Result<Vec<Candidate>>;
}

/// 検出結果JSONの形式
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDetections {
    /// mmdetection形式: クラスIDごとの [left, top, right, bottom, score] 配列
    PerClass(Vec<Vec<[f64; 5]>>),
    /// フラット形式
    Flat(Vec<FlatDetection>),
}

#[derive(Debug, Deserialize)]
struct FlatDetection {
    bbox: [f64; 4],
    #[serde(alias = "confidence")]
    score: f64,
    #[serde(alias = "class_id")]
    label: i32,
}

/// 事前に書き出された検出結果（`<画像名>.json`）を読む検出器
#[derive(Debug, Clone)]
pub struct SidecarDetector {
    dir: PathBuf,
}

impl SidecarDetector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn sidecar_path(&self, page: &LoadedPage) -> PathBuf {
        self.dir.join(format!("{}.json", page.info.stem()))
    }
}

impl Detector for SidecarDetector {
    fn detect(&self, page: &LoadedPage) -> Result<Vec<Candidate>> {
        let path = self.sidecar_path(page);
        if !path.exists() {
            return Err(GraderError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        parse_detections(&content).map_err(|e| match e {
            GraderError::JsonParse(err) => {
                GraderError::Detection(format!("{}: {}", path.display(), err))
            }
            other => other,
        })
    }
}

/// 検出結果JSONをパース
pub fn parse_detections(json: &str) -> Result<Vec<Candidate>> {
    let raw: RawDetections = serde_json::from_str(json)?;

    let mut candidates = Vec::new();
    match raw {
        RawDetections::PerClass(classes) => {
            for (label, boxes) in classes.iter().enumerate() {
                for &[left, top, right, bottom, score] in boxes {
                    candidates.push(candidate(left, top, right, bottom, score, label as i32)?);
                }
            }
        }
        RawDetections::Flat(items) => {
            for item in items {
                let [left, top, right, bottom] = item.bbox;
                candidates.push(candidate(left, top, right, bottom, item.score, item.label)?);
            }
        }
    }
    Ok(candidates)
}

fn candidate(left: f64, top: f64, right: f64, bottom: f64, score: f64, label: i32) -> Result<Candidate> {
    if !(0.0..=1.0).contains(&score) {
        return Err(GraderError::Detection(format!("信頼度が範囲外: {}", score)));
    }
    // 負のラベルは未回答センチネルと区別できない
    if label < 0 {
        return Err(GraderError::Detection(format!("クラスIDが負: {}", label)));
    }
    let bbox = BBox::new(left, top, right, bottom)?;
    Ok(Candidate::new(bbox, score, label))
}

/// ページフォルダと同じ場所の検出結果を使う
pub fn default_detections_dir(pages_dir: &Path) -> PathBuf {
    pages_dir.to_path_buf()
}
