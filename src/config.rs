use crate::error::{GraderError, Result};
use omr_grader_common::matcher::annotation_guided::{MATCH_IOU_THRESHOLD, MIN_CANDIDATE_CONFIDENCE};
use omr_grader_common::QUESTION_CLASS_ID;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 予測ログ・確認用画像の出力先
    pub log_dir: PathBuf,
    /// アノテーション照合で候補を採用する最小IoU
    pub match_iou_threshold: f64,
    /// アノテーション照合前に除外する信頼度の下限
    pub min_confidence: f64,
    /// 検出器の問題マーカーのクラスID
    pub question_class_id: i32,
    /// 確認用画像のラベル描画フォント
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            match_iou_threshold: MATCH_IOU_THRESHOLD,
            min_confidence: MIN_CANDIDATE_CONFIDENCE,
            question_class_id: QUESTION_CLASS_ID,
            font_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| GraderError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("omr-grader").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_iou_threshold) {
            return Err(GraderError::Config(format!(
                "IoU閾値は0〜1で指定してください: {}",
                self.match_iou_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(GraderError::Config(format!(
                "信頼度の下限は0〜1で指定してください: {}",
                self.min_confidence
            )));
        }
        Ok(())
    }

    pub fn set_log_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.log_dir = dir;
        self.save()
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        self.match_iou_threshold = threshold;
        self.save()
    }

    pub fn set_min_confidence(&mut self, min_confidence: f64) -> Result<()> {
        self.min_confidence = min_confidence;
        self.save()
    }

    /// CLIフラグで一時的に上書き（保存はしない）
    pub fn with_overrides(mut self, threshold: Option<f64>, min_confidence: Option<f64>) -> Result<Self> {
        if let Some(t) = threshold {
            self.match_iou_threshold = t;
        }
        if let Some(c) = min_confidence {
            self.min_confidence = c;
        }
        self.validate()?;
        Ok(self)
    }
}
