//! 採点パイプライン
//!
//! ページ読込 → 検出結果取得 → 戦略選択 → ページ順に照合 → 集約 → 診断出力

use crate::config::Config;
use crate::detection::Detector;
use crate::error::{GraderError, Result};
use crate::report::{OverlayStyle, PredictionLog, Reporter};
use crate::scanner::LoadedPage;
use crate::scoring::ScoreReport;
use indicatif::{ProgressBar, ProgressStyle};
use omr_grader_common::{
    AnnotationGuided, Assignment, Candidate, GeometryOnly, GradingRun, MatchStrategy, PageContext,
    ReferencePage, ReferenceStore, Solution,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 1回の採点の設定（Config + CLIフラグ）
#[derive(Debug, Clone)]
pub struct GradeSettings {
    pub match_iou_threshold: f64,
    pub min_confidence: f64,
    pub question_class_id: i32,
    pub save_images: bool,
    pub save_log: bool,
    pub show_progress: bool,
}

impl GradeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            match_iou_threshold: config.match_iou_threshold,
            min_confidence: config.min_confidence,
            question_class_id: config.question_class_id,
            save_images: false,
            save_log: false,
            show_progress: true,
        }
    }

    fn annotation_guided(&self) -> MatchStrategy {
        MatchStrategy::AnnotationGuided(
            AnnotationGuided::default()
                .with_threshold(self.match_iou_threshold)
                .with_min_confidence(self.min_confidence),
        )
    }

    fn geometry_only(&self) -> MatchStrategy {
        MatchStrategy::GeometryOnly(
            GeometryOnly::default().with_question_class_id(self.question_class_id),
        )
    }
}

/// 選択した戦略と、アノテーション照合で使うリファレンスページ（ファイル名順）
pub struct StrategyPlan<'s> {
    pub strategy: MatchStrategy,
    pub references: Vec<&'s ReferencePage>,
}

/// 戦略を選ぶ
///
/// 試験のリファレンスページがあればアノテーション照合、なければ幾何照合。
/// 試験が見つからない場合は警告して幾何照合に切り替える。
pub fn plan_strategy<'s>(
    store: Option<&'s ReferenceStore>,
    exam: Option<&str>,
    settings: &GradeSettings,
) -> Result<StrategyPlan<'s>> {
    let (store, exam) = match (store, exam) {
        (Some(store), Some(exam)) => (store, exam),
        _ => {
            debug!("no reference data, using geometry-only matching");
            return Ok(StrategyPlan {
                strategy: settings.geometry_only(),
                references: Vec::new(),
            });
        }
    };

    match store.require_exam(exam) {
        Ok(references) => Ok(StrategyPlan {
            strategy: settings.annotation_guided(),
            references,
        }),
        Err(e) => {
            let err = GraderError::from(e);
            if !err.is_not_found() {
                return Err(err);
            }
            warn!("{}; falling back to geometry-only matching", err);
            Ok(StrategyPlan {
                strategy: settings.geometry_only(),
                references: Vec::new(),
            })
        }
    }
}

/// 採点結果
#[derive(Debug)]
pub struct GradeOutcome {
    pub strategy: String,
    pub solution: Solution,
    /// 問題番号順の割り当て（重複番号は後のページ優先）
    pub assignments: Vec<Assignment>,
}

/// ページを順番に照合して解答を作る
///
/// 検出結果は照合前にすべて取得する。診断出力の失敗は結果に影響しない。
pub fn grade_pages(
    pages: &[LoadedPage],
    plan: StrategyPlan<'_>,
    detector: &dyn Detector,
    settings: &GradeSettings,
    mut reporter: Option<&mut Reporter>,
) -> Result<GradeOutcome> {
    let detections = pages
        .iter()
        .map(|page| detector.detect(page))
        .collect::<Result<Vec<Vec<Candidate>>>>()?;

    let annotation_guided = plan.strategy.is_annotation_guided();
    if annotation_guided && plan.references.len() != pages.len() {
        warn!(
            "page count ({}) differs from reference page count ({})",
            pages.len(),
            plan.references.len()
        );
    }

    let strategy = plan.strategy.to_string();
    let mut run = GradingRun::new(plan.strategy);
    let progress = progress_bar(pages.len() as u64, settings.show_progress);

    for (page, candidates) in pages.iter().zip(detections) {
        progress.set_message(page.info.file_name.clone());
        debug!("{}: {} candidates", page.info.file_name, candidates.len());

        let context = PageContext {
            index: page.index,
            width: page.width(),
            height: page.height(),
            reference: plan.references.get(page.index).copied(),
            candidates,
        };
        let result = run.push_page(&context)?;

        if settings.save_images {
            if let Some(reporter) = reporter.as_deref_mut() {
                reporter.write_overlay(result.index, &page.image, &result.assignments);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let assignments = run.assignments();
    if settings.save_log {
        if let Some(reporter) = reporter.as_deref_mut() {
            let log = PredictionLog::from_assignments(&assignments, annotation_guided);
            reporter.write_prediction_log(&log);
        }
    }

    Ok(GradeOutcome {
        strategy,
        solution: run.finish(),
        assignments,
    })
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// 診断出力を作る（フォント指定が読めなければシステムフォントを探す）
pub fn build_reporter(log_dir: &Path, font_path: Option<&Path>) -> Reporter {
    let style = match font_path {
        Some(path) => OverlayStyle::with_font_path(path).unwrap_or_else(|e| {
            warn!("フォントを読み込めません {}: {}", path.display(), e);
            OverlayStyle::with_system_font()
        }),
        None => OverlayStyle::with_system_font(),
    };
    Reporter::new(log_dir, style)
}

/// 出力JSON
#[derive(Debug, Serialize)]
pub struct SolutionFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam: Option<&'a str>,
    pub strategy: &'a str,
    pub generated_at: String,
    pub solution: &'a Solution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<&'a ScoreReport>,
}

impl<'a> SolutionFile<'a> {
    pub fn new(exam: Option<&'a str>, outcome: &'a GradeOutcome, score: Option<&'a ScoreReport>) -> Self {
        Self {
            exam,
            strategy: &outcome.strategy,
            generated_at: chrono::Local::now().to_rfc3339(),
            solution: &outcome.solution,
            score,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// 出力先のデフォルト: ページフォルダ/solution.json
pub fn default_output_path(pages_dir: &Path) -> PathBuf {
    pages_dir.join("solution.json")
}
