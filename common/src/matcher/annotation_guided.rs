//! アノテーションに基づく照合
//!
//! 1. 問題領域と同じ問題の解答領域をペアにする（IoU > 0 の最初の解答領域）
//! 2. ペアの解答領域を実行時の画像サイズへスケーリング
//! 3. 各領域について全候補とのIoUを計算し最大のものを選ぶ
//! 4. 最大IoUが閾値未満なら未回答

use crate::error::{Error, Result};
use crate::geometry::{iou, BBox};
use crate::types::{prepare_candidates, Assignment, Candidate, PageContext, ReferencePage};
use std::collections::BTreeMap;
use tracing::debug;

/// 候補を採用する最小IoU
pub const MATCH_IOU_THRESHOLD: f64 = 0.3;

/// 検出器出力の信頼度の下限（これ以下は照合前に除外）
pub const MIN_CANDIDATE_CONFIDENCE: f64 = 0.3;

/// 照合対象の領域（アノテーション座標系）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedRegion {
    pub question_id: u32,
    pub bbox: BBox,
    /// ペアになった解答領域の正解ラベル
    pub ground_truth: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct AnnotationGuided {
    pub threshold: f64,
    pub min_confidence: f64,
}

impl Default for AnnotationGuided {
    fn default() -> Self {
        Self {
            threshold: MATCH_IOU_THRESHOLD,
            min_confidence: MIN_CANDIDATE_CONFIDENCE,
        }
    }
}

impl AnnotationGuided {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn match_page(&self, page: &PageContext<'_>) -> Result<Vec<Assignment>> {
        let reference = page.reference.ok_or_else(|| {
            Error::NotFound(format!("reference layout for page {}", page.index))
        })?;

        let (w_ratio, h_ratio) = reference.scale_ratio(page.width, page.height)?;
        let candidates = prepare_candidates(&page.candidates, Some(self.min_confidence));

        let mut assignments = Vec::new();
        for region in pair_regions(reference)? {
            let target = region.bbox.scale_truncated(w_ratio, h_ratio);
            let assignment = match best_overlap(&target, &candidates)? {
                Some((candidate, score)) if score >= self.threshold => {
                    Assignment::answered(region.question_id, candidate)
                }
                best => {
                    debug!(
                        question = region.question_id,
                        best_iou = best.map(|(_, s)| s).unwrap_or(0.0),
                        "no candidate above threshold"
                    );
                    Assignment::unanswered(region.question_id)
                }
            };
            assignments.push(assignment.with_ground_truth(region.ground_truth));
        }

        Ok(assignments)
    }
}

/// 問題領域と解答領域のペアリング
///
/// 問題領域ごとに、アノテーション順で最初に IoU > 0 となる解答領域を採用する
/// （IoUの大小は見ない）。重なる解答領域がない問題は問題領域そのものを使う。
/// 結果は問題番号順。
pub fn pair_regions(reference: &ReferencePage) -> Result<Vec<PairedRegion>> {
    let answers: Vec<_> = reference.answers().collect();
    let mut paired = BTreeMap::new();

    for question in reference.questions() {
        let Some(question_id) = question.question_id() else {
            continue;
        };

        let mut matched = None;
        for answer in &answers {
            if iou(&question.bbox, &answer.bbox)? > 0.0 {
                matched = Some(*answer);
                break;
            }
        }

        let region = match matched {
            Some(answer) => PairedRegion {
                question_id,
                bbox: answer.bbox,
                ground_truth: answer.answer_label(),
            },
            None => {
                debug!(question = question_id, "no answer region overlaps question region");
                PairedRegion {
                    question_id,
                    bbox: question.bbox,
                    ground_truth: None,
                }
            }
        };
        paired.insert(question_id, region);
    }

    Ok(paired.into_values().collect())
}

/// IoU最大の候補（同値なら先頭 = 信頼度の高い方）
fn best_overlap<'c>(
    target: &BBox,
    candidates: &'c [Candidate],
) -> Result<Option<(&'c Candidate, f64)>> {
    let mut best: Option<(&Candidate, f64)> = None;
    for candidate in candidates {
        let score = iou(&candidate.bbox, target)?;
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageRecord, ReferenceRegion};

    fn bbox(l: f64, t: f64, r: f64, b: f64) -> BBox {
        BBox::new(l, t, r, b).unwrap()
    }

    fn reference(regions: Vec<ReferenceRegion>) -> ReferencePage {
        ReferencePage {
            record: PageRecord {
                id: 1,
                file_name: "2021_f_a_p1.jpg".into(),
                width: 1000,
                height: 1000,
            },
            regions,
        }
    }

    fn page<'a>(reference: &'a ReferencePage, candidates: Vec<Candidate>) -> PageContext<'a> {
        PageContext {
            index: 0,
            width: 1000,
            height: 1000,
            reference: Some(reference),
            candidates,
        }
    }

    #[test]
    fn test_scenario_best_iou_wins_over_confidence() {
        let reference = reference(vec![ReferenceRegion::new(bbox(100.0, 100.0, 200.0, 150.0), 7)]);
        let near = Candidate::new(bbox(105.0, 102.0, 198.0, 148.0), 0.9, 2);
        let far = Candidate::new(bbox(500.0, 500.0, 520.0, 520.0), 0.95, 4);

        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![far, near]))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].question_id, 1);
        assert_eq!(result[0].label, 2);
        assert_eq!(result[0].confidence, 0.9);
        assert_eq!(result[0].bbox, near.bbox);
    }

    #[test]
    fn test_no_overlap_yields_sentinel() {
        let reference = reference(vec![ReferenceRegion::new(bbox(100.0, 100.0, 200.0, 150.0), 7)]);
        let far = Candidate::new(bbox(500.0, 500.0, 520.0, 520.0), 0.95, 4);

        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![far]))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result[0].is_unanswered());
        assert_eq!(result[0].confidence, 0.0);
        assert_eq!(result[0].bbox, BBox::zero());
    }

    #[test]
    fn test_no_candidates_yields_sentinel() {
        let reference = reference(vec![ReferenceRegion::new(bbox(100.0, 100.0, 200.0, 150.0), 9)]);
        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![]))
            .unwrap();
        assert_eq!(result[0].question_id, 3);
        assert!(result[0].is_unanswered());
    }

    #[test]
    fn test_below_threshold_is_unanswered() {
        let reference = reference(vec![ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7)]);
        // IoU = 2500 / 10000 = 0.25
        let weak = Candidate::new(bbox(0.0, 0.0, 50.0, 50.0), 0.99, 1);
        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![weak]))
            .unwrap();
        assert!(result[0].is_unanswered());

        let lenient = AnnotationGuided::default().with_threshold(0.2);
        let result = lenient.match_page(&page(&reference, vec![weak])).unwrap();
        assert_eq!(result[0].label, 1);
    }

    #[test]
    fn test_iou_exactly_at_threshold_is_selected() {
        let reference = reference(vec![ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7)]);
        // IoU = 3000 / 10000 = 0.3
        let edge = Candidate::new(bbox(0.0, 0.0, 30.0, 100.0), 0.8, 4);
        assert_eq!(iou(&bbox(0.0, 0.0, 100.0, 100.0), &edge.bbox).unwrap(), MATCH_IOU_THRESHOLD);

        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![edge]))
            .unwrap();
        assert_eq!(result[0].label, 4);
        assert_eq!(result[0].confidence, 0.8);
    }

    #[test]
    fn test_single_candidate_above_threshold_selected() {
        let reference = reference(vec![ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7)]);
        let good = Candidate::new(bbox(0.0, 0.0, 90.0, 90.0), 0.4, 3);
        let loud = Candidate::new(bbox(0.0, 0.0, 40.0, 40.0), 0.99, 5);
        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![loud, good]))
            .unwrap();
        assert_eq!(result[0].label, 3);
        assert_eq!(result[0].confidence, 0.4);
    }

    #[test]
    fn test_low_confidence_candidates_filtered() {
        let reference = reference(vec![ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7)]);
        let faint = Candidate::new(bbox(0.0, 0.0, 100.0, 100.0), 0.25, 2);
        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![faint]))
            .unwrap();
        assert!(result[0].is_unanswered());

        let relaxed = AnnotationGuided::default().with_min_confidence(0.1);
        let result = relaxed.match_page(&page(&reference, vec![faint])).unwrap();
        assert_eq!(result[0].label, 2);
    }

    #[test]
    fn test_pairing_first_overlap_wins() {
        let question = ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 8);
        let small = ReferenceRegion::new(bbox(90.0, 90.0, 110.0, 110.0), 2);
        let large = ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 5);
        let reference = reference(vec![question, small, large]);

        let paired = pair_regions(&reference).unwrap();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].question_id, 2);
        assert_eq!(paired[0].bbox, small.bbox);
        assert_eq!(paired[0].ground_truth, Some(1));
    }

    #[test]
    fn test_pairing_without_answer_uses_question_box() {
        let question = ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7);
        let elsewhere = ReferenceRegion::new(bbox(300.0, 300.0, 310.0, 310.0), 4);
        let paired = pair_regions(&reference(vec![question, elsewhere])).unwrap();
        assert_eq!(paired[0].bbox, question.bbox);
        assert_eq!(paired[0].ground_truth, None);
    }

    #[test]
    fn test_regions_scaled_to_runtime_size() {
        // アノテーションは1000x1000、実行時は500x500
        let reference = reference(vec![ReferenceRegion::new(bbox(200.0, 200.0, 400.0, 300.0), 7)]);
        let candidate = Candidate::new(bbox(100.0, 100.0, 200.0, 150.0), 0.8, 0);
        let ctx = PageContext {
            index: 0,
            width: 500,
            height: 500,
            reference: Some(&reference),
            candidates: vec![candidate],
        };
        let result = AnnotationGuided::default().match_page(&ctx).unwrap();
        assert_eq!(result[0].label, 0);
    }

    #[test]
    fn test_results_ordered_by_question_id() {
        let reference = reference(vec![
            ReferenceRegion::new(bbox(0.0, 500.0, 100.0, 600.0), 9),
            ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7),
            ReferenceRegion::new(bbox(0.0, 200.0, 100.0, 300.0), 8),
        ]);
        let result = AnnotationGuided::default()
            .match_page(&page(&reference, vec![]))
            .unwrap();
        let ids: Vec<u32> = result.iter().map(|a| a.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_reference_is_not_found() {
        let ctx = PageContext {
            index: 4,
            width: 100,
            height: 100,
            reference: None,
            candidates: vec![],
        };
        let err = AnnotationGuided::default().match_page(&ctx).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
