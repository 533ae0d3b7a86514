//! 予測ログ（CSV）
//!
//! 幾何マッチング: question, confidence_q, answer, confidence_a
//! アノテーションマッチング: label, predict, confidence

use omr_grader_common::Assignment;

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionLog {
    GeometryOnly(Vec<GeometryRow>),
    AnnotationGuided(Vec<AnnotationRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRow {
    pub question: u32,
    pub confidence_q: f64,
    pub answer: i32,
    pub confidence_a: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    /// アノテーション上の正解（不明なら None）
    pub label: Option<i32>,
    pub predict: i32,
    pub confidence: f64,
}

impl PredictionLog {
    /// 問題番号順の割り当てからログを作る
    pub fn from_assignments(assignments: &[Assignment], annotation_guided: bool) -> Self {
        if annotation_guided {
            PredictionLog::AnnotationGuided(
                assignments
                    .iter()
                    .map(|a| AnnotationRow {
                        label: a.ground_truth,
                        predict: a.label,
                        confidence: a.confidence,
                    })
                    .collect(),
            )
        } else {
            PredictionLog::GeometryOnly(
                assignments
                    .iter()
                    .map(|a| GeometryRow {
                        question: a.question_id,
                        confidence_q: a.question_marker.map(|m| m.confidence).unwrap_or(0.0),
                        answer: a.label,
                        confidence_a: a.confidence,
                    })
                    .collect(),
            )
        }
    }

    /// CSV文字列（ヘッダー付き）
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        match self {
            PredictionLog::GeometryOnly(rows) => {
                out.push_str("question,confidence_q,answer,confidence_a\n");
                for r in rows {
                    out.push_str(&format!(
                        "{},{},{},{}\n",
                        r.question, r.confidence_q, r.answer, r.confidence_a
                    ));
                }
            }
            PredictionLog::AnnotationGuided(rows) => {
                out.push_str("label,predict,confidence\n");
                for r in rows {
                    let label = r.label.map(|l| l.to_string()).unwrap_or_default();
                    out.push_str(&format!("{},{},{}\n", label, r.predict, r.confidence));
                }
            }
        }
        out
    }
}
