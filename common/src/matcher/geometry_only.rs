//! 検出ボックスの配置だけによる照合
//!
//! アノテーションがない試験用。ページを左右の段に分け、段ごとに問題マーカーを
//! クラスタリングし、各クラスタに重なる解答マーカーのうち最も信頼度の高いものを
//! 割り当てる。問題番号は `NumberingState` から順に振る。

use crate::error::Result;
use crate::geometry::iou;
use crate::matcher::NumberingState;
use crate::types::{
    prepare_candidates, Assignment, Candidate, PageContext, QUESTION_CLASS_ID,
};
use tracing::debug;

/// アンカーとのIoUがこれ未満のマーカーを別の問題とみなす
pub const CLUSTER_IOU_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct GeometryOnly {
    pub question_class_id: i32,
    pub cluster_threshold: f64,
}

impl Default for GeometryOnly {
    fn default() -> Self {
        Self {
            question_class_id: QUESTION_CLASS_ID,
            cluster_threshold: CLUSTER_IOU_THRESHOLD,
        }
    }
}

/// 1段分の候補（いずれも信頼度の降順）
#[derive(Debug, Default)]
struct Column {
    questions: Vec<Candidate>,
    answers: Vec<Candidate>,
}

impl GeometryOnly {
    pub fn with_question_class_id(mut self, class_id: i32) -> Self {
        self.question_class_id = class_id;
        self
    }

    pub fn match_page(
        &self,
        page: &PageContext<'_>,
        numbering: &mut NumberingState,
    ) -> Result<Vec<Assignment>> {
        let candidates = prepare_candidates(&page.candidates, None);
        let (left, right) = self.split_columns(&candidates, page.width);

        let mut assignments = Vec::new();
        for column in [left, right] {
            let mut pairs = self.pair_column(&column)?;
            pairs.sort_by(|a, b| a.0.bbox.top.total_cmp(&b.0.bbox.top));

            for (marker, answer) in pairs {
                let question_id = numbering.next_question_id();
                let assignment = match answer {
                    Some(answer) => Assignment::answered(question_id, &answer),
                    None => Assignment::unanswered(question_id),
                };
                assignments.push(assignment.with_question_marker(marker));
            }
        }

        debug!(
            page = page.index,
            questions = assignments.len(),
            "geometry-only page matched"
        );
        Ok(assignments)
    }

    /// ページの中央で左右に分け、問題マーカーと解答マーカーに振り分ける
    fn split_columns(&self, candidates: &[Candidate], page_width: u32) -> (Column, Column) {
        let midpoint = page_width as f64 / 2.0;
        let mut left = Column::default();
        let mut right = Column::default();

        for candidate in candidates {
            let column = if candidate.bbox.left < midpoint {
                &mut left
            } else {
                &mut right
            };
            if candidate.is_question_marker(self.question_class_id) {
                column.questions.push(*candidate);
            } else {
                column.answers.push(*candidate);
            }
        }

        (left, right)
    }

    /// 問題マーカーのクラスタリング
    ///
    /// 最も信頼度の高いマーカーをアンカーとし、信頼度順に走査して最初に
    /// アンカーとのIoUが閾値未満となったマーカーを2つ目のクラスタにする。
    /// 1段あたり最大2クラスタで、それ以降のマーカーは捨てる。
    fn cluster_questions(&self, questions: &[Candidate]) -> Result<Vec<Candidate>> {
        let Some(anchor) = questions.first() else {
            return Ok(Vec::new());
        };

        let mut clusters = vec![*anchor];
        for marker in &questions[1..] {
            if iou(&anchor.bbox, &marker.bbox)? < self.cluster_threshold {
                clusters.push(*marker);
                break;
            }
        }
        Ok(clusters)
    }

    /// クラスタごとに重なる解答マーカーのうち信頼度最大のものを選ぶ
    fn pair_column(&self, column: &Column) -> Result<Vec<(Candidate, Option<Candidate>)>> {
        let clusters = self.cluster_questions(&column.questions)?;

        let mut pairs = Vec::with_capacity(clusters.len());
        for marker in clusters {
            let mut best: Option<Candidate> = None;
            for answer in &column.answers {
                if iou(&marker.bbox, &answer.bbox)? > 0.0
                    && best.map_or(true, |b| answer.confidence > b.confidence)
                {
                    best = Some(*answer);
                }
            }
            pairs.push((marker, best));
        }
        Ok(pairs)
    }
}
