//! ページ結果の集約
//!
//! 1回の採点で使う戦略と番号カウンタを保持し、ページを順番に受け取って
//! 問題番号順の `Solution` にまとめる。

use crate::error::Result;
use crate::matcher::{MatchStrategy, NumberingState};
use crate::types::{Assignment, PageContext, Solution};
use std::collections::BTreeMap;

/// 1ページ分の照合結果
#[derive(Debug, Clone)]
pub struct PageResult {
    pub index: usize,
    pub assignments: Vec<Assignment>,
}

/// 1回の採点実行
#[derive(Debug)]
pub struct GradingRun {
    strategy: MatchStrategy,
    numbering: NumberingState,
    pages: Vec<PageResult>,
}

impl GradingRun {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            numbering: NumberingState::new(),
            pages: Vec::new(),
        }
    }

    /// 1ページを照合して結果を蓄積（ページ順に呼ぶこと）
    pub fn push_page(&mut self, page: &PageContext<'_>) -> Result<&PageResult> {
        let assignments = self.strategy.match_page(page, &mut self.numbering)?;
        self.pages.push(PageResult {
            index: page.index,
            assignments,
        });
        // 直前にpushしたので必ず存在する
        Ok(&self.pages[self.pages.len() - 1])
    }

    /// 全ページの割り当てを問題番号順に（重複番号は後のページが優先）
    pub fn assignments(&self) -> Vec<Assignment> {
        let merged: BTreeMap<u32, &Assignment> = self
            .pages
            .iter()
            .flat_map(|p| p.assignments.iter())
            .map(|a| (a.question_id, a))
            .collect();
        merged.into_values().cloned().collect()
    }

    pub fn solution(&self) -> Solution {
        Solution::from_assignments(&self.assignments())
    }

    /// 実行を終了して解答マップを返す
    pub fn finish(self) -> Solution {
        self.solution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::matcher::{AnnotationGuided, GeometryOnly};
    use crate::types::{Candidate, PageRecord, ReferencePage, ReferenceRegion, QUESTION_CLASS_ID};

    fn bbox(l: f64, t: f64, r: f64, b: f64) -> BBox {
        BBox::new(l, t, r, b).unwrap()
    }

    #[test]
    fn test_unanswered_question_kept_in_solution() {
        let reference = ReferencePage {
            record: PageRecord {
                id: 1,
                file_name: "x_p1.jpg".into(),
                width: 1000,
                height: 1000,
            },
            regions: vec![
                ReferenceRegion::new(bbox(100.0, 100.0, 200.0, 150.0), 7),
                ReferenceRegion::new(bbox(100.0, 400.0, 200.0, 450.0), 8),
            ],
        };
        let page = PageContext {
            index: 0,
            width: 1000,
            height: 1000,
            reference: Some(&reference),
            candidates: vec![Candidate::new(bbox(100.0, 100.0, 200.0, 150.0), 0.9, 1)],
        };

        let mut run = GradingRun::new(MatchStrategy::AnnotationGuided(AnnotationGuided::default()));
        let result = run.push_page(&page).unwrap();
        assert_eq!(result.index, 0);
        assert_eq!(result.assignments.len(), 2);
        let solution = run.finish();

        assert_eq!(solution.len(), 2);
        assert_eq!(solution.get(1), Some(1));
        assert_eq!(solution.get(2), Some(-1));
    }

    #[test]
    fn test_geometry_numbering_contiguous_across_pages() {
        let marker = |l: f64, t: f64| {
            Candidate::new(bbox(l, t, l + 300.0, t + 150.0), 0.9, QUESTION_CLASS_ID)
        };
        let pages: Vec<Vec<Candidate>> = vec![
            vec![marker(50.0, 100.0), marker(50.0, 500.0), marker(550.0, 100.0)],
            vec![marker(550.0, 100.0)],
            vec![],
            vec![marker(50.0, 100.0), marker(550.0, 100.0), marker(550.0, 500.0)],
        ];

        let mut run = GradingRun::new(MatchStrategy::GeometryOnly(GeometryOnly::default()));
        for (index, candidates) in pages.into_iter().enumerate() {
            let ctx = PageContext {
                index,
                width: 1000,
                height: 1400,
                reference: None,
                candidates,
            };
            run.push_page(&ctx).unwrap();
        }

        let ids: Vec<u32> = run.assignments().iter().map(|a| a.question_id).collect();
        assert_eq!(ids, (1..=7).collect::<Vec<u32>>());
        assert_eq!(run.solution().unanswered_count(), 7);
    }

    #[test]
    fn test_later_page_overrides_duplicate_question() {
        let region = ReferenceRegion::new(bbox(0.0, 0.0, 100.0, 100.0), 7);
        let reference = ReferencePage {
            record: PageRecord {
                id: 1,
                file_name: "x_p1.jpg".into(),
                width: 100,
                height: 100,
            },
            regions: vec![region],
        };
        let mut run = GradingRun::new(MatchStrategy::AnnotationGuided(AnnotationGuided::default()));
        for (index, label) in [(0, 2), (1, 4)] {
            let ctx = PageContext {
                index,
                width: 100,
                height: 100,
                reference: Some(&reference),
                candidates: vec![Candidate::new(region.bbox, 0.9, label)],
            };
            run.push_page(&ctx).unwrap();
        }
        assert_eq!(run.solution().get(1), Some(4));
        assert_eq!(run.assignments().len(), 1);
    }
}
