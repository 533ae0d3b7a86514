//! マッチングの型定義
//!
//! - Candidate: 検出器の出力ボックス
//! - ReferenceRegion: 事前アノテーションの問題/解答領域
//! - PageContext: 1ページ分のマッチング入力
//! - Assignment: 1問分の解決結果
//! - Solution: 問題番号 → 選択肢ラベルの最終マップ

use crate::geometry::BBox;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 検出器で「問題マーカー」に予約されたクラスID
pub const QUESTION_CLASS_ID: i32 = 6;

/// 未回答センチネルのラベル
pub const UNANSWERED_LABEL: i32 = -1;

/// アノテーションの category_id がこの値を超えると問題領域
pub const QUESTION_CATEGORY_OFFSET: u32 = 6;

/// 検出器の候補ボックス
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub bbox: BBox,
    /// 信頼度 [0, 1]
    pub confidence: f64,
    /// 検出クラスID
    pub label: i32,
}

impl Candidate {
    pub fn new(bbox: BBox, confidence: f64, label: i32) -> Self {
        Self { bbox, confidence, label }
    }

    pub fn is_question_marker(&self, question_class_id: i32) -> bool {
        self.label == question_class_id
    }
}

/// 信頼度の降順に安定ソート
pub fn sort_by_confidence_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// 検出器の生出力を候補リストに変換
///
/// `min_confidence` を指定した場合はそれ以下の候補を除外する。結果は信頼度の降順。
pub fn prepare_candidates(raw: &[Candidate], min_confidence: Option<f64>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = raw
        .iter()
        .filter(|c| min_confidence.map_or(true, |t| c.confidence > t))
        .copied()
        .collect();
    sort_by_confidence_desc(&mut candidates);
    candidates
}

/// リファレンス領域の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// 問題領域（1始まりの問題番号）
    Question(u32),
    /// 解答選択肢領域（選択肢番号 1〜6）
    Answer(u32),
}

impl RegionKind {
    pub fn from_category(category_id: u32) -> Self {
        if category_id > QUESTION_CATEGORY_OFFSET {
            RegionKind::Question(category_id - QUESTION_CATEGORY_OFFSET)
        } else {
            RegionKind::Answer(category_id)
        }
    }
}

/// 事前アノテーションされた領域
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRegion {
    pub bbox: BBox,
    pub category_id: u32,
    pub kind: RegionKind,
}

impl ReferenceRegion {
    pub fn new(bbox: BBox, category_id: u32) -> Self {
        Self {
            bbox,
            category_id,
            kind: RegionKind::from_category(category_id),
        }
    }

    pub fn question_id(&self) -> Option<u32> {
        match self.kind {
            RegionKind::Question(q) => Some(q),
            RegionKind::Answer(_) => None,
        }
    }

    /// 正解ラベル（検出器のクラスID空間: 選択肢番号 - 1）
    pub fn answer_label(&self) -> Option<i32> {
        match self.kind {
            RegionKind::Answer(option) => Some(option as i32 - 1),
            RegionKind::Question(_) => None,
        }
    }
}

/// リファレンスのページ情報（アノテーション時の宣言サイズ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// 1ページ分のリファレンス（ページ情報 + 領域、アノテーション順）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePage {
    pub record: PageRecord,
    pub regions: Vec<ReferenceRegion>,
}

/// 1ページ分のマッチング入力
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// ページ番号（0始まり、ファイル名順）
    pub index: usize,
    /// 実行時の画像サイズ
    pub width: u32,
    pub height: u32,
    /// アノテーション済みレイアウト（ない場合は None）
    pub reference: Option<&'a ReferencePage>,
    pub candidates: Vec<Candidate>,
}

/// 1問分の解決結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub question_id: u32,
    /// 選択肢ラベル（未回答は -1）
    pub label: i32,
    pub confidence: f64,
    pub bbox: BBox,
    /// 問題マーカー（幾何マッチングのみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_marker: Option<Candidate>,
    /// アノテーション上の正解ラベル（アノテーションマッチングのみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<i32>,
}

impl Assignment {
    pub fn answered(question_id: u32, candidate: &Candidate) -> Self {
        Self {
            question_id,
            label: candidate.label,
            confidence: candidate.confidence,
            bbox: candidate.bbox,
            question_marker: None,
            ground_truth: None,
        }
    }

    /// 未回答センチネル (-1, 0.0, 面積ゼロ)
    pub fn unanswered(question_id: u32) -> Self {
        Self {
            question_id,
            label: UNANSWERED_LABEL,
            confidence: 0.0,
            bbox: BBox::zero(),
            question_marker: None,
            ground_truth: None,
        }
    }

    pub fn is_unanswered(&self) -> bool {
        self.label == UNANSWERED_LABEL
    }

    pub fn with_question_marker(mut self, marker: Candidate) -> Self {
        self.question_marker = Some(marker);
        self
    }

    pub fn with_ground_truth(mut self, label: Option<i32>) -> Self {
        self.ground_truth = label;
        self
    }
}

/// 問題番号 → 選択肢ラベル
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution(pub BTreeMap<u32, i32>);

impl Solution {
    pub fn from_assignments(assignments: &[Assignment]) -> Self {
        Self(
            assignments
                .iter()
                .map(|a| (a.question_id, a.label))
                .collect(),
        )
    }

    pub fn get(&self, question_id: u32) -> Option<i32> {
        self.0.get(&question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, i32)> + '_ {
        self.0.iter().map(|(&q, &l)| (q, l))
    }

    pub fn unanswered_count(&self) -> usize {
        self.0.values().filter(|&&l| l == UNANSWERED_LABEL).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(conf: f64, label: i32) -> Candidate {
        Candidate::new(BBox::new(0.0, 0.0, 10.0, 10.0).unwrap(), conf, label)
    }

    #[test]
    fn test_region_kind_from_category() {
        assert_eq!(RegionKind::from_category(7), RegionKind::Question(1));
        assert_eq!(RegionKind::from_category(36), RegionKind::Question(30));
        assert_eq!(RegionKind::from_category(6), RegionKind::Answer(6));
        assert_eq!(RegionKind::from_category(1), RegionKind::Answer(1));
    }

    #[test]
    fn test_answer_label_is_zero_based() {
        let region = ReferenceRegion::new(BBox::zero(), 3);
        assert_eq!(region.answer_label(), Some(2));
        assert_eq!(region.question_id(), None);

        let q = ReferenceRegion::new(BBox::zero(), 9);
        assert_eq!(q.question_id(), Some(3));
        assert_eq!(q.answer_label(), None);
    }

    #[test]
    fn test_prepare_candidates_filters_and_sorts() {
        let raw = vec![cand(0.2, 1), cand(0.9, 2), cand(0.3, 3), cand(0.5, 4)];
        let prepared = prepare_candidates(&raw, Some(0.3));
        let labels: Vec<i32> = prepared.iter().map(|c| c.label).collect();
        // 0.3 ちょうどは除外
        assert_eq!(labels, vec![2, 4]);

        let all = prepare_candidates(&raw, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].label, 2);
        assert_eq!(all[3].label, 1);
    }

    #[test]
    fn test_sort_is_stable_for_equal_confidence() {
        let mut list = vec![cand(0.5, 1), cand(0.5, 2), cand(0.7, 3)];
        sort_by_confidence_desc(&mut list);
        let labels: Vec<i32> = list.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![3, 1, 2]);
    }

    #[test]
    fn test_unanswered_sentinel() {
        let a = Assignment::unanswered(4);
        assert_eq!(a.label, -1);
        assert_eq!(a.confidence, 0.0);
        assert!(a.bbox.is_zero_area());
        assert!(a.is_unanswered());
    }

    #[test]
    fn test_solution_from_assignments_sorted() {
        let assignments = vec![
            Assignment::answered(3, &cand(0.8, 2)),
            Assignment::unanswered(1),
            Assignment::answered(2, &cand(0.6, 0)),
        ];
        let solution = Solution::from_assignments(&assignments);
        let entries: Vec<(u32, i32)> = solution.iter().collect();
        assert_eq!(entries, vec![(1, -1), (2, 0), (3, 2)]);
        assert_eq!(solution.unanswered_count(), 1);
    }

    #[test]
    fn test_solution_serializes_as_map() {
        let solution = Solution::from_assignments(&[Assignment::answered(1, &cand(0.9, 4))]);
        let json = serde_json::to_string(&solution).unwrap();
        assert_eq!(json, r#"{"1":4}"#);
    }
}
