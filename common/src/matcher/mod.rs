//! 問題と解答の照合
//!
//! 2種類の戦略を1つの `match_page` で扱う:
//! - AnnotationGuided: アノテーション済みレイアウトとのIoUで照合
//! - GeometryOnly: 検出ボックスの配置（左右の段組み）だけで照合

pub mod annotation_guided;
pub mod geometry_only;

pub use annotation_guided::AnnotationGuided;
pub use geometry_only::GeometryOnly;

use crate::error::Result;
use crate::types::{Assignment, PageContext};
use std::fmt;

/// ページをまたいで持ち回す問題番号カウンタ
///
/// 幾何マッチングでは問題番号はこのカウンタだけから振られる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingState {
    next: u32,
}

impl Default for NumberingState {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl NumberingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の問題番号を払い出す
    pub fn next_question_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// 照合戦略
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    AnnotationGuided(AnnotationGuided),
    GeometryOnly(GeometryOnly),
}

impl MatchStrategy {
    /// 1ページ分を照合
    ///
    /// ページは必ず順番に渡すこと（幾何マッチングの番号付けが順序に依存する）。
    pub fn match_page(
        &self,
        page: &PageContext<'_>,
        numbering: &mut NumberingState,
    ) -> Result<Vec<Assignment>> {
        match self {
            MatchStrategy::AnnotationGuided(m) => m.match_page(page),
            MatchStrategy::GeometryOnly(m) => m.match_page(page, numbering),
        }
    }

    pub fn is_annotation_guided(&self) -> bool {
        matches!(self, MatchStrategy::AnnotationGuided(_))
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::AnnotationGuided(_) => write!(f, "annotation-guided"),
            MatchStrategy::GeometryOnly(_) => write!(f, "geometry-only"),
        }
    }
}
