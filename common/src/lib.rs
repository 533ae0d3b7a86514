//! OMR Grader Common Library
//!
//! 答案用紙の検出ボックスと問題の対応付けを行うエンジン部分。
//! ファイル入出力（リファレンス読込を除く）はCLI側で行う。

pub mod aggregator;
pub mod error;
pub mod geometry;
pub mod matcher;
pub mod reference;
pub mod types;

pub use aggregator::{GradingRun, PageResult};
pub use error::{Error, Result};
pub use geometry::{iou, to_corners, BBox};
pub use matcher::{AnnotationGuided, GeometryOnly, MatchStrategy, NumberingState};
pub use reference::ReferenceStore;
pub use types::{
    prepare_candidates, Assignment, Candidate, PageContext, PageRecord, ReferencePage,
    ReferenceRegion, RegionKind, Solution, QUESTION_CLASS_ID, UNANSWERED_LABEL,
};
