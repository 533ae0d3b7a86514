//! omr-grader
//!
//! 答案画像の検出ボックスを問題と照合して解答を作り、正解データで採点する。
//! 照合エンジン本体は `omr_grader_common`。

pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod exam_selector;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod scoring;
