//! 正解データとの照合（O/X判定）

use crate::error::{GraderError, Result};
use omr_grader_common::Solution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const MAX_OPTION: u8 = 6;

/// 正解データ: 問題番号 → 正解の選択肢番号（1〜6）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey(BTreeMap<u32, u8>);

#[derive(Deserialize)]
struct AnswerKeyFile {
    answer: BTreeMap<String, u8>,
}

impl AnswerKey {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GraderError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// `{"answer": {"1": 3, "2": 5, ...}}` 形式を読む
    pub fn from_json(json: &str) -> Result<Self> {
        let file: AnswerKeyFile = serde_json::from_str(json)
            .map_err(|e| GraderError::InvalidAnswerKey(e.to_string()))?;

        let mut answers = BTreeMap::new();
        for (question, option) in file.answer {
            let id: u32 = question
                .trim()
                .parse()
                .map_err(|_| GraderError::InvalidAnswerKey(format!("問題番号が数値ではありません: {}", question)))?;
            if option == 0 || option > MAX_OPTION {
                return Err(GraderError::InvalidAnswerKey(format!(
                    "問題{}の選択肢が範囲外: {}",
                    id, option
                )));
            }
            answers.insert(id, option);
        }
        Ok(Self(answers))
    }

    pub fn get(&self, question_id: u32) -> Option<u8> {
        self.0.get(&question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mark {
    O,
    X,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub marks: BTreeMap<u32, Mark>,
    pub correct: usize,
    pub total: usize,
}

/// 解答を採点する
///
/// 正解データにある問題だけを数える。選択肢番号 = ラベル + 1。
/// 未回答（-1）や解答にない問題は X。
pub fn score(solution: &Solution, key: &AnswerKey) -> ScoreReport {
    let mut marks = BTreeMap::new();
    let mut correct = 0;

    for (&question_id, &option) in &key.0 {
        let is_correct = solution
            .get(question_id)
            .map(|label| label >= 0 && label + 1 == i32::from(option))
            .unwrap_or(false);
        if is_correct {
            correct += 1;
        }
        marks.insert(question_id, if is_correct { Mark::O } else { Mark::X });
    }

    ScoreReport {
        total: marks.len(),
        marks,
        correct,
    }
}
