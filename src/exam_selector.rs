//! 試験ID対話式選択モジュール
//!
//! 試験IDは `{年度}_{回}_{型}`（例: `2021_f_a`）。
//! 回: 6=6月模試, 9=9月模試, f=本試験。型: a/b（2022年度以降は n のみ）。

use crate::error::{GraderError, Result};
use dialoguer::Select;
use omr_grader_common::ReferenceStore;

pub const FIRST_YEAR: u32 = 2013;
pub const LAST_YEAR: u32 = 2023;
/// この年度から型の区別がなくなる
const UNIFIED_TYPE_YEAR: u32 = 2022;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    June,
    September,
    Final,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::June, Session::September, Session::Final];

    pub fn code(&self) -> &'static str {
        match self {
            Session::June => "6",
            Session::September => "9",
            Session::Final => "f",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Session::June => "6月模試",
            Session::September => "9月模試",
            Session::Final => "本試験",
        }
    }
}

/// 年度で選べる型
pub fn available_types(year: u32) -> &'static [&'static str] {
    if year >= UNIFIED_TYPE_YEAR {
        &["n"]
    } else {
        &["a", "b"]
    }
}

/// 試験IDを組み立てる
pub fn build_exam_id(year: u32, session: Session, exam_type: &str) -> Result<String> {
    if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
        return Err(GraderError::Config(format!(
            "年度は{}〜{}で指定してください: {}",
            FIRST_YEAR, LAST_YEAR, year
        )));
    }
    if !available_types(year).contains(&exam_type) {
        return Err(GraderError::Config(format!(
            "{}年度に型 '{}' はありません",
            year, exam_type
        )));
    }
    Ok(format!("{}_{}_{}", year, session.code(), exam_type))
}

/// 対話式で試験を選択
///
/// リファレンスに含まれる試験IDを一覧表示し、一覧にない場合は
/// 年度・回・型から組み立てる。
pub fn select_exam_interactive(store: &ReferenceStore) -> Result<String> {
    let exams = store.exam_ids();

    if exams.is_empty() {
        println!("⚠ リファレンスに試験が登録されていません");
        return select_exam_by_parts();
    }

    println!("\n📋 試験を選択してください:\n");

    let mut items = exams.clone();
    items.push("その他（年度・回・型を指定）".to_string());

    let choice = Select::new()
        .with_prompt("試験")
        .items(&items[..])
        .default(0)
        .interact()
        .map_err(|_| GraderError::SelectionCancelled)?;

    match exams.get(choice) {
        Some(exam) => {
            println!("→ {} を使用", exam);
            Ok(exam.clone())
        }
        None => select_exam_by_parts(),
    }
}

fn select_exam_by_parts() -> Result<String> {
    let years: Vec<u32> = (FIRST_YEAR..=LAST_YEAR).rev().collect();
    let year_labels: Vec<String> = years.iter().map(|y| format!("{}年度", y)).collect();
    let year_idx = Select::new()
        .with_prompt("年度")
        .items(&year_labels[..])
        .default(0)
        .interact()
        .map_err(|_| GraderError::SelectionCancelled)?;
    let year = years[year_idx];

    let session_labels: Vec<&str> = Session::ALL.iter().map(|s| s.label()).collect();
    let session_idx = Select::new()
        .with_prompt("回")
        .items(&session_labels[..])
        .default(2)
        .interact()
        .map_err(|_| GraderError::SelectionCancelled)?;
    let session = Session::ALL[session_idx];

    let types = available_types(year);
    let exam_type = if types.len() == 1 {
        types[0]
    } else {
        let type_idx = Select::new()
            .with_prompt("型")
            .items(types)
            .default(0)
            .interact()
            .map_err(|_| GraderError::SelectionCancelled)?;
        types[type_idx]
    };

    let exam = build_exam_id(year, session, exam_type)?;
    println!("→ {} を使用", exam);
    Ok(exam)
}
