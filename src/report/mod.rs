//! 診断出力（予測ログCSV・確認用画像）
//!
//! どちらも採点結果には影響しない副作用。書き込みに失敗しても警告ログを出して
//! 処理を続ける。出力先フォルダは最初の書き込み時に一度だけ作成を試みる。

pub mod csv_log;
pub mod overlay;

pub use csv_log::PredictionLog;
pub use overlay::{render_overlay, OverlayStyle};

use crate::error::{GraderError, Result};
use image::{ImageFormat, RgbImage};
use omr_grader_common::Assignment;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const PREDICTION_LOG_FILE: &str = "predict_log.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirState {
    Pending,
    Ready,
    Failed,
}

pub struct Reporter {
    dir: PathBuf,
    state: DirState,
    style: OverlayStyle,
}

impl Reporter {
    pub fn new(dir: impl Into<PathBuf>, style: OverlayStyle) -> Self {
        Self {
            dir: dir.into(),
            state: DirState::Pending,
            style,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 予測ログを書き出す（失敗時は None）
    pub fn write_prediction_log(&mut self, log: &PredictionLog) -> Option<PathBuf> {
        let csv = log.to_csv();
        self.write_or_warn(PREDICTION_LOG_FILE, |w| {
            w.write_all(csv.as_bytes())?;
            Ok(())
        })
    }

    /// ページの確認用画像を書き出す（失敗時は None）
    pub fn write_overlay(
        &mut self,
        page_index: usize,
        page: &RgbImage,
        assignments: &[Assignment],
    ) -> Option<PathBuf> {
        let rendered = render_overlay(page, assignments, &self.style);
        let file_name = format!("{}_predict.jpg", page_index);
        self.write_or_warn(&file_name, |w| {
            rendered
                .write_to(w, ImageFormat::Jpeg)
                .map_err(|e| GraderError::Report(format!("JPEGエンコード失敗: {}", e)))
        })
    }

    fn write_or_warn<F>(&mut self, file_name: &str, write: F) -> Option<PathBuf>
    where
        F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
    {
        if !self.ensure_dir() {
            return None;
        }
        match write_atomically(&self.dir, file_name, write) {
            Ok(path) => {
                info!("wrote {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("{} の書き込みに失敗: {}", file_name, e);
                None
            }
        }
    }

    fn ensure_dir(&mut self) -> bool {
        if self.state == DirState::Pending {
            self.state = match std::fs::create_dir_all(&self.dir) {
                Ok(()) => DirState::Ready,
                Err(e) => {
                    warn!("ログフォルダを作成できません {}: {}", self.dir.display(), e);
                    DirState::Failed
                }
            };
        }
        self.state == DirState::Ready
    }
}

/// 一時ファイルに書いてから所定の名前に置き換える
///
/// 途中で失敗した場合、一時ファイルはドロップ時に削除される。
fn write_atomically<F>(dir: &Path, file_name: &str, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let path = dir.join(file_name);
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(&path).map_err(|e| GraderError::Io(e.error))?;
    Ok(path)
}
