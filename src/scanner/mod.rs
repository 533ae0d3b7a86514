use crate::error::{GraderError, Result};
use image::RgbImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 答案の1ページ（画像ファイル）
#[derive(Debug, Clone)]
pub struct PageImage {
    pub path: PathBuf,
    pub file_name: String,
}

impl PageImage {
    /// 拡張子を除いたファイル名（検出結果JSONの対応付けに使う）
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

/// デコード済みのページ
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub index: usize,
    pub info: PageImage,
    pub image: RgbImage,
}

impl LoadedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "JPG", "JPEG", "PNG"];

/// フォルダ直下の答案画像をファイル名順に列挙
///
/// ページ順 = ファイル名順で、問題番号の振り順もこれに従う。
pub fn scan_pages(folder: &Path) -> Result<Vec<PageImage>> {
    if !folder.exists() {
        return Err(GraderError::FolderNotFound(folder.display().to_string()));
    }

    let mut pages = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy();
            if IMAGE_EXTENSIONS.iter().any(|&e| e == ext_str) {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                pages.push(PageImage {
                    path: path.to_path_buf(),
                    file_name,
                });
            }
        }
    }

    // ファイル名でソート
    pages.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(pages)
}

/// 画像を並列にデコード（結果はページ順のまま）
pub fn load_pages(pages: &[PageImage]) -> Result<Vec<LoadedPage>> {
    pages
        .par_iter()
        .enumerate()
        .map(|(index, info)| {
            let image = image::open(&info.path)
                .map_err(|e| GraderError::ImageLoad(format!("{}: {}", info.path.display(), e)))?
                .to_rgb8();
            Ok(LoadedPage {
                index,
                info: info.clone(),
                image,
            })
        })
        .collect()
}
