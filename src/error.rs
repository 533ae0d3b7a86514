use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraderError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("検出結果の読み込みエラー: {0}")]
    Detection(String),

    #[error("レポート出力エラー: {0}")]
    Report(String),

    #[error("正解データが不正: {0}")]
    InvalidAnswerKey(String),

    #[error("試験の選択が中断されました")]
    SelectionCancelled,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] omr_grader_common::Error),
}

impl GraderError {
    /// 試験が見つからない（幾何マッチングへのフォールバック対象）
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraderError::Common(omr_grader_common::Error::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, GraderError>;
