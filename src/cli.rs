use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "omr-grader")]
#[command(about = "客観式答案用紙の自動採点ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 答案画像フォルダを採点してJSONを出力
    Grade {
        /// 答案画像（ページ）フォルダのパス
        #[arg(required = true)]
        pages: PathBuf,

        /// 試験ID（例: 2021_f_a）。省略時はリファレンスから対話選択
        #[arg(short, long)]
        exam: Option<String>,

        /// リファレンスアノテーション（COCO形式JSON）
        #[arg(short, long)]
        references: Option<PathBuf>,

        /// 検出結果JSONのフォルダ（デフォルト: ページフォルダ）
        #[arg(short, long)]
        detections: Option<PathBuf>,

        /// 正解データJSON
        #[arg(short, long)]
        answer_key: Option<PathBuf>,

        /// 出力JSONファイル（デフォルト: ページフォルダ/solution.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 確認用画像を保存
        #[arg(long)]
        save_images: bool,

        /// 予測ログ（CSV）を保存
        #[arg(long)]
        save_log: bool,

        /// ログ出力先（設定より優先）
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// 採用する最小IoU（設定より優先）
        #[arg(long)]
        threshold: Option<f64>,

        /// 照合前に除外する信頼度の下限（設定より優先）
        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// リファレンスの内容を表示
    Inspect {
        /// リファレンスアノテーション（COCO形式JSON）
        #[arg(short, long, required = true)]
        references: PathBuf,

        /// 試験ID（省略時は試験一覧を表示）
        #[arg(short, long)]
        exam: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// ログ出力先を設定
        #[arg(long)]
        set_log_dir: Option<PathBuf>,

        /// 最小IoUを設定
        #[arg(long)]
        set_threshold: Option<f64>,

        /// 信頼度の下限を設定
        #[arg(long)]
        set_min_confidence: Option<f64>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grade_flags() {
        let cli = Cli::parse_from([
            "omr-grader", "grade", "pages", "--exam", "2021_f_a", "--save-log", "--threshold", "0.4",
        ]);
        match cli.command {
            Commands::Grade { pages, exam, save_log, save_images, threshold, .. } => {
                assert_eq!(pages, PathBuf::from("pages"));
                assert_eq!(exam.as_deref(), Some("2021_f_a"));
                assert!(save_log);
                assert!(!save_images);
                assert_eq!(threshold, Some(0.4));
            }
            _ => panic!("grade として解析されていない"),
        }
    }

    #[test]
    fn test_parse_min_confidence_flags() {
        let cli = Cli::parse_from(["omr-grader", "grade", "pages", "--min-confidence", "0.5"]);
        match cli.command {
            Commands::Grade { min_confidence, threshold, .. } => {
                assert_eq!(min_confidence, Some(0.5));
                assert_eq!(threshold, None);
            }
            _ => panic!("grade として解析されていない"),
        }

        let cli = Cli::parse_from(["omr-grader", "config", "--set-min-confidence", "0.2"]);
        match cli.command {
            Commands::Config { set_min_confidence, .. } => assert_eq!(set_min_confidence, Some(0.2)),
            _ => panic!("config として解析されていない"),
        }
    }

    #[test]
    fn test_inspect_requires_references() {
        assert!(Cli::try_parse_from(["omr-grader", "inspect"]).is_err());
    }
}
