//! 診断ログの初期化
//!
//! 進捗表示は main の println!、診断は tracing。`RUST_LOG` があればそちらを優先。

use tracing_subscriber::EnvFilter;

/// `-v` の有無に応じたデフォルトのフィルタ
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "omr_grader=debug,omr_grader_common=debug"
    } else {
        "warn"
    }
}

pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // テストなどで二重に初期化されても無視する
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
