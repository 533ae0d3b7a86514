use clap::Parser;
use omr_grader::{cli, config, detection, error, exam_selector, logging, pipeline, scanner, scoring};
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use omr_grader_common::ReferenceStore;
use pipeline::{GradeSettings, SolutionFile};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Grade {
            pages,
            exam,
            references,
            detections,
            answer_key,
            output,
            save_images,
            save_log,
            log_dir,
            threshold,
            min_confidence,
        } => {
            println!("📝 omr-grader - 採点\n");

            // 1. ページ読込
            println!("[1/4] 答案画像を読み込み中...");
            let images = scanner::scan_pages(&pages)?;
            if images.is_empty() {
                return Err(error::GraderError::NoImagesFound(pages.display().to_string()));
            }
            let loaded = scanner::load_pages(&images)?;
            println!("✔ {}ページを読み込み\n", loaded.len());

            // 2. リファレンス・試験の選択
            println!("[2/4] リファレンスを確認中...");
            let store = match references {
                Some(path) => match ReferenceStore::from_path(&path) {
                    Ok(store) => Some(store),
                    Err(e) => {
                        println!("⚠ リファレンスを読み込めません: {}", e);
                        None
                    }
                },
                None => None,
            };
            let exam = match (exam, store.as_ref()) {
                (Some(exam), _) => Some(exam),
                (None, Some(store)) => Some(exam_selector::select_exam_interactive(store)?),
                (None, None) => None,
            };

            let config = config.with_overrides(threshold, min_confidence)?;
            let mut settings = GradeSettings::from_config(&config);
            settings.save_images = save_images;
            settings.save_log = save_log;

            let plan = pipeline::plan_strategy(store.as_ref(), exam.as_deref(), &settings)?;
            println!("✔ 照合方式: {}\n", plan.strategy);

            // 3. 照合
            println!("[3/4] 照合中...");
            let detections_dir =
                detections.unwrap_or_else(|| detection::default_detections_dir(&pages));
            let detector = detection::SidecarDetector::new(detections_dir);
            let mut reporter = (save_images || save_log).then(|| {
                let dir = log_dir.unwrap_or_else(|| config.log_dir.clone());
                pipeline::build_reporter(&dir, config.font_path.as_deref())
            });
            let outcome =
                pipeline::grade_pages(&loaded, plan, &detector, &settings, reporter.as_mut())?;
            println!(
                "✔ {}問を照合（未回答 {}問）\n",
                outcome.solution.len(),
                outcome.solution.unanswered_count()
            );

            // 4. 採点・保存
            println!("[4/4] 結果を保存中...");
            let score = match answer_key {
                Some(path) => {
                    let key = scoring::AnswerKey::from_path(&path)?;
                    if key.is_empty() {
                        println!("⚠ 正解データに問題がありません: {}", path.display());
                    } else {
                        println!("- 正解データ: {}問", key.len());
                    }
                    let report = scoring::score(&outcome.solution, &key);
                    println!("✔ 正答 {}/{}", report.correct, report.total);
                    Some(report)
                }
                None => None,
            };

            let output = output.unwrap_or_else(|| pipeline::default_output_path(&pages));
            SolutionFile::new(exam.as_deref(), &outcome, score.as_ref()).save(&output)?;
            println!("✔ 結果を保存: {}", output.display());
            if let Some(reporter) = &reporter {
                println!("  診断出力: {}", reporter.dir().display());
            }

            println!("\n✅ 採点完了");
        }

        Commands::Inspect { references, exam } => {
            let store = ReferenceStore::from_path(&references)?;

            match exam {
                None => {
                    println!("試験一覧 ({}ページ):", store.len());
                    for id in store.exam_ids() {
                        println!("  {} ({}ページ)", id, store.regions_for_exam(&id).len());
                    }
                }
                Some(exam) => {
                    let pages = store.require_exam(&exam)?;
                    println!("試験 {}:", exam);
                    for page in pages {
                        let questions: Vec<String> = page
                            .questions()
                            .filter_map(|q| q.question_id())
                            .map(|id| id.to_string())
                            .collect();
                        println!(
                            "  {} ({}x{}) 問題: [{}] 解答領域: {}",
                            page.record.file_name,
                            page.record.width,
                            page.record.height,
                            questions.join(", "),
                            page.answers().count()
                        );
                    }
                }
            }
        }

        Commands::Config { set_log_dir, set_threshold, set_min_confidence, show } => {
            let mut config = config;

            if let Some(dir) = set_log_dir {
                config.set_log_dir(dir)?;
                println!("✔ ログ出力先を設定しました");
            }

            if let Some(threshold) = set_threshold {
                config.set_threshold(threshold)?;
                println!("✔ 最小IoUを設定しました");
            }

            if let Some(min_confidence) = set_min_confidence {
                config.set_min_confidence(min_confidence)?;
                println!("✔ 信頼度の下限を設定しました");
            }

            if show {
                println!("設定:");
                println!("  ログ出力先: {}", config.log_dir.display());
                println!("  最小IoU: {}", config.match_iou_threshold);
                println!("  信頼度の下限: {}", config.min_confidence);
                println!("  問題マーカーのクラスID: {}", config.question_class_id);
                println!(
                    "  フォント: {}",
                    config
                        .font_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "未設定".into())
                );
            }
        }
    }

    Ok(())
}
