use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use smart_cp::orchestrator::MergeOutcome;
use smart_cp::utils::logging;
use smart_cp::{Config, MergeProcessor};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        let program = args.first().map(String::as_str).unwrap_or("smart_cp");
        eprintln!("Usage: {} <base_cp_path> <recap_path> <output_path>", program);
        return ExitCode::FAILURE;
    }

    let base_path = PathBuf::from(&args[1]);
    let recap_path = PathBuf::from(&args[2]);
    let output_path = PathBuf::from(&args[3]);

    logging::log_startup(&base_path, &recap_path, &output_path);

    match run(&base_path, &recap_path, &output_path).await {
        Ok(outcome) => {
            logging::print_final_stats(
                outcome.mode.label(),
                outcome.applied_changes(),
                outcome.instructions.len(),
            );
            println!(
                "Successfully processed documents. Changes: {}",
                outcome.instructions.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {:#}", e);
            println!("Failed to process documents");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    base_path: &Path,
    recap_path: &Path,
    output_path: &Path,
) -> Result<MergeOutcome> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    let processor = MergeProcessor::new(&config).context("创建处理器失败")?;
    let outcome = processor
        .process(base_path, recap_path, output_path)
        .await
        .context("处理文档失败")?;

    Ok(outcome)
}
