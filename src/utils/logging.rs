/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 默认级别为 `info`，可通过 `RUST_LOG` 覆盖。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(base_path: &Path, recap_path: &Path, output_path: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - Smart CP Generator");
    info!("📄 Base CP: {}", base_path.display());
    info!("📄 Recap:   {}", recap_path.display());
    info!("💾 输出:    {}", output_path.display());
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `mode`: 处理方式（替换 / 兜底）
/// - `applied`: 实际写入文档的变更数
/// - `instructions`: 使用的指令条数
pub fn print_final_stats(mode: &str, applied: usize, instructions: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🛠  处理方式: {}", mode);
    info!("✅ 写入变更: {}", applied);
    info!("📋 指令条数: {}", instructions);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("USD 10,000 per day", 3), "USD...");
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("租船合同", 2), "租船...");
    }
}
