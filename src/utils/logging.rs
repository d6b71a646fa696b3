use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::job_state::StatusReport;

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 `debug` 或 `info`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // 重复初始化（如测试中）直接忽略
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n成绩下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 成绩批量下载模式");
    info!("🌐 查询页: {}", config.result_url);
    match config.browser_debug_port {
        Some(port) => info!("🔌 连接已有浏览器 (端口: {})", port),
        None => info!("🖥️ 使用无头浏览器"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录名单加载信息
///
/// # 参数
/// - `total`: 学生人数
/// - `snapshot_every`: 快照间隔
pub fn log_roster_loaded(total: usize, snapshot_every: usize) {
    info!("✓ 名单中共有 {} 名学生", total);
    info!("💾 每处理 {} 名学生保存一次报告\n", snapshot_every);
}

/// 记录一次进度
pub fn log_status(report: &StatusReport) {
    info!(
        "⏳ 进度 {}/{} | 成功 {} | 失败 {} | 当前: {}",
        report.current,
        report.total,
        report.successful,
        report.failed,
        truncate_text(report.current_student.as_deref().unwrap_or("-"), 40)
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 最终状态
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(report: &StatusReport, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📋 名单人数: {}", report.total);
    info!("🔄 已处理: {}", report.current);
    info!("✅ 成功: {}/{}", report.successful, report.total);
    info!("❌ 失败: {}", report.failed);
    for entry in &report.failed_list {
        info!("   #{} {} - {}", entry.index, entry.record.student, entry.record.status);
    }
    match &report.result_file {
        Some(file) => info!("📄 报告文件: {}", file),
        None => info!("📄 没有可用的报告文件"),
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
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
