//! # Result Downloader
//!
//! 从考试成绩查询网站批量下载学生成绩的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `BrowserSession` - 页面动作抽象（填写、点击、读取内容）
//! - `ChromeSession` - 基于 `JsExecutor` 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `extractor` - 从结果页 HTML 中提取科目成绩
//! - `ReportWriter` - 写 CSV 报告能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"查一个学生"的完整流程
//! - `Stage` - 阶段与转移表
//! - `ResultFlow` - 流程编排（填写 → 提交 → 确认 → View → 等待 → 提取）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理会话、快照和任务状态
//! - `orchestrator/student_processor` - 单个学生处理器
//! - `orchestrator/artifact_lifecycle` - 临时文件过期清理
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::ChromeProvider;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{BrowserSession, JsExecutor, Locator, SessionProvider};
pub use models::{MarkToken, ResultRecord, ResultStatus, StudentRecord, SubjectCode};
pub use orchestrator::{App, BatchProcessor, BatchSummary, JobHandle, StatusReport};
pub use services::extract;
pub use workflow::{ResultFlow, Stage};
