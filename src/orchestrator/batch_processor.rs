//! 批量成绩处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量任务的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、输出目录、过期台账、后台清理任务
//! 2. **名单接收**：复制到上传目录并登记过期时间
//! 3. **顺序处理**：整个批次只用一个浏览器会话，按名单顺序逐个查询
//! 4. **定期快照**：每 N 个学生和最后一个学生之后写出报告
//! 5. **资源管理**：任何退出路径都释放浏览器会话、清除运行标记
//! 6. **人工修正**：替换失败记录的成绩并重新生成报告
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个学生的细节
//! - **单任务**：同一时间只允许一个批次
//! - **向下委托**：委托 student_processor 处理单个学生

use anyhow::{Context, Result};
use chrono::Local;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::artifact_lifecycle::{ArtifactManager, Namespace};
use super::job_state::{JobHandle, StatusReport};
use super::student_processor::process_student;
use crate::browser::ChromeProvider;
use crate::config::Config;
use crate::error::{AppError, AppResult, JobError};
use crate::infrastructure::{BrowserSession, SessionProvider};
use crate::models::subject::SubjectInfo;
use crate::models::{load_roster, load_subject_info, StudentRecord};
use crate::services::report_writer::{dashboard_name, snapshot_name};
use crate::utils::logging::{
    init_log_file, log_roster_loaded, log_startup, log_status, print_final_stats,
};
use crate::workflow::{NavigationTimings, ResultFlow, StudentCtx};

/// 批次统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub snapshots_written: usize,
    /// 报告写入失败次数（不中断批次）
    pub snapshot_failures: usize,
}

/// 处理完第 `done` 个学生后是否需要写快照
pub fn is_snapshot_point(done: usize, total: usize, every: usize) -> bool {
    done == total || (every > 0 && done % every == 0)
}

/// 把 panic 负载转成任务错误
fn panic_error(payload: Box<dyn Any + Send>) -> AppError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知原因".to_string());
    JobError::Panicked { message }.into()
}

/// 单个批次的执行者
pub struct BatchProcessor<P: SessionProvider> {
    provider: P,
    job: JobHandle,
    artifacts: Arc<ArtifactManager>,
    flow: ResultFlow,
    base_url: String,
    class_name: String,
    semester: String,
    snapshot_every: usize,
}

impl<P: SessionProvider> BatchProcessor<P> {
    pub fn new(provider: P, job: JobHandle, artifacts: Arc<ArtifactManager>, config: &Config) -> Self {
        Self {
            provider,
            job,
            artifacts,
            flow: ResultFlow::new(NavigationTimings::from(config)),
            base_url: config.result_url.clone(),
            class_name: config.class_name.clone(),
            semester: config.semester.clone(),
            snapshot_every: config.snapshot_every,
        }
    }

    /// 运行一个批次
    ///
    /// # 返回
    /// 批次统计；已有批次在运行、名单为空或无法获取浏览器时返回错误
    pub async fn run(&self, students: Vec<StudentRecord>) -> AppResult<BatchSummary> {
        if students.is_empty() {
            return Err(JobError::EmptyRoster.into());
        }
        self.job.begin(students.len()).await?;

        // 运行标记必须在任何退出路径上清除，包括 panic
        let result = AssertUnwindSafe(self.run_with_session(&students))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_error(payload)));
        self.job.finish().await;

        match &result {
            Ok(summary) => info!(
                "🏁 批次完成: 成功 {} / 失败 {} / 共 {}",
                summary.successful, summary.failed, summary.processed
            ),
            Err(e) => error!("❌ 批次中止: {}", e),
        }
        result
    }

    async fn run_with_session(&self, students: &[StudentRecord]) -> AppResult<BatchSummary> {
        let session = self.provider.acquire().await?;
        let result = AssertUnwindSafe(self.process_all(&session, students))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_error(payload)));
        self.provider.release(session).await;
        result
    }

    async fn process_all(
        &self,
        session: &dyn BrowserSession,
        students: &[StudentRecord],
    ) -> AppResult<BatchSummary> {
        // 每个学生开始前都会重新打开查询页，这里失败不终止批次
        if let Err(e) = session.goto(&self.base_url).await {
            warn!("⚠️ 打开查询页失败，继续处理: {}", e);
        }

        let total = students.len();
        let mut summary = BatchSummary::default();

        for (index, student) in students.iter().enumerate() {
            let ctx = StudentCtx::new(index + 1, total, student);
            self.job.start_student(index, student.to_string()).await;
            info!("{} 🔍 开始查询", ctx);

            self.reset_page(session, &ctx).await;

            let record = process_student(&self.flow, session, student, &ctx).await;
            if record.is_success() {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            summary.processed += 1;
            self.job.record_result(record).await;

            if is_snapshot_point(index + 1, total, self.snapshot_every) {
                self.save_snapshot(&mut summary).await;
            }
        }

        Ok(summary)
    }

    /// 清除上一个学生留下的会话状态并回到查询页；失败只记录日志
    async fn reset_page(&self, session: &dyn BrowserSession, ctx: &StudentCtx) {
        if let Err(e) = session.clear_browsing_data().await {
            warn!("{} ⚠️ 清除浏览器数据失败: {}", ctx, e);
        }
        if let Err(e) = session.goto(&self.base_url).await {
            warn!("{} ⚠️ 重新打开查询页失败: {}", ctx, e);
        }
    }

    async fn save_snapshot(&self, summary: &mut BatchSummary) {
        let name = snapshot_name(&self.class_name, &self.semester, Local::now());
        let (records, info) = self
            .job
            .read(|s| (s.results.clone(), s.subject_info.clone()))
            .await;

        match self.artifacts.publish_report(name, &records, info.as_ref()).await {
            Ok(path) => {
                summary.snapshots_written += 1;
                info!("💾 报告已保存: {} ({} 条记录)", path.display(), records.len());
            }
            Err(e) => {
                summary.snapshot_failures += 1;
                error!("❌ 保存报告失败: {}", e);
            }
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    job: JobHandle,
    artifacts: Arc<ArtifactManager>,
    sweeper: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        for dir in [&config.upload_dir, &config.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("无法创建目录: {}", dir.display()))?;
        }

        let job = JobHandle::new();
        let artifacts = Arc::new(
            ArtifactManager::load(
                &config.expiry_file,
                &config.upload_dir,
                &config.output_dir,
                config.upload_ttl,
                config.result_ttl,
                job.clone(),
            )
            .await,
        );
        let sweeper = artifacts.spawn_sweeper(config.sweep_interval);

        Ok(Self {
            config,
            job,
            artifacts,
            sweeper,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    pub fn artifacts(&self) -> &Arc<ArtifactManager> {
        &self.artifacts
    }

    /// 接收名单：保存副本并解析
    pub async fn ingest_roster(&self, source: &Path) -> Result<Vec<StudentRecord>> {
        info!("\n📁 正在读取学生名单: {}", source.display());
        let upload = self.artifacts.ingest_upload(source).await?;
        load_roster(&upload).await
    }

    /// 在后台任务中运行一个批次
    pub fn spawn_batch<P>(&self, provider: P, students: Vec<StudentRecord>) -> JoinHandle<AppResult<BatchSummary>>
    where
        P: SessionProvider + 'static,
    {
        let processor = BatchProcessor::new(provider, self.job.clone(), self.artifacts.clone(), &self.config);
        tokio::spawn(async move { processor.run(students).await })
    }

    /// 查询当前状态（含报告过期时间）
    pub async fn status(&self) -> StatusReport {
        let report = self.job.status().await;
        let expires_at = match &report.result_file {
            Some(file) => self.artifacts.expires_at(file, Namespace::Results).await,
            None => None,
        };
        report.with_expiry(expires_at, self.artifacts.now())
    }

    /// 人工修正一条记录并重新生成报告
    ///
    /// # 参数
    /// - `index`: 结果列表中的位置
    /// - `text`: 每行 `CODE,NAME,TOTAL,OBTAINED`
    pub async fn apply_correction(&self, index: usize, text: &str) -> AppResult<PathBuf> {
        let (records, info) = self.job.apply_correction(index, text).await?;
        let path = self
            .artifacts
            .publish_report(dashboard_name(Local::now()), &records, info.as_ref())
            .await?;
        info!("✏️ 第 {} 条记录已人工修正，报告已更新: {}", index, path.display());
        Ok(path)
    }

    /// 应用学科信息并重新生成报告
    ///
    /// # 返回
    /// 没有任何结果时不生成报告，返回 `None`
    pub async fn apply_subject_info(&self, info: SubjectInfo) -> AppResult<Option<PathBuf>> {
        let records = self
            .job
            .update(|s| {
                s.subject_info = Some(info.clone());
                s.results.clone()
            })
            .await;
        if records.is_empty() {
            return Ok(None);
        }

        let name = snapshot_name(&self.config.class_name, &self.config.semester, Local::now());
        let path = self.artifacts.publish_report(name, &records, Some(&info)).await?;
        info!("📐 已应用 {} 门学科信息，报告已更新: {}", info.len(), path.display());
        Ok(Some(path))
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        let students = self.ingest_roster(Path::new(&self.config.roster_file)).await?;

        if students.is_empty() {
            warn!("⚠️ 名单中没有有效的学生记录，程序结束");
            self.shutdown().await;
            return Ok(());
        }

        log_roster_loaded(students.len(), self.config.snapshot_every);

        let provider = ChromeProvider::new(&self.config);
        let mut batch = self.spawn_batch(provider, students);

        let mut ticker = tokio::time::interval(self.config.status_interval);
        ticker.tick().await;
        let joined = loop {
            tokio::select! {
                joined = &mut batch => break joined,
                _ = ticker.tick() => log_status(&self.status().await),
            }
        };
        let outcome = joined.context("批量任务异常退出")?;

        if let Some(path) = &self.config.subject_info_file {
            match load_subject_info(Path::new(path)).await {
                Ok(info) => {
                    if let Err(e) = self.apply_subject_info(info).await {
                        error!("❌ 应用学科信息失败: {}", e);
                    }
                }
                Err(e) => warn!("⚠️ 无法加载学科信息: {:#}", e),
            }
        }

        print_final_stats(&self.status().await, &self.config.output_log_file);
        self.shutdown().await;

        outcome?;
        Ok(())
    }

    /// 停止后台清理并做最后一次清理
    pub async fn shutdown(self) {
        self.sweeper.abort();
        self.artifacts.sweep().await;
    }
}
