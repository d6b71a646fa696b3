//! 临时文件生命周期管理 - 编排层
//!
//! 上传的名单和生成的报告都只保留一段时间：
//!
//! - 登记时写入过期时间（Unix 秒），台账在每次变更后落盘
//! - 后台任务定期清理过期文件，并清除指向已删除报告的指针
//! - 重启后加载台账时，已过期的条目直接丢弃

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::job_state::JobHandle;
use crate::error::{AppError, AppResult, FileError};
use crate::models::result::ResultRecord;
use crate::models::subject::SubjectInfo;
use crate::services::ReportWriter;

/// 台账使用的时钟（Unix 秒）
///
/// 启动时取一次墙上时间，之后按 tokio 的单调时钟推进。
/// 测试中暂停的 tokio 时间会同步推进这个时钟。
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: i64,
    started: tokio::time::Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp())
    }

    /// 从指定的 Unix 秒开始计时
    pub fn starting_at(epoch: i64) -> Self {
        Self {
            epoch,
            started: tokio::time::Instant::now(),
        }
    }

    pub fn now(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_secs()).unwrap_or(i64::MAX / 2);
        self.epoch + elapsed
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// 文件所属的命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// 上传的名单
    Uploads,
    /// 生成的报告
    Results,
}

/// 过期台账：文件名 → 过期时间
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryLedger {
    #[serde(default)]
    pub uploads: BTreeMap<String, i64>,
    #[serde(default)]
    pub results: BTreeMap<String, i64>,
}

impl ExpiryLedger {
    fn entries(&self, namespace: Namespace) -> &BTreeMap<String, i64> {
        match namespace {
            Namespace::Uploads => &self.uploads,
            Namespace::Results => &self.results,
        }
    }

    fn entries_mut(&mut self, namespace: Namespace) -> &mut BTreeMap<String, i64> {
        match namespace {
            Namespace::Uploads => &mut self.uploads,
            Namespace::Results => &mut self.results,
        }
    }

    /// 移除并返回所有到期条目
    fn take_expired(&mut self, namespace: Namespace, now: i64) -> Vec<String> {
        let entries = self.entries_mut(namespace);
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            entries.remove(name);
        }
        expired
    }
}

/// 一次清理的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub uploads: Vec<String>,
    pub results: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.results.is_empty()
    }
}

/// 临时文件管理器
pub struct ArtifactManager {
    ledger: Mutex<ExpiryLedger>,
    ledger_path: PathBuf,
    upload_dir: PathBuf,
    writer: ReportWriter,
    upload_ttl: Duration,
    result_ttl: Duration,
    job: JobHandle,
    clock: Clock,
}

impl ArtifactManager {
    /// 加载台账（文件不存在或损坏时从空台账开始）
    ///
    /// # 参数
    /// - `ledger_path`: 台账文件
    /// - `upload_dir` / `output_dir`: 两个命名空间对应的目录
    /// - `upload_ttl` / `result_ttl`: 两类文件的保留时间
    /// - `job`: 任务状态（清理报告时清除指针）
    pub async fn load(
        ledger_path: impl Into<PathBuf>,
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        upload_ttl: Duration,
        result_ttl: Duration,
        job: JobHandle,
    ) -> Self {
        Self::load_with_clock(ledger_path, upload_dir, output_dir, upload_ttl, result_ttl, job, Clock::new())
            .await
    }

    /// 同 [`ArtifactManager::load`]，使用指定的时钟
    pub async fn load_with_clock(
        ledger_path: impl Into<PathBuf>,
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        upload_ttl: Duration,
        result_ttl: Duration,
        job: JobHandle,
        clock: Clock,
    ) -> Self {
        let ledger_path = ledger_path.into();
        let mut ledger = match tokio::fs::read_to_string(&ledger_path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("⚠️ 过期台账损坏，重新开始: {}", e);
                ExpiryLedger::default()
            }),
            Err(_) => ExpiryLedger::default(),
        };

        let now = clock.now();
        let dropped = ledger.take_expired(Namespace::Uploads, now).len()
            + ledger.take_expired(Namespace::Results, now).len();
        if dropped > 0 {
            debug!("加载台账时丢弃 {} 个已过期条目", dropped);
        }

        let manager = Self {
            ledger: Mutex::new(ledger),
            ledger_path,
            upload_dir: upload_dir.into(),
            writer: ReportWriter::new(output_dir),
            upload_ttl,
            result_ttl,
            job,
            clock,
        };
        let snapshot = manager.ledger.lock().await.clone();
        manager.persist(&snapshot).await;
        manager
    }

    /// 当前时间（Unix 秒）
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn dir(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::Uploads => &self.upload_dir,
            Namespace::Results => self.writer.output_dir(),
        }
    }

    /// 台账写入失败只记录日志
    async fn persist(&self, ledger: &ExpiryLedger) {
        let result = match serde_json::to_string_pretty(ledger) {
            Ok(json) => tokio::fs::write(&self.ledger_path, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("⚠️ 保存过期台账失败 ({}): {}", self.ledger_path.display(), e);
        }
    }

    /// 登记文件
    ///
    /// # 返回
    /// 过期时间（Unix 秒）
    pub async fn register(&self, name: &str, namespace: Namespace, ttl: Duration) -> i64 {
        let expires_at = self.now() + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let mut ledger = self.ledger.lock().await;
        ledger
            .entries_mut(namespace)
            .insert(name.to_string(), expires_at);
        self.persist(&ledger).await;
        expires_at
    }

    pub async fn expires_at(&self, name: &str, namespace: Namespace) -> Option<i64> {
        self.ledger.lock().await.entries(namespace).get(name).copied()
    }

    /// 清理在 `now` 之前到期的文件
    pub async fn sweep_at(&self, now: i64) -> SweepReport {
        let report = {
            let mut ledger = self.ledger.lock().await;
            let report = SweepReport {
                uploads: ledger.take_expired(Namespace::Uploads, now),
                results: ledger.take_expired(Namespace::Results, now),
            };
            if !report.is_empty() {
                self.persist(&ledger).await;
            }
            report
        };

        for (namespace, names) in [
            (Namespace::Uploads, &report.uploads),
            (Namespace::Results, &report.results),
        ] {
            for name in names {
                let path = self.dir(namespace).join(name);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => info!("🗑️ 已清理过期文件: {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => debug!(
                        "{}",
                        FileError::DeleteFailed {
                            path: path.display().to_string(),
                            source: Box::new(e),
                        }
                    ),
                }
            }
        }

        if !report.results.is_empty() && self.job.clear_result_file(&report.results).await {
            info!("当前报告已过期，清除报告指针");
        }
        report
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(self.now()).await
    }

    /// 启动后台清理任务
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                manager.sweep().await;
            }
        })
    }

    /// 把名单复制到上传目录并登记
    ///
    /// # 返回
    /// 上传目录中的副本路径
    pub async fn ingest_upload(&self, source: &Path) -> AppResult<PathBuf> {
        let name = format!("upload_{}.csv", uuid::Uuid::new_v4());
        let target = self.upload_dir.join(&name);
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| AppError::file_read_failed(source.display().to_string(), e))?;
        self.register(&name, Namespace::Uploads, self.upload_ttl).await;
        debug!("名单已保存为 {}", target.display());
        Ok(target)
    }

    /// 写出报告、登记并更新报告指针
    pub async fn publish_report(
        &self,
        name: String,
        records: &[ResultRecord],
        info: Option<&SubjectInfo>,
    ) -> AppResult<PathBuf> {
        let path = self.writer.write(&name, records, info).await?;
        self.register(&name, Namespace::Results, self.result_ttl).await;
        self.job.set_result_file(name).await;
        Ok(path)
    }
}
