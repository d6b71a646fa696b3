//! 批量任务状态 - 编排层
//!
//! 所有读写都通过 `JobHandle::read` / `JobHandle::update`，
//! 闭包执行期间持有同一把锁，保证计数器与结果列表一起变化：
//!
//! `successful + failed == results.len() <= current_index <= total`

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::JobError;
use crate::models::result::{MarkMap, ResultRecord};
use crate::models::subject::SubjectInfo;
use crate::models::{MarkToken, SubjectCode};

/// 批量任务的可观察状态
#[derive(Debug, Clone, Default)]
pub struct JobState {
    pub running: bool,
    pub total: usize,
    /// 已开始处理的学生数（从1开始）
    pub current_index: usize,
    pub successful: usize,
    pub failed: usize,
    pub current_student: Option<String>,
    /// 按名单顺序追加
    pub results: Vec<ResultRecord>,
    /// 最近一次生成的报告文件名
    pub result_file: Option<String>,
    pub subject_info: Option<SubjectInfo>,
}

impl JobState {
    fn record_result(&mut self, record: ResultRecord) {
        if record.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(record);
    }

    /// 用人工录入的成绩替换第 `index` 条记录
    fn apply_correction(&mut self, index: usize, marks: MarkMap) -> Result<(), JobError> {
        let len = self.results.len();
        let record = self
            .results
            .get_mut(index)
            .ok_or(JobError::IndexOutOfRange { index, len })?;

        let was_failed = !record.is_success();
        record.apply_manual(marks);
        if was_failed {
            self.failed -= 1;
            self.successful += 1;
        }
        Ok(())
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            total: self.total,
            current: self.current_index,
            running: self.running,
            successful: self.successful,
            failed: self.failed,
            current_student: self.current_student.clone(),
            failed_list: self
                .results
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.is_success())
                .map(|(index, record)| FailedEntry {
                    index,
                    record: record.clone(),
                })
                .collect(),
            result_file: self.result_file.clone(),
            result_expires_in: None,
            result_expires_at: None,
            result_expires_at_epoch: None,
        }
    }
}

/// 失败列表中的一项（`index` 用于人工修正）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEntry {
    pub index: usize,
    pub record: ResultRecord,
}

/// 状态查询的返回值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub total: usize,
    pub current: usize,
    pub running: bool,
    pub successful: usize,
    pub failed: usize,
    pub current_student: Option<String>,
    pub failed_list: Vec<FailedEntry>,
    pub result_file: Option<String>,
    /// 距离报告被清理的秒数
    pub result_expires_in: Option<i64>,
    /// 本地时间，仅用于显示
    pub result_expires_at: Option<String>,
    /// 过期时间（Unix 秒），与时区无关
    pub result_expires_at_epoch: Option<i64>,
}

impl StatusReport {
    /// 补充报告的过期时间
    ///
    /// # 参数
    /// - `expires_at`: 过期时间（Unix 秒）
    /// - `now`: 当前时间（Unix 秒）
    pub fn with_expiry(mut self, expires_at: Option<i64>, now: i64) -> Self {
        if let Some(expires_at) = expires_at {
            self.result_expires_in = Some((expires_at - now).max(0));
            self.result_expires_at_epoch = Some(expires_at);
            self.result_expires_at = chrono::DateTime::from_timestamp(expires_at, 0).map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            });
        }
        self
    }
}

/// 共享的任务状态句柄
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    inner: Arc<Mutex<JobState>>,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在锁内读取状态
    pub async fn read<R>(&self, f: impl FnOnce(&JobState) -> R) -> R {
        let state = self.inner.lock().await;
        f(&state)
    }

    /// 在锁内修改状态（一次调用即一个完整事务）
    pub async fn update<R>(&self, f: impl FnOnce(&mut JobState) -> R) -> R {
        let mut state = self.inner.lock().await;
        f(&mut state)
    }

    /// 开始新的批次：重置状态并标记为运行中
    ///
    /// 已知的学科信息保留到下一批次
    pub async fn begin(&self, total: usize) -> Result<(), JobError> {
        self.update(|state| {
            if state.running {
                return Err(JobError::AlreadyRunning);
            }
            *state = JobState {
                running: true,
                total,
                subject_info: state.subject_info.take(),
                ..JobState::default()
            };
            Ok(())
        })
        .await
    }

    /// 标记开始处理名单中的第 `index` 个学生（从0开始）
    pub async fn start_student(&self, index: usize, label: String) {
        self.update(|state| {
            state.current_index = index + 1;
            state.current_student = Some(label);
        })
        .await
    }

    /// 追加结果并更新计数器
    pub async fn record_result(&self, record: ResultRecord) {
        self.update(|state| state.record_result(record)).await
    }

    pub async fn set_result_file(&self, name: String) {
        self.update(|state| state.result_file = Some(name)).await
    }

    /// 报告被清理后清空指针（只清除指向被清理文件的指针）
    pub async fn clear_result_file(&self, evicted: &[String]) -> bool {
        self.update(|state| {
            let hit = state
                .result_file
                .as_ref()
                .is_some_and(|name| evicted.contains(name));
            if hit {
                state.result_file = None;
            }
            hit
        })
        .await
    }

    /// 批次结束（成功或出错都要调用）
    pub async fn finish(&self) {
        self.update(|state| {
            state.running = false;
            state.current_student = None;
        })
        .await
    }

    /// 应用人工修正
    ///
    /// # 参数
    /// - `index`: 结果列表中的位置
    /// - `text`: 每行 `CODE,NAME,TOTAL,OBTAINED`
    ///
    /// # 返回
    /// 修正后的全部结果和学科信息，用于重新生成报告
    pub async fn apply_correction(
        &self,
        index: usize,
        text: &str,
    ) -> Result<(Vec<ResultRecord>, Option<SubjectInfo>), JobError> {
        let marks = parse_correction(text);
        self.update(|state| {
            state.apply_correction(index, marks)?;
            Ok((state.results.clone(), state.subject_info.clone()))
        })
        .await
    }

    pub async fn status(&self) -> StatusReport {
        self.read(JobState::status_report).await
    }
}

/// 解析人工修正文本
///
/// 少于4个字段的行被忽略，只保留第4个字段（实得分）
pub fn parse_correction(text: &str) -> MarkMap {
    let mut marks = MarkMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 || fields[0].is_empty() {
            continue;
        }
        if let Some(token) = MarkToken::parse_manual(fields[3]) {
            marks.insert(SubjectCode::new(fields[0]), token);
        }
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::StudentRecord;

    fn student(name: &str, roll: &str) -> StudentRecord {
        StudentRecord::from_raw(name, roll, "5000").unwrap()
    }

    fn assert_invariant(state: &JobState) {
        assert_eq!(state.successful + state.failed, state.results.len());
        assert!(state.results.len() <= state.current_index);
        assert!(state.current_index <= state.total);
    }

    #[tokio::test]
    async fn test_begin_rejects_overlapping_batch() {
        let job = JobHandle::new();
        job.begin(2).await.unwrap();
        assert_eq!(job.begin(3).await, Err(JobError::AlreadyRunning));

        job.finish().await;
        assert!(job.begin(3).await.is_ok());
        assert_eq!(job.read(|s| s.total).await, 3);
    }

    #[tokio::test]
    async fn test_begin_resets_previous_run() {
        let job = JobHandle::new();
        job.begin(1).await.unwrap();
        job.start_student(0, "Alice".to_string()).await;
        job.record_result(ResultRecord::success(student("Alice", "101"), MarkMap::new()))
            .await;
        job.set_result_file("old.csv".to_string()).await;
        job.finish().await;

        job.begin(4).await.unwrap();
        job.read(|s| {
            assert!(s.results.is_empty());
            assert_eq!((s.successful, s.failed, s.current_index), (0, 0, 0));
            assert!(s.result_file.is_none());
            assert!(s.running);
        })
        .await;
    }

    #[tokio::test]
    async fn test_counters_follow_results() {
        let job = JobHandle::new();
        job.begin(2).await.unwrap();

        job.start_student(0, "Alice".to_string()).await;
        job.read(assert_invariant).await;
        job.record_result(ResultRecord::success(student("Alice", "101"), MarkMap::new()))
            .await;
        job.read(assert_invariant).await;

        job.start_student(1, "Bob".to_string()).await;
        job.record_result(ResultRecord::failed(student("Bob", "102"), "StageNotFound(view_link)"))
            .await;
        job.read(assert_invariant).await;

        let report = job.status().await;
        assert_eq!((report.successful, report.failed, report.current), (1, 1, 2));
        assert_eq!(report.failed_list.len(), 1);
        assert_eq!(report.failed_list[0].index, 1);
        assert_eq!(report.current_student.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn test_correction_moves_failed_to_successful() {
        let job = JobHandle::new();
        job.begin(1).await.unwrap();
        job.start_student(0, "Bob".to_string()).await;
        job.record_result(ResultRecord::failed(student("Bob", "102"), "StageNotFound(view_link)"))
            .await;

        let (results, _) = job
            .apply_correction(0, "CS-CS-101,Bob,100,40\nshort,line")
            .await
            .unwrap();

        assert_eq!(results[0].status.to_string(), "Success (manual)");
        assert_eq!(
            results[0].marks.get(&SubjectCode::from("CS-CS-101")),
            Some(&MarkToken::Numeric(40))
        );
        job.read(|s| {
            assert_eq!((s.successful, s.failed), (1, 0));
            assert_invariant(s);
        })
        .await;
    }

    #[tokio::test]
    async fn test_correction_out_of_range() {
        let job = JobHandle::new();
        let err = job.apply_correction(3, "A,B,100,50").await.unwrap_err();
        assert_eq!(err, JobError::IndexOutOfRange { index: 3, len: 0 });
    }

    #[tokio::test]
    async fn test_clear_result_file_only_when_evicted() {
        let job = JobHandle::new();
        job.set_result_file("a.csv".to_string()).await;

        assert!(!job.clear_result_file(&["b.csv".to_string()]).await);
        assert_eq!(job.read(|s| s.result_file.clone()).await.as_deref(), Some("a.csv"));

        assert!(job.clear_result_file(&["a.csv".to_string()]).await);
        assert!(job.read(|s| s.result_file.is_none()).await);
    }

    #[test]
    fn test_parse_correction() {
        let marks = parse_correction("CS-101, DS, 100, 29F\nCS-102,OS,100,AB\nCS-103,Net\n\n,x,y,z");
        assert_eq!(marks.len(), 2);
        assert_eq!(marks.get(&SubjectCode::from("CS-101")), Some(&MarkToken::NumericFail(29)));
        assert_eq!(marks.get(&SubjectCode::from("CS-102")), Some(&MarkToken::Fail));
    }

    #[test]
    fn test_status_report_expiry() {
        let report = JobState::default().status_report().with_expiry(Some(1_000), 400);
        assert_eq!(report.result_expires_in, Some(600));
        assert_eq!(report.result_expires_at_epoch, Some(1_000));
        assert!(report.result_expires_at.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result_expires_at_epoch"], 1_000);

        let report = JobState::default().status_report().with_expiry(None, 400);
        assert_eq!(report.result_expires_at_epoch, None);

        let report = JobState::default().status_report().with_expiry(Some(100), 400);
        assert_eq!(report.result_expires_in, Some(0));
    }
}
