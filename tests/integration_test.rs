use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use result_downloader::error::{AppError, BrowserError, JobError};
use result_downloader::infrastructure::{BrowserSession, Locator, SessionProvider};
use result_downloader::orchestrator::Namespace;
use result_downloader::workflow::result_flow::{
    CONFIRM_BUTTONS, REGISTRATION_INPUT, RESULT_TABLE, ROLL_INPUT, SUBMIT_BUTTON, VIEW_LINK,
};
use result_downloader::{App, AppResult, ChromeProvider, Config, MarkToken, StudentRecord, SubjectCode};

// ========== 模拟的成绩查询网站 ==========

/// 每个学号在网站上的表现
#[derive(Clone)]
enum Scenario {
    /// 正常显示结果页
    Result(String),
    /// 列表页没有 View 链接
    NoViewLink,
    /// 读取结果页时会话崩溃
    Crash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimPage {
    Form,
    Confirm,
    List,
    Result,
}

struct SimState {
    page: SimPage,
    roll: String,
}

/// 脚本化的浏览器会话：表单 → (确认) → 列表 → 结果
struct PortalSession {
    scenarios: Arc<HashMap<String, Scenario>>,
    with_confirm: bool,
    /// 下一次打开页面失败
    fail_goto: AtomicBool,
    state: Mutex<SimState>,
}

impl PortalSession {
    fn scenario(&self, roll: &str) -> Option<Scenario> {
        self.scenarios.get(roll).cloned()
    }
}

#[async_trait]
impl BrowserSession for PortalSession {
    async fn goto(&self, url: &str) -> AppResult<()> {
        if self.fail_goto.swap(false, Ordering::SeqCst) {
            return Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                source: "connection reset".into(),
            }
            .into());
        }
        let mut state = self.state.lock().unwrap();
        state.page = SimPage::Form;
        state.roll.clear();
        Ok(())
    }

    async fn clear_browsing_data(&self) -> AppResult<()> {
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> AppResult<usize> {
        let state = self.state.lock().unwrap();
        let present = match state.page {
            SimPage::Form => [ROLL_INPUT, REGISTRATION_INPUT, SUBMIT_BUTTON].contains(locator),
            SimPage::Confirm => *locator == CONFIRM_BUTTONS[1],
            SimPage::List => {
                *locator == VIEW_LINK
                    && matches!(
                        self.scenario(&state.roll),
                        Some(Scenario::Result(_) | Scenario::Crash)
                    )
            }
            SimPage::Result => *locator == RESULT_TABLE,
        };
        Ok(usize::from(present))
    }

    async fn fill(&self, locator: &Locator, value: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if *locator == ROLL_INPUT {
            state.roll = value.to_string();
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.page = match (state.page, *locator) {
            (SimPage::Form, l) if l == SUBMIT_BUTTON => {
                if self.with_confirm {
                    SimPage::Confirm
                } else {
                    SimPage::List
                }
            }
            (SimPage::Confirm, _) => SimPage::List,
            (SimPage::List, l) if l == VIEW_LINK => SimPage::Result,
            (page, _) => page,
        };
        Ok(())
    }

    async fn ready_state(&self) -> AppResult<String> {
        Ok("complete".to_string())
    }

    async fn content(&self) -> AppResult<String> {
        let (page, scenario) = {
            let state = self.state.lock().unwrap();
            (state.page, self.scenario(&state.roll))
        };
        match (page, scenario) {
            (SimPage::Result, Some(Scenario::Result(html))) => Ok(html),
            (SimPage::Result, Some(Scenario::Crash)) => panic!("renderer crashed"),
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }
}

#[derive(Clone)]
struct PortalProvider {
    scenarios: Arc<HashMap<String, Scenario>>,
    with_confirm: bool,
    fail_acquire: bool,
    fail_first_goto: bool,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl PortalProvider {
    fn new(scenarios: &[(&str, Scenario)]) -> Self {
        Self {
            scenarios: Arc::new(
                scenarios
                    .iter()
                    .map(|(roll, s)| (roll.to_string(), s.clone()))
                    .collect(),
            ),
            with_confirm: false,
            fail_acquire: false,
            fail_first_goto: false,
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SessionProvider for PortalProvider {
    type Session = PortalSession;

    async fn acquire(&self) -> AppResult<PortalSession> {
        if self.fail_acquire {
            return Err(BrowserError::ConfigurationFailed {
                message: "no chrome".to_string(),
            }
            .into());
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(PortalSession {
            scenarios: self.scenarios.clone(),
            with_confirm: self.with_confirm,
            fail_goto: AtomicBool::new(self.fail_first_goto),
            state: Mutex::new(SimState {
                page: SimPage::Form,
                roll: String::new(),
            }),
        })
    }

    async fn release(&self, _session: PortalSession) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ========== 辅助函数 ==========

fn result_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(code, mark)| format!("<tr><td>{}: Theory</td><td>100</td><td>{}</td></tr>", code, mark))
        .collect();
    format!(
        "<html><body><table><tr><th>Subject</th><th>Max Marks</th><th>Total</th></tr>{}</table></body></html>",
        body
    )
}

fn test_config(dir: &Path) -> Config {
    Config {
        upload_dir: dir.join("uploads"),
        output_dir: dir.join("outputs"),
        expiry_file: dir.join(".expiries.json"),
        output_log_file: dir.join("output.txt").display().to_string(),
        class_name: "BTech".to_string(),
        semester: "Sem4".to_string(),
        ..Config::default()
    }
}

fn student(name: &str, roll: &str, registration: &str) -> StudentRecord {
    StudentRecord::from_raw(name, roll, registration).unwrap()
}

fn alice_and_bob() -> (PortalProvider, Vec<StudentRecord>) {
    let provider = PortalProvider::new(&[
        ("101", Scenario::Result(result_page(&[("CS-CS-101", "85")]))),
        ("102", Scenario::NoViewLink),
    ]);
    let students = vec![student("Alice", "101", "5001"), student("Bob", "102", "5002")];
    (provider, students)
}

// ========== 端到端场景 ==========

#[tokio::test(start_paused = true)]
async fn test_alice_and_bob_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let (provider, students) = alice_and_bob();

    let summary = app
        .spawn_batch(provider.clone(), students)
        .await
        .unwrap()
        .unwrap();

    assert_eq!((summary.successful, summary.failed, summary.processed), (1, 1, 2));
    assert_eq!(summary.snapshots_written, 1);
    assert_eq!(provider.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(provider.released.load(Ordering::SeqCst), 1);

    let status = app.status().await;
    assert!(!status.running);
    assert_eq!((status.total, status.current), (2, 2));
    assert_eq!((status.successful, status.failed), (1, 1));
    assert_eq!(status.failed_list.len(), 1);
    assert_eq!(status.failed_list[0].index, 1);
    assert_eq!(
        status.failed_list[0].record.status.to_string(),
        "Failed: StageNotFound(view_link)"
    );

    let results = app.job().read(|s| s.results.clone()).await;
    assert_eq!(results[0].student.name, "Alice");
    assert_eq!(results[0].status.to_string(), "Success");
    assert_eq!(
        results[0].marks.get(&SubjectCode::from("CS-CS-101")),
        Some(&MarkToken::Numeric(85))
    );
    assert!(results[1].marks.is_empty());

    let report = status.result_file.expect("snapshot should be published");
    assert!(report.starts_with("BTech Sem4 result "));
    assert!(status.result_expires_in.is_some_and(|secs| secs > 1100));
    let content = std::fs::read_to_string(dir.path().join("outputs").join(&report)).unwrap();
    assert!(content.contains("Alice,101,5001,Success,85"));
    assert!(content.contains("Bob,102,5002,Failed: StageNotFound(view_link),N/A"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_correction_of_bob() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let (provider, students) = alice_and_bob();
    app.spawn_batch(provider, students).await.unwrap().unwrap();

    let path = app
        .apply_correction(1, "CS-CS-101,Bob,100,40\nincomplete,line")
        .await
        .unwrap();

    let results = app.job().read(|s| s.results.clone()).await;
    assert_eq!(results[1].status.to_string(), "Success (manual)");
    assert_eq!(
        results[1].marks.get(&SubjectCode::from("CS-CS-101")).map(|m| m.to_string()),
        Some("40".to_string())
    );

    let status = app.status().await;
    assert_eq!((status.successful, status.failed), (2, 0));
    assert!(status.failed_list.is_empty());

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Dashboard_Results_"));
    assert_eq!(status.result_file.as_deref(), Some(name.as_str()));
    assert!(app.artifacts().expires_at(&name, Namespace::Results).await.is_some());

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("Bob,102,5002,Success (manual),40"));
}

#[tokio::test]
async fn test_correction_index_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();

    let err = app.apply_correction(0, "A,B,100,50").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Job(JobError::IndexOutOfRange { index: 0, len: 0 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_order_and_counter_invariant() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();

    let mut scenarios = Vec::new();
    let mut students = Vec::new();
    let rolls: Vec<String> = (1..=7).map(|i| format!("20{}", i)).collect();
    for (i, roll) in rolls.iter().enumerate() {
        let scenario = if i % 3 == 1 {
            Scenario::NoViewLink
        } else {
            Scenario::Result(result_page(&[("CS-CS-201", "70")]))
        };
        scenarios.push((roll.as_str(), scenario));
        students.push(student(&format!("Student{}", i), roll, "9000"));
    }
    let mut provider = PortalProvider::new(&scenarios);
    provider.with_confirm = true;

    let job = app.job().clone();
    let watcher = tokio::spawn(async move {
        let mut observations = 0;
        loop {
            let running = job
                .read(|s| {
                    assert_eq!(s.successful + s.failed, s.results.len());
                    assert!(s.results.len() <= s.current_index);
                    assert!(s.current_index <= s.total);
                    s.running
                })
                .await;
            observations += 1;
            if !running && observations > 1 {
                return observations;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let summary = app
        .spawn_batch(provider, students.clone())
        .await
        .unwrap()
        .unwrap();
    assert!(watcher.await.unwrap() > 10);

    // 第 5 个和最后一个学生之后各写一次
    assert_eq!(summary.snapshots_written, 2);
    assert_eq!((summary.successful, summary.failed), (5, 2));

    let results = app.job().read(|s| s.results.clone()).await;
    let order: Vec<&str> = results.iter().map(|r| r.student.roll.as_str()).collect();
    let expected: Vec<&str> = students.iter().map(|s| s.roll.as_str()).collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn test_overlapping_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let (provider, students) = alice_and_bob();

    app.job().begin(5).await.unwrap();
    let result = app.spawn_batch(provider.clone(), students).await.unwrap();

    assert!(matches!(result, Err(AppError::Job(JobError::AlreadyRunning))));
    assert_eq!(provider.acquired.load(Ordering::SeqCst), 0);
    assert!(app.job().read(|s| s.running).await);
}

#[tokio::test]
async fn test_acquire_failure_clears_running() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let (mut provider, students) = alice_and_bob();
    provider.fail_acquire = true;

    let result = app.spawn_batch(provider.clone(), students).await.unwrap();

    assert!(matches!(result, Err(AppError::Browser(_))));
    assert_eq!(provider.released.load(Ordering::SeqCst), 0);
    let status = app.status().await;
    assert!(!status.running);
    assert!(status.result_file.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_initial_page_failure_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let mut provider = PortalProvider::new(&[(
        "101",
        Scenario::Result(result_page(&[("CS-CS-101", "85")])),
    )]);
    provider.fail_first_goto = true;

    let summary = app
        .spawn_batch(provider.clone(), vec![student("Alice", "101", "5001")])
        .await
        .unwrap()
        .unwrap();

    assert_eq!((summary.successful, summary.failed, summary.processed), (1, 0, 1));
    assert_eq!(provider.released.load(Ordering::SeqCst), 1);
    let results = app.job().read(|s| s.results.clone()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status.to_string(), "Success");
}

#[tokio::test(start_paused = true)]
async fn test_panicking_session_clears_running() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let provider = PortalProvider::new(&[
        ("101", Scenario::Result(result_page(&[("CS-CS-101", "85")]))),
        ("102", Scenario::Crash),
    ]);
    let students = vec![student("Alice", "101", "5001"), student("Bob", "102", "5002")];

    let result = app.spawn_batch(provider.clone(), students).await.unwrap();

    match result {
        Err(AppError::Job(JobError::Panicked { message })) => {
            assert!(message.contains("renderer crashed"))
        }
        other => panic!("unexpected batch result: {:?}", other),
    }
    assert_eq!(provider.released.load(Ordering::SeqCst), 1);
    let status = app.status().await;
    assert!(!status.running);
    assert_eq!((status.successful, status.failed), (1, 0));

    // 之后的批次可以正常开始
    let (provider, students) = alice_and_bob();
    let summary = app.spawn_batch(provider, students).await.unwrap().unwrap();
    assert_eq!(summary.processed, 2);
}

#[tokio::test]
async fn test_empty_roster_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let (provider, _) = alice_and_bob();

    let result = app.spawn_batch(provider, Vec::new()).await.unwrap();
    assert!(matches!(result, Err(AppError::Job(JobError::EmptyRoster))));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_failure_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let output_dir = config.output_dir.clone();
    let app = App::initialize(config).await.unwrap();
    std::fs::remove_dir_all(&output_dir).unwrap();

    let (provider, students) = alice_and_bob();
    let summary = app.spawn_batch(provider, students).await.unwrap().unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.snapshot_failures, 1);
    assert_eq!(summary.snapshots_written, 0);
    assert!(app.status().await.result_file.is_none());
}

// ========== 文件生命周期 ==========

#[tokio::test(start_paused = true)]
async fn test_expired_report_is_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        result_ttl: Duration::ZERO,
        // 只在测试里手动清理
        sweep_interval: Duration::from_secs(24 * 3600),
        ..test_config(dir.path())
    };
    let app = App::initialize(config).await.unwrap();
    let (provider, students) = alice_and_bob();
    app.spawn_batch(provider, students).await.unwrap().unwrap();

    let report = app.status().await.result_file.unwrap();
    let report_path = dir.path().join("outputs").join(&report);
    assert!(report_path.exists());

    let swept = app.artifacts().sweep().await;

    assert!(swept.results.contains(&report));
    assert!(!report_path.exists());
    let status = app.status().await;
    assert!(status.result_file.is_none());
    assert!(status.result_expires_in.is_none());
}

#[tokio::test]
async fn test_ingest_roster() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::initialize(test_config(dir.path())).await.unwrap();
    let roster = dir.path().join("student_data.csv");
    std::fs::write(
        &roster,
        "Student Name,Roll Number,Registration Number\nAlice,101.0,5001\nBob,102,5002\n,103,5003\n",
    )
    .unwrap();

    let students = app.ingest_roster(&roster).await.unwrap();

    assert_eq!(students, vec![student("Alice", "101", "5001"), student("Bob", "102", "5002")]);
    let uploads: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].starts_with("upload_"));
}

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_live_browser_session() {
    let config = Config::from_env();
    let provider = ChromeProvider::new(&config);

    let session = provider.acquire().await.expect("获取浏览器会话失败");
    session.goto(&config.result_url).await.expect("打开查询页失败");
    assert!(session.exists(&ROLL_INPUT).await.unwrap(), "查询页应包含学号输入框");
    provider.release(session).await;
}
