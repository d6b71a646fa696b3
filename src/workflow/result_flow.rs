//! 成绩查询流程 - 流程层
//!
//! 核心职责：定义"查一个学生"的完整导航流程
//!
//! 流程顺序（转移规则见 `stage` 模块）：
//! 1. 填写学号 → 填写注册号 → 提交
//! 2. 可选的确认按钮
//! 3. 点击 View 打开成绩详情
//! 4. 等待结果表格出现并稳定
//! 5. 交给提取服务

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, NavigationWarning};
use crate::infrastructure::{BrowserSession, Locator};
use crate::models::result::MarkMap;
use crate::models::student::StudentRecord;
use crate::services::extractor;
use crate::workflow::stage::{Stage, StageOutcome, Transition};
use crate::workflow::student_ctx::StudentCtx;

pub const ROLL_INPUT: Locator = Locator::Id("txtRollNo");
pub const REGISTRATION_INPUT: Locator = Locator::Id("txtRegistrationNo");
pub const SUBMIT_BUTTON: Locator = Locator::Id("cmdbtnProceed");
/// 两种确认按钮写法，按顺序探测
pub const CONFIRM_BUTTONS: [Locator; 2] = [Locator::Name("imgComfirm"), Locator::Name("cmdconfirm")];
pub const VIEW_LINK: Locator = Locator::LinkText("View");
pub const RESULT_TABLE: Locator = Locator::Tag("table");

/// 各阶段的等待时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTimings {
    /// 必需控件的等待时间
    pub element_timeout: Duration,
    /// 每个确认按钮的探测时间
    pub confirm_timeout: Duration,
    /// 等待 `document.readyState == "complete"` 的时间
    pub page_ready_timeout: Duration,
    /// 等待结果表格的时间
    pub content_timeout: Duration,
    /// 表格出现后的稳定等待
    pub settle_delay: Duration,
    /// 点击后开始检查页面状态前的等待
    pub navigation_grace: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for NavigationTimings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            confirm_timeout: Duration::from_secs(5),
            page_ready_timeout: Duration::from_secs(10),
            content_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(3),
            navigation_grace: Duration::from_millis(500),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl From<&Config> for NavigationTimings {
    fn from(config: &Config) -> Self {
        Self {
            element_timeout: config.element_timeout,
            confirm_timeout: config.confirm_timeout,
            page_ready_timeout: config.element_timeout,
            content_timeout: config.content_timeout,
            settle_delay: config.settle_delay,
            ..Self::default()
        }
    }
}

/// 一次查询的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOutcome {
    pub marks: MarkMap,
    pub warnings: Vec<NavigationWarning>,
}

/// 成绩查询流程
///
/// - 按阶段驱动浏览器会话
/// - 不持有任何资源（session 由调用方传入）
/// - 失败只以阶段错误的形式返回，由上层决定如何记录
pub struct ResultFlow {
    timings: NavigationTimings,
}

impl ResultFlow {
    pub fn new(timings: NavigationTimings) -> Self {
        Self { timings }
    }

    /// 为一个学生执行完整流程
    ///
    /// # 返回
    /// 成功时返回提取到的成绩（可能为空）和过程中的软警告
    pub async fn run(
        &self,
        session: &dyn BrowserSession,
        student: &StudentRecord,
        ctx: &StudentCtx,
    ) -> AppResult<LookupOutcome> {
        let mut outcome = LookupOutcome::default();
        let mut stage = Stage::FIRST;

        loop {
            debug!("{} 阶段: {}", ctx, stage);
            let result = match stage {
                Stage::Extract => {
                    let html = session.content().await?;
                    outcome.marks = extractor::extract(&html);
                    debug!("{} 找到 {} 个科目", ctx, outcome.marks.len());
                    StageOutcome::Completed
                }
                _ => self.execute(session, stage, student).await?,
            };

            match stage.transition(result) {
                Transition::Next { next, warning } => {
                    if let Some(warning) = warning {
                        warn!("{} ⚠️ 结果内容可能未完全加载 ({})", ctx, warning);
                        outcome.warnings.push(warning);
                    }
                    stage = next;
                }
                Transition::Done => return Ok(outcome),
                Transition::Fail(e) => return Err(e.into()),
            }
        }
    }

    /// 执行单个阶段（提取阶段除外）
    async fn execute(
        &self,
        session: &dyn BrowserSession,
        stage: Stage,
        student: &StudentRecord,
    ) -> AppResult<StageOutcome> {
        let t = &self.timings;
        match stage {
            Stage::RollInput => self.fill(session, &ROLL_INPUT, &student.roll).await,
            Stage::RegistrationInput => {
                self.fill(session, &REGISTRATION_INPUT, &student.registration)
                    .await
            }
            Stage::SubmitButton => self.click_and_wait(session, &SUBMIT_BUTTON, t.element_timeout).await,
            Stage::Confirm => {
                for locator in &CONFIRM_BUTTONS {
                    if self.wait_for(session, locator, t.confirm_timeout).await {
                        session.click(locator).await?;
                        self.wait_page_ready(session).await;
                        return Ok(StageOutcome::Completed);
                    }
                }
                debug!("没有确认按钮，直接继续");
                Ok(StageOutcome::Missing)
            }
            Stage::ViewLink => self.click_and_wait(session, &VIEW_LINK, t.element_timeout).await,
            Stage::ResultContent => {
                let ready = self
                    .wait_until(t.content_timeout, || async {
                        Ok::<_, AppError>(session.count(&RESULT_TABLE).await? > 0)
                    })
                    .await;
                if !ready {
                    return Ok(StageOutcome::Missing);
                }
                // 表格出现后仍有异步内容在渲染
                sleep(t.settle_delay).await;
                Ok(StageOutcome::Completed)
            }
            Stage::Extract => Ok(StageOutcome::Completed),
        }
    }

    async fn fill(
        &self,
        session: &dyn BrowserSession,
        locator: &Locator,
        value: &str,
    ) -> AppResult<StageOutcome> {
        if !self.wait_for(session, locator, self.timings.element_timeout).await {
            return Ok(StageOutcome::Missing);
        }
        session.fill(locator, value).await?;
        Ok(StageOutcome::Completed)
    }

    async fn click_and_wait(
        &self,
        session: &dyn BrowserSession,
        locator: &Locator,
        timeout: Duration,
    ) -> AppResult<StageOutcome> {
        if !self.wait_for(session, locator, timeout).await {
            return Ok(StageOutcome::Missing);
        }
        session.click(locator).await?;
        self.wait_page_ready(session).await;
        Ok(StageOutcome::Completed)
    }

    /// 等待元素出现
    async fn wait_for(&self, session: &dyn BrowserSession, locator: &Locator, timeout: Duration) -> bool {
        let found = self.wait_until(timeout, || session.exists(locator)).await;
        if !found {
            debug!("等待 {} 超时 ({:?})", locator, timeout);
        }
        found
    }

    /// 等待页面加载完成；超时不算失败
    async fn wait_page_ready(&self, session: &dyn BrowserSession) -> bool {
        sleep(self.timings.navigation_grace).await;
        let ready = self
            .wait_until(self.timings.page_ready_timeout, || async {
                Ok::<_, AppError>(session.ready_state().await? == "complete")
            })
            .await;
        if !ready {
            debug!("页面加载等待超时，继续执行");
        }
        ready
    }

    /// 轮询直到条件成立或超时
    ///
    /// 探测出错视为条件尚未满足（页面跳转过程中求值可能失败）
    async fn wait_until<F, Fut>(&self, timeout: Duration, mut probe: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<bool>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            match probe().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!("探测失败，稍后重试: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.timings.poll_interval.min(deadline - now)).await;
        }
    }
}
