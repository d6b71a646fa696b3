//! 基于 chromiumoxide 的浏览器会话
//!
//! 所有页面操作都通过 `JsExecutor` 以 JS 片段完成

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCacheParams, ClearBrowserCookiesParams,
};
use chromiumoxide::Browser;
use tracing::{debug, warn};

use super::js_executor::JsExecutor;
use super::session::{BrowserSession, Locator};
use crate::error::{AppError, AppResult, BrowserError};

/// Chrome 会话
pub struct ChromeSession {
    browser: Browser,
    executor: JsExecutor,
    /// 浏览器是否由本程序启动（启动的需要关闭，连接的只关闭自己的标签页）
    owned: bool,
}

impl ChromeSession {
    pub fn new(browser: Browser, executor: JsExecutor, owned: bool) -> Self {
        Self {
            browser,
            executor,
            owned,
        }
    }

    /// 关闭会话
    pub async fn close(self) {
        let Self {
            mut browser,
            executor,
            owned,
        } = self;

        if let Err(e) = executor.into_page().close().await {
            debug!("关闭页面失败: {}", e);
        }

        if owned {
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("等待浏览器退出失败: {}", e);
            }
        }
    }

    /// 对第一个匹配元素执行一段 JS，元素不存在时报错
    async fn with_element(&self, locator: &Locator, body: &str) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const el = ({})[0];
                if (!el) {{
                    return false;
                }}
                {}
                return true;
            }})()
            "#,
            locator.to_js(),
            body
        );

        if self.executor.eval_as::<bool>(js_code).await? {
            Ok(())
        } else {
            Err(AppError::Browser(BrowserError::ElementMissing {
                locator: locator.to_string(),
            }))
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str) -> AppResult<()> {
        self.executor
            .page()
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }

    async fn clear_browsing_data(&self) -> AppResult<()> {
        let page = self.executor.page();
        page.execute(ClearBrowserCookiesParams::default()).await?;
        page.execute(ClearBrowserCacheParams::default()).await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> AppResult<usize> {
        self.executor
            .eval_as(format!("({}).length", locator.to_js()))
            .await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> AppResult<()> {
        let body = format!(
            r#"
                el.focus();
                el.value = '';
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#,
            serde_json::to_string(value)?
        );
        self.with_element(locator, &body).await
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        // 点击可能触发整页跳转，延后执行以便本次求值先返回
        self.with_element(locator, "setTimeout(() => el.click(), 0);")
            .await
    }

    async fn ready_state(&self) -> AppResult<String> {
        self.executor.eval_as("document.readyState").await
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.executor.page().content().await?)
    }
}
