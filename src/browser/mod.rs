//! 浏览器获取
//!
//! 两种方式：连接已打开调试端口的浏览器，或启动一个无头浏览器

pub mod connection;
pub mod headless;

pub use connection::connect_to_browser_and_page;
pub use headless::launch_headless_browser;

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ChromeSession, JsExecutor, SessionProvider};

/// 基于 Chrome 的会话提供者
#[derive(Debug, Clone)]
pub struct ChromeProvider {
    base_url: String,
    debug_port: Option<u16>,
    executable: Option<PathBuf>,
}

impl ChromeProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.result_url.clone(),
            debug_port: config.browser_debug_port,
            executable: config.chrome_executable.clone(),
        }
    }
}

#[async_trait]
impl SessionProvider for ChromeProvider {
    type Session = ChromeSession;

    async fn acquire(&self) -> AppResult<ChromeSession> {
        let session = match self.debug_port {
            Some(port) => {
                let (browser, page) = connect_to_browser_and_page(port, Some(&self.base_url)).await?;
                ChromeSession::new(browser, JsExecutor::new(page), false)
            }
            None => {
                let (browser, page) =
                    launch_headless_browser(&self.base_url, self.executable.as_deref()).await?;
                ChromeSession::new(browser, JsExecutor::new(page), true)
            }
        };
        Ok(session)
    }

    async fn release(&self, session: ChromeSession) {
        session.close().await;
        info!("浏览器会话已关闭");
    }
}
