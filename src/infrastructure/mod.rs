//! 基础设施层
//!
//! 持有稀缺资源（浏览器、页面），只暴露能力

pub mod chrome_session;
pub mod js_executor;
pub mod session;

pub use chrome_session::ChromeSession;
pub use js_executor::JsExecutor;
pub use session::{BrowserSession, Locator, SessionProvider};
