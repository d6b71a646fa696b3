//! 浏览器会话抽象 - 基础设施层
//!
//! 导航流程只依赖这里的 trait，真实浏览器与测试用的脚本化会话都实现它

use async_trait::async_trait;
use std::fmt;

use crate::error::AppResult;

/// 页面元素定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    /// 按 id 属性
    Id(&'static str),
    /// 按 name 属性
    Name(&'static str),
    /// 按链接文本（去除首尾空白后完全相等）
    LinkText(&'static str),
    /// 按标签名
    Tag(&'static str),
}

impl Locator {
    /// 返回匹配元素数组的 JS 表达式
    pub fn to_js(&self) -> String {
        // serde_json 负责字符串转义
        let quote = |s: &str| serde_json::Value::from(s).to_string();
        match self {
            Locator::Id(id) => format!("[document.getElementById({})].filter(Boolean)", quote(id)),
            Locator::Name(name) => format!("Array.from(document.getElementsByName({}))", quote(name)),
            Locator::LinkText(text) => format!(
                "Array.from(document.querySelectorAll('a')).filter(a => a.textContent.trim() === {})",
                quote(text)
            ),
            Locator::Tag(tag) => format!("Array.from(document.getElementsByTagName({}))", quote(tag)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{}", id),
            Locator::Name(name) => write!(f, "[name={}]", name),
            Locator::LinkText(text) => write!(f, "a:text({})", text),
            Locator::Tag(tag) => write!(f, "<{}>", tag),
        }
    }
}

/// 一个可控制的浏览器会话
///
/// 所有方法都是一次性的动作，不做等待；等待与重试由导航流程负责
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 打开指定地址
    async fn goto(&self, url: &str) -> AppResult<()>;

    /// 清除 cookie 和缓存，避免上一个学生的状态影响下一个
    async fn clear_browsing_data(&self) -> AppResult<()>;

    /// 当前匹配的元素数量
    async fn count(&self, locator: &Locator) -> AppResult<usize>;

    /// 清空并填写输入框
    async fn fill(&self, locator: &Locator, value: &str) -> AppResult<()>;

    /// 点击元素
    async fn click(&self, locator: &Locator) -> AppResult<()>;

    /// `document.readyState`
    async fn ready_state(&self) -> AppResult<String>;

    /// 当前页面的 HTML
    async fn content(&self) -> AppResult<String>;

    /// 元素是否存在
    async fn exists(&self, locator: &Locator) -> AppResult<bool> {
        Ok(self.count(locator).await? > 0)
    }
}

/// 会话提供者：负责获取和释放浏览器会话
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: BrowserSession + 'static;

    /// 获取一个新会话；失败对整个批次是致命的
    async fn acquire(&self) -> AppResult<Self::Session>;

    /// 释放会话（任何退出路径都必须调用）
    async fn release(&self, session: Self::Session);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_js_escapes_values() {
        let js = Locator::LinkText("View").to_js();
        assert!(js.contains("=== \"View\""));

        let js = Locator::Id("txt\"RollNo").to_js();
        assert!(js.contains("\"txt\\\"RollNo\""));
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::Id("txtRollNo").to_string(), "#txtRollNo");
        assert_eq!(Locator::Name("cmdconfirm").to_string(), "[name=cmdconfirm]");
    }
}
