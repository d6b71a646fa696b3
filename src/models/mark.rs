use serde::{Deserialize, Serialize};
use std::fmt;

/// 抓取到的合理分数范围
pub const MIN_MARK: u16 = 10;
pub const MAX_MARK: u16 = 100;

/// 科目代码
///
/// 视为不透明的键，只在单个学生内唯一
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectCode(String);

impl SubjectCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// 单个科目的成绩
///
/// 序列化为页面上的原始写法：`85`、`F`、`29F`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MarkToken {
    /// 及格分数（抓取时限定在 [10, 100]）
    Numeric(u16),
    /// 不及格
    Fail,
    /// 带分数的不及格，如 `29F`
    NumericFail(u16),
    /// 人工修正时录入的其他内容，原样保留
    Manual(String),
}

impl MarkToken {
    /// 构造抓取分数，范围外的数字视为噪声
    pub fn numeric(value: u16) -> Option<Self> {
        (MIN_MARK..=MAX_MARK)
            .contains(&value)
            .then_some(MarkToken::Numeric(value))
    }

    /// 解析人工录入的分数
    ///
    /// # 返回
    /// 空字符串返回 `None`；无法识别的内容保存为 `Manual`
    pub fn parse_manual(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let upper = raw.to_uppercase();
        if let Some(digits) = upper.strip_suffix('F') {
            if (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(value) = digits.parse() {
                    return Some(MarkToken::NumericFail(value));
                }
            }
        }
        if matches!(upper.as_str(), "F" | "FAIL" | "AB" | "ABSENT") {
            return Some(MarkToken::Fail);
        }
        if let Some(token) = raw.parse::<u16>().ok().and_then(Self::numeric) {
            return Some(token);
        }
        Some(MarkToken::Manual(raw.to_string()))
    }

    /// 是否包含不及格标记
    pub fn is_fail(&self) -> bool {
        match self {
            MarkToken::Fail | MarkToken::NumericFail(_) => true,
            MarkToken::Numeric(_) => false,
            MarkToken::Manual(text) => text.to_uppercase().contains('F'),
        }
    }

    /// 可参与分数段统计的分数；不及格或非数字内容返回 `None`
    pub fn score(&self) -> Option<u32> {
        match self {
            MarkToken::Numeric(value) => Some(u32::from(*value)),
            MarkToken::Manual(text) if !self.is_fail() => text.parse().ok(),
            _ => None,
        }
    }

    /// 汇总总分时使用的数值：取文本中的所有数字（`29F` 计 29）
    pub fn digits_value(&self) -> u32 {
        let digits: String = self.to_string().chars().filter(char::is_ascii_digit).collect();
        digits.parse().unwrap_or(0)
    }
}

impl fmt::Display for MarkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkToken::Numeric(value) => write!(f, "{}", value),
            MarkToken::Fail => f.write_str("F"),
            MarkToken::NumericFail(value) => write!(f, "{}F", value),
            MarkToken::Manual(text) => f.write_str(text),
        }
    }
}

impl From<MarkToken> for String {
    fn from(token: MarkToken) -> Self {
        token.to_string()
    }
}

impl From<String> for MarkToken {
    fn from(raw: String) -> Self {
        MarkToken::parse_manual(&raw).unwrap_or(MarkToken::Manual(raw))
    }
}
