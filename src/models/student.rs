use serde::{Deserialize, Serialize};
use std::fmt;

/// 名单中的一名学生
///
/// 学号和注册号以规范化的整数字符串保存（`101.0` → `101`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub name: String,
    pub roll: String,
    pub registration: String,
}

impl StudentRecord {
    /// 从原始字段构建学生记录
    ///
    /// 任一字段为空或学号/注册号无法解析为整数时返回 `None`
    pub fn from_raw(name: &str, roll: &str, registration: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            roll: canonical_number(roll)?,
            registration: canonical_number(registration)?,
        })
    }
}

impl fmt::Display for StudentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Roll: {})", self.name, self.roll)
    }
}

/// 把表格中的数字单元格规范化为整数字符串
///
/// 电子表格导出的数字常带有 `.0` 后缀；纯数字保持原样，不丢前导零
pub fn canonical_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(format!("{}", value as u64))
    } else {
        None
    }
}
