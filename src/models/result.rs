use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::mark::{MarkToken, SubjectCode};
use super::student::StudentRecord;

/// 科目代码 → 成绩
pub type MarkMap = BTreeMap<SubjectCode, MarkToken>;

/// 单个学生的查询状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    /// 抓取成功
    Success,
    /// 人工修正后视为成功
    ManualSuccess,
    /// 抓取失败及原因
    Failed(String),
}

impl ResultStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, ResultStatus::Failed(_))
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Success => f.write_str("Success"),
            ResultStatus::ManualSuccess => f.write_str("Success (manual)"),
            ResultStatus::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

impl Serialize for ResultStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 单个学生的结果记录
///
/// 每个学生只产生一条；之后只能通过人工修正替换成绩和状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub student: StudentRecord,
    pub status: ResultStatus,
    pub marks: MarkMap,
}

impl ResultRecord {
    pub fn success(student: StudentRecord, marks: MarkMap) -> Self {
        Self {
            student,
            status: ResultStatus::Success,
            marks,
        }
    }

    pub fn failed(student: StudentRecord, reason: impl Into<String>) -> Self {
        Self {
            student,
            status: ResultStatus::Failed(reason.into()),
            marks: MarkMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 用人工录入的成绩替换当前记录
    pub fn apply_manual(&mut self, marks: MarkMap) {
        self.marks = marks;
        self.status = ResultStatus::ManualSuccess;
    }
}
