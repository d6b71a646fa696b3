use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::mark::SubjectCode;
use super::result::ResultRecord;

/// 科目详情（由操作员在抓取后补充）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDetail {
    pub name: String,
    pub total_marks: u32,
}

/// 科目代码 → 科目详情
pub type SubjectInfo = BTreeMap<SubjectCode, SubjectDetail>;

/// 分数段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBand {
    /// [80, 100]
    Above80,
    /// [70, 80)
    From70To80,
    /// [60, 70)
    From60To70,
    /// [50, 60)
    From50To60,
    /// [0, 50)
    Below50,
}

impl GradeBand {
    pub const ALL: [GradeBand; 5] = [
        GradeBand::Above80,
        GradeBand::From70To80,
        GradeBand::From60To70,
        GradeBand::From50To60,
        GradeBand::Below50,
    ];

    /// 按下限归档百分比
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            GradeBand::Above80
        } else if percentage >= 70.0 {
            GradeBand::From70To80
        } else if percentage >= 60.0 {
            GradeBand::From60To70
        } else if percentage >= 50.0 {
            GradeBand::From50To60
        } else {
            GradeBand::Below50
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeBand::Above80 => "Above 80%",
            GradeBand::From70To80 => "70-80%",
            GradeBand::From60To70 => "60-70%",
            GradeBand::From50To60 => "50-60%",
            GradeBand::Below50 => "Below 50%",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个科目的分数段统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeDistributionRow {
    pub code: SubjectCode,
    pub name: String,
    pub total_marks: u32,
    /// 与 `GradeBand::ALL` 顺序一致
    pub counts: [usize; 5],
}

impl GradeDistributionRow {
    pub fn count(&self, band: GradeBand) -> usize {
        self.counts[band.index()]
    }
}

/// 统计每个科目的分数段分布
///
/// 含不及格标记的成绩不参与统计
pub fn grade_distribution(results: &[ResultRecord], info: &SubjectInfo) -> Vec<GradeDistributionRow> {
    info.iter()
        .map(|(code, detail)| {
            let mut counts = [0usize; 5];
            for mark in results.iter().filter_map(|r| r.marks.get(code)) {
                let Some(score) = mark.score() else {
                    continue;
                };
                let percentage = f64::from(score) / f64::from(detail.total_marks) * 100.0;
                counts[GradeBand::from_percentage(percentage).index()] += 1;
            }
            GradeDistributionRow {
                code: code.clone(),
                name: detail.name.clone(),
                total_marks: detail.total_marks,
                counts,
            }
        })
        .collect()
}

/// 所有记录中出现过的科目代码（有序）
pub fn observed_subjects(results: &[ResultRecord]) -> Vec<SubjectCode> {
    results
        .iter()
        .flat_map(|r| r.marks.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 单个学生的总分与百分比
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub total: u64,
    pub max_total: u64,
    /// 保留一位小数；缺少科目满分信息时为 `None`
    pub percentage: Option<f64>,
}

/// 计算单个学生在给定科目上的总分
pub fn summarize(record: &ResultRecord, subjects: &[SubjectCode], info: &SubjectInfo) -> StudentSummary {
    // 人工录入的分数可能接近 u32 上限，按 u64 饱和累加
    let mut total: u64 = 0;
    let mut max_total: u64 = 0;
    for code in subjects {
        let obtained = record.marks.get(code).map(|m| m.digits_value()).unwrap_or(0);
        let full = info.get(code).map(|d| d.total_marks).unwrap_or(0);
        total = total.saturating_add(u64::from(obtained));
        max_total = max_total.saturating_add(u64::from(full));
    }
    let percentage = (max_total > 0)
        .then(|| (total as f64 / max_total as f64 * 1000.0).round() / 10.0);
    StudentSummary {
        total,
        max_total,
        percentage,
    }
}
