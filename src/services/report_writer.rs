//! 报告写入服务 - 业务能力层
//!
//! 只负责"把结果列表写成 CSV"能力，不关心何时写、写到哪一批

use chrono::{DateTime, Local};
use csv::WriterBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::result::ResultRecord;
use crate::models::subject::{grade_distribution, observed_subjects, summarize, GradeBand, SubjectInfo};

const NOT_AVAILABLE: &str = "N/A";

/// 定期快照的文件名：`<班级> <学期> result <时间戳>.csv`
pub fn snapshot_name(class_name: &str, semester: &str, at: DateTime<Local>) -> String {
    format!("{} {} result {}.csv", class_name, semester, at.format("%Y%m%d_%H%M%S"))
}

/// 人工修正后重新生成的报告文件名
pub fn dashboard_name(at: DateTime<Local>) -> String {
    format!("Dashboard_Results_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// 报告写入服务
///
/// 职责：
/// - 主表：每个学生一行，每个出现过的科目一列
/// - 有学科信息时追加总分、百分比和分数段分布表
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写入报告
    ///
    /// # 参数
    /// - `name`: 文件名（位于输出目录下）
    /// - `records`: 按名单顺序排列的结果
    /// - `info`: 学科信息（可选）
    ///
    /// # 返回
    /// 写入的完整路径
    pub async fn write(
        &self,
        name: &str,
        records: &[ResultRecord],
        info: Option<&SubjectInfo>,
    ) -> AppResult<PathBuf> {
        let path = self.output_dir.join(name);
        let bytes = render_report(records, info)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        debug!("报告已写入: {} ({} 条记录)", path.display(), records.len());
        Ok(path)
    }
}

/// 生成报告内容
pub fn render_report(records: &[ResultRecord], info: Option<&SubjectInfo>) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let subjects = observed_subjects(records);

    let mut header: Vec<String> = ["Student_Name", "Roll_Number", "Registration_Number", "Status"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(subjects.iter().map(|code| code.to_string()));
    if info.is_some() {
        header.push("Total".to_string());
        header.push("Percentage".to_string());
    }
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.student.name.clone(),
            record.student.roll.clone(),
            record.student.registration.clone(),
            record.status.to_string(),
        ];
        row.extend(subjects.iter().map(|code| {
            record
                .marks
                .get(code)
                .map(|mark| mark.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }));
        if let Some(info) = info {
            let summary = summarize(record, &subjects, info);
            row.push(summary.total.to_string());
            row.push(
                summary
                    .percentage
                    .map(|p| format!("{:.1}", p))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            );
        }
        writer.write_record(&row)?;
    }

    let mut bytes = into_bytes(writer)?;

    if let Some(info) = info {
        // 两张表之间是一个真正的空行，分布表另起一个 writer
        bytes.push(b'\n');
        let mut writer = WriterBuilder::new().from_writer(bytes);
        let mut header = vec![
            "Subject_Code".to_string(),
            "Subject_Name".to_string(),
            "Total_Marks".to_string(),
        ];
        header.extend(GradeBand::ALL.iter().map(|band| band.label().to_string()));
        writer.write_record(&header)?;

        for dist in grade_distribution(records, info) {
            let mut row = vec![dist.code.to_string(), dist.name.clone(), dist.total_marks.to_string()];
            row.extend(GradeBand::ALL.iter().map(|band| dist.count(*band).to_string()));
            writer.write_record(&row)?;
        }
        bytes = into_bytes(writer)?;
    }

    Ok(bytes)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
