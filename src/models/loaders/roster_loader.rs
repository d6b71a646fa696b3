use crate::models::student::StudentRecord;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

pub const NAME_COLUMN: &str = "Student Name";
pub const ROLL_COLUMN: &str = "Roll Number";
pub const REGISTRATION_COLUMN: &str = "Registration Number";

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Student Name", default)]
    name: Option<String>,
    #[serde(rename = "Roll Number", default)]
    roll: Option<String>,
    #[serde(rename = "Registration Number", default)]
    registration: Option<String>,
}

/// 从 CSV 文件加载学生名单
///
/// 任一字段为空或无法解析的行会被静默丢弃
pub async fn load_roster(roster_path: &Path) -> Result<Vec<StudentRecord>> {
    let content = fs::read(roster_path)
        .await
        .with_context(|| format!("无法读取名单文件: {}", roster_path.display()))?;

    parse_roster(&content).with_context(|| format!("无法解析名单文件: {}", roster_path.display()))
}

/// 解析名单内容
pub fn parse_roster(content: &[u8]) -> Result<Vec<StudentRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers = reader.headers()?.clone();
    for column in [NAME_COLUMN, ROLL_COLUMN, REGISTRATION_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("名单缺少列: {}", column);
        }
    }

    let mut students = Vec::new();
    for (row_index, row) in reader.deserialize::<RosterRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("跳过第 {} 行: {}", row_index + 2, e);
                continue;
            }
        };

        let student = match (&row.name, &row.roll, &row.registration) {
            (Some(name), Some(roll), Some(registration)) => {
                StudentRecord::from_raw(name, roll, registration)
            }
            _ => None,
        };

        match student {
            Some(student) => students.push(student),
            None => tracing::debug!("跳过第 {} 行: 字段为空或无法解析", row_index + 2),
        }
    }

    tracing::info!("成功加载 {} 名学生", students.len());
    Ok(students)
}
