use crate::models::mark::SubjectCode;
use crate::models::subject::{SubjectDetail, SubjectInfo};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize)]
struct SubjectInfoFile {
    #[serde(default)]
    subjects: BTreeMap<String, RawSubject>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    total_marks: Option<i64>,
}

/// 从 TOML 文件加载科目信息
///
/// 文件格式：
/// ```toml
/// [subjects."CS-CS-101"]
/// name = "Data Structures"
/// total_marks = 100
/// ```
///
/// 名称为空或满分不是正整数的条目会被跳过
pub async fn load_subject_info(toml_file_path: &Path) -> Result<SubjectInfo> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    parse_subject_info(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))
}

/// 解析科目信息文本
pub fn parse_subject_info(content: &str) -> Result<SubjectInfo> {
    let file: SubjectInfoFile = toml::from_str(content)?;

    let mut info = SubjectInfo::new();
    for (code, raw) in file.subjects {
        let name = raw.name.as_deref().map(str::trim).unwrap_or_default();
        let total_marks = raw.total_marks.and_then(|t| u32::try_from(t).ok()).filter(|t| *t > 0);

        match total_marks {
            Some(total_marks) if !name.is_empty() => {
                info.insert(
                    SubjectCode::new(code.trim()),
                    SubjectDetail {
                        name: name.to_string(),
                        total_marks,
                    },
                );
            }
            _ => tracing::warn!("跳过无效的科目信息: {}", code),
        }
    }

    tracing::info!("成功加载 {} 个科目信息", info.len());
    Ok(info)
}
