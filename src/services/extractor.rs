//! 成绩提取服务 - 业务能力层
//!
//! 只负责"从结果页 HTML 中找出科目和成绩"，不接触浏览器
//!
//! ## 规则
//! 1. 只扫描文本中含 `TOTAL` 或 `MARKS` 的表格，跳过每个表格的第一行（表头）
//! 2. 单元格少于 3 个的行跳过
//! 3. 第一个单元格按顺序匹配科目代码模式，先匹配者胜
//! 4. 整行文本按优先级识别成绩：`29F` → `F` → 最后一个 [10,100] 的数字 → `FAIL`/`AB`/`ABSENT`
//! 5. 同一页面中重复出现的科目代码只保留第一次

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::mark::{MarkToken, SubjectCode};
use crate::models::result::MarkMap;

/// 提取器内部错误，对外统一吸收为空结果
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("正则表达式编译失败: {0}")]
    Pattern(#[from] regex::Error),
    #[error("选择器解析失败: {0}")]
    Selector(String),
}

/// 表头关键字（大写比较）
const HEADER_KEYWORDS: [&str; 2] = ["TOTAL", "MARKS"];

/// 一行至少需要的单元格数
const MIN_CELLS: usize = 3;

static PATTERNS: LazyLock<Result<Patterns, ExtractError>> = LazyLock::new(Patterns::compile);

struct Patterns {
    table: Selector,
    row: Selector,
    cell: Selector,
    subject_codes: Vec<Regex>,
    numeric_fail: Regex,
    fail: Regex,
    number: Regex,
    fail_keywords: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, ExtractError> {
        Ok(Self {
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td, th")?,
            subject_codes: vec![
                Regex::new(r"^([A-Z]{2,3}-[A-Z]{2,4}-[0-9]{2,3}[A-Z]?)(?:[\s:]|$)")?,
                Regex::new(r"^([A-Z]{2,3}-[A-Z]{2,4}-[IVX]+)(?:[\s:]|$)")?,
                Regex::new(r"^([A-Z]{2,3}-[0-9]{2,3}[A-Z]?)(?:[\s:]|$)")?,
            ],
            numeric_fail: Regex::new(r"(?i)\b([0-9]{1,3})F\b")?,
            fail: Regex::new(r"(?i)\bF\b")?,
            number: Regex::new(r"\b([0-9]{2,3})\b")?,
            fail_keywords: Regex::new(r"(?i)\b(?:FAIL|AB|ABSENT)\b")?,
        })
    }

    fn extract(&self, html: &str) -> MarkMap {
        let document = Html::parse_document(html);
        let mut marks = MarkMap::new();

        for table in document.select(&self.table) {
            if !is_marks_table(&table) {
                continue;
            }

            for row in table.select(&self.row).skip(1) {
                let cells: Vec<String> = row
                    .select(&self.cell)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect();
                if cells.len() < MIN_CELLS {
                    continue;
                }

                let Some(code) = self.subject_code(&cells[0]) else {
                    continue;
                };
                if marks.contains_key(&code) {
                    debug!("科目 {} 重复出现，保留第一次的成绩", code);
                    continue;
                }

                if let Some(token) = self.classify(&cells.join(" ")) {
                    marks.insert(code, token);
                }
            }
        }

        marks
    }

    fn subject_code(&self, first_cell: &str) -> Option<SubjectCode> {
        self.subject_codes
            .iter()
            .find_map(|pattern| pattern.captures(first_cell))
            .map(|caps| SubjectCode::new(&caps[1]))
    }

    /// 按优先级识别一行的成绩
    fn classify(&self, row_text: &str) -> Option<MarkToken> {
        if let Some(caps) = self.numeric_fail.captures(row_text) {
            if let Ok(value) = caps[1].parse() {
                return Some(MarkToken::NumericFail(value));
            }
        }

        if self.fail.is_match(row_text) {
            return Some(MarkToken::Fail);
        }

        // 一行里可能同时有满分和得分，约定取最后一个
        let last_valid = self
            .number
            .captures_iter(row_text)
            .filter_map(|caps| caps[1].parse::<u16>().ok())
            .filter_map(MarkToken::numeric)
            .last();
        if last_valid.is_some() {
            return last_valid;
        }

        self.fail_keywords.is_match(row_text).then_some(MarkToken::Fail)
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(format!("{}: {:?}", css, e)))
}

fn is_marks_table(table: &ElementRef<'_>) -> bool {
    let text = table.text().collect::<String>().to_uppercase();
    HEADER_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// 从结果页 HTML 中提取 科目代码 → 成绩
///
/// 纯函数；内部失败只记录日志并返回空结果，不会中断批量任务
pub fn extract(html: &str) -> MarkMap {
    match PATTERNS.as_ref() {
        Ok(patterns) => patterns.extract(html),
        Err(e) => {
            error!("成绩提取失败: {}", e);
            MarkMap::new()
        }
    }
}
