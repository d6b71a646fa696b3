//! 学生处理上下文
//!
//! 封装"我正在处理名单里的第几个学生"这一信息

use std::fmt::Display;

use crate::models::student::StudentRecord;

/// 学生处理上下文（仅用于日志显示）
#[derive(Debug, Clone)]
pub struct StudentCtx {
    /// 在名单中的位置（从1开始）
    pub student_index: usize,

    /// 名单总人数
    pub total: usize,

    pub name: String,

    pub roll: String,
}

impl StudentCtx {
    pub fn new(student_index: usize, total: usize, student: &StudentRecord) -> Self {
        Self {
            student_index,
            total,
            name: student.name.clone(),
            roll: student.roll.clone(),
        }
    }
}

impl Display for StudentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[学生 {}/{} {} (Roll: {})]",
            self.student_index, self.total, self.name, self.roll
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let student = StudentRecord::from_raw("Alice", "101", "5001").unwrap();
        let ctx = StudentCtx::new(2, 3, &student);
        assert_eq!(ctx.to_string(), "[学生 2/3 Alice (Roll: 101)]");
    }
}
