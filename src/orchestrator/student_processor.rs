//! 单个学生处理器 - 编排层
//!
//! 把导航流程的结果收敛成一条 `ResultRecord`，任何错误都不向上传播

use tracing::{info, warn};

use crate::infrastructure::BrowserSession;
use crate::models::result::ResultRecord;
use crate::models::student::StudentRecord;
use crate::workflow::{ResultFlow, StudentCtx};

/// 处理单个学生
///
/// # 参数
/// - `flow`: 导航流程
/// - `session`: 浏览器会话（已位于查询页）
/// - `student`: 学生信息
/// - `ctx`: 日志上下文
///
/// # 返回
/// 成功时为 `Success` 加提取到的成绩（可能为空），失败时为 `Failed(原因)`
pub async fn process_student(
    flow: &ResultFlow,
    session: &dyn BrowserSession,
    student: &StudentRecord,
    ctx: &StudentCtx,
) -> ResultRecord {
    match flow.run(session, student, ctx).await {
        Ok(outcome) => {
            if outcome.marks.is_empty() {
                warn!("{} ⚠️ 页面上没有找到成绩", ctx);
            } else {
                info!("{} ✅ 获取到 {} 门成绩", ctx, outcome.marks.len());
            }
            ResultRecord::success(student.clone(), outcome.marks)
        }
        Err(e) => {
            warn!("{} ❌ 查询失败: {}", ctx, e);
            ResultRecord::failed(student.clone(), e.to_string())
        }
    }
}
