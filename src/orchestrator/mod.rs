//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 顺序处理名单（Vec<StudentRecord>），定期写快照
//! - 管理浏览器会话（获取与释放）
//! - 人工修正与学科信息的应用
//!
//! ### `student_processor` - 单个学生处理器
//! - 调用 `ResultFlow`，把结果或错误收敛成一条 `ResultRecord`
//!
//! ### `job_state` - 任务状态
//! - 计数器、结果列表、报告指针，统一在一把锁内读写
//!
//! ### `artifact_lifecycle` - 临时文件生命周期
//! - 过期台账、定期清理
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<StudentRecord>)
//!     ↓
//! student_processor (处理单个学生)
//!     ↓
//! workflow::ResultFlow (按阶段导航)
//!     ↓
//! services (能力层：extract / report)
//!     ↓
//! infrastructure (基础设施：BrowserSession)
//! ```

pub mod artifact_lifecycle;
pub mod batch_processor;
pub mod job_state;
pub mod student_processor;

// 重新导出主要类型
pub use artifact_lifecycle::{ArtifactManager, Clock, ExpiryLedger, Namespace, SweepReport};
pub use batch_processor::{App, BatchProcessor, BatchSummary};
pub use job_state::{FailedEntry, JobHandle, JobState, StatusReport};
pub use student_processor::process_student;
