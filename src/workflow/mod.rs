pub mod result_flow;
pub mod stage;
pub mod student_ctx;

pub use result_flow::{LookupOutcome, NavigationTimings, ResultFlow};
pub use stage::{Stage, StageOutcome, StagePolicy, Transition};
pub use student_ctx::StudentCtx;
