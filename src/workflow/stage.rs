//! 结果页导航的阶段与转移表
//!
//! 每个阶段有固定的策略：
//!
//! | 阶段 | 策略 | 找不到时 |
//! |------|------|----------|
//! | roll_input | 必需 | `StageNotFound(roll_input)` |
//! | registration_input | 必需 | `StageNotFound(registration_input)` |
//! | submit_button | 必需 | `StageNotFound(submit_button)` |
//! | confirm | 可选 | 直接进入下一阶段 |
//! | view_link | 必需 | `StageNotFound(view_link)` |
//! | result_content | 软超时 | 记录 `ContentNotReady`，继续提取 |
//! | extract | 终点 | - |

use std::fmt;

use crate::error::{NavigationError, NavigationWarning};

/// 导航阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RollInput,
    RegistrationInput,
    SubmitButton,
    Confirm,
    ViewLink,
    ResultContent,
    Extract,
}

/// 阶段策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// 找不到即失败
    Required,
    /// 找不到就跳过
    Optional,
    /// 超时只记录警告
    Soft(NavigationWarning),
}

/// 单个阶段的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// 控件出现并完成了操作
    Completed,
    /// 等待超时
    Missing,
}

/// 阶段转移
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next {
        next: Stage,
        warning: Option<NavigationWarning>,
    },
    Done,
    Fail(NavigationError),
}

impl Stage {
    /// 流程起点
    pub const FIRST: Stage = Stage::RollInput;

    /// 阶段名称（用于失败原因）
    pub fn name(self) -> &'static str {
        match self {
            Stage::RollInput => "roll_input",
            Stage::RegistrationInput => "registration_input",
            Stage::SubmitButton => "submit_button",
            Stage::Confirm => "confirm",
            Stage::ViewLink => "view_link",
            Stage::ResultContent => "result_content",
            Stage::Extract => "extract",
        }
    }

    pub fn policy(self) -> StagePolicy {
        match self {
            Stage::Confirm => StagePolicy::Optional,
            Stage::ResultContent => StagePolicy::Soft(NavigationWarning::ContentNotReady),
            _ => StagePolicy::Required,
        }
    }

    /// 固定顺序中的下一个阶段
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::RollInput => Some(Stage::RegistrationInput),
            Stage::RegistrationInput => Some(Stage::SubmitButton),
            Stage::SubmitButton => Some(Stage::Confirm),
            Stage::Confirm => Some(Stage::ViewLink),
            Stage::ViewLink => Some(Stage::ResultContent),
            Stage::ResultContent => Some(Stage::Extract),
            Stage::Extract => None,
        }
    }

    /// 根据执行结果决定下一步
    pub fn transition(self, outcome: StageOutcome) -> Transition {
        let warning = match (outcome, self.policy()) {
            (StageOutcome::Completed, _) | (StageOutcome::Missing, StagePolicy::Optional) => None,
            (StageOutcome::Missing, StagePolicy::Soft(warning)) => Some(warning),
            (StageOutcome::Missing, StagePolicy::Required) => {
                return Transition::Fail(NavigationError::StageNotFound(self));
            }
        };

        match self.next() {
            Some(next) => Transition::Next { next, warning },
            None => Transition::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_visits_every_stage_in_order() {
        let mut stage = Stage::FIRST;
        let mut visited = vec![stage];
        loop {
            match stage.transition(StageOutcome::Completed) {
                Transition::Next { next, warning } => {
                    assert!(warning.is_none());
                    visited.push(next);
                    stage = next;
                }
                Transition::Done => break,
                Transition::Fail(e) => panic!("unexpected failure: {}", e),
            }
        }
        assert_eq!(
            visited,
            vec![
                Stage::RollInput,
                Stage::RegistrationInput,
                Stage::SubmitButton,
                Stage::Confirm,
                Stage::ViewLink,
                Stage::ResultContent,
                Stage::Extract,
            ]
        );
    }

    #[test]
    fn test_required_stages_fail_when_missing() {
        for stage in [
            Stage::RollInput,
            Stage::RegistrationInput,
            Stage::SubmitButton,
            Stage::ViewLink,
        ] {
            assert_eq!(
                stage.transition(StageOutcome::Missing),
                Transition::Fail(NavigationError::StageNotFound(stage))
            );
        }
    }

    #[test]
    fn test_confirm_is_optional() {
        assert_eq!(
            Stage::Confirm.transition(StageOutcome::Missing),
            Transition::Next {
                next: Stage::ViewLink,
                warning: None
            }
        );
    }

    #[test]
    fn test_content_timeout_is_soft() {
        assert_eq!(
            Stage::ResultContent.transition(StageOutcome::Missing),
            Transition::Next {
                next: Stage::Extract,
                warning: Some(NavigationWarning::ContentNotReady)
            }
        );
    }

    #[test]
    fn test_failure_reason_names_stage() {
        let err = NavigationError::StageNotFound(Stage::ViewLink);
        assert_eq!(err.to_string(), "StageNotFound(view_link)");
    }
}
