//! 标定流程（saga）
//!
//! 步骤按顺序执行，游标每次前进一格；某一步失败时游标从当前位置逐格后退，
//! 依次撤销每个步骤，撤销失败只记录日志，不影响后续撤销。
//!
//! 第 0 步失败时没有任何步骤生效过，不做撤销。

use crate::connection::MessageConnection;
use crate::steps::{CalibrationStep, StepContext, StepError};
use armlink_driver::RobotClient;
use thiserror::Error;
use tracing::{info, warn};

/// 标定流程的标识
pub const CALIBRATION_WORKFLOW_ID: &str = "XYZ robot calibration";

/// 流程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Prepare,
    InteractiveAlign,
    Finish,
    Completed,
    Aborted,
}

/// 流程被中止（已尽力撤销）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{workflow_id} workflow was aborted. Reason: {reason}")]
pub struct WorkflowAbortedError {
    pub workflow_id: String,
    pub reason: String,
}

/// 标定流程
///
/// 每个标定请求创建一个，`start` 返回后丢弃。
/// 流程只借用机械臂客户端和连接，不拥有它们。
pub struct CalibrationWorkflow<'a, C: MessageConnection> {
    workflow_id: String,
    steps: Vec<CalibrationStep>,
    cursor: usize,
    state: WorkflowState,
    robot: &'a RobotClient,
    connection: &'a mut C,
}

impl<'a, C: MessageConnection> CalibrationWorkflow<'a, C> {
    /// 标准三步标定流程
    pub fn new(robot: &'a RobotClient, connection: &'a mut C) -> Self {
        Self::with_steps(
            CALIBRATION_WORKFLOW_ID,
            CalibrationStep::SEQUENCE.to_vec(),
            robot,
            connection,
        )
    }

    pub fn with_steps(
        workflow_id: impl Into<String>,
        steps: Vec<CalibrationStep>,
        robot: &'a RobotClient,
        connection: &'a mut C,
    ) -> Self {
        let state = steps
            .first()
            .map_or(WorkflowState::Completed, |step| step.state());
        Self {
            workflow_id: workflow_id.into(),
            steps,
            cursor: 0,
            state,
            robot,
            connection,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// 当前步骤下标
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn context(&mut self) -> StepContext<'_, C> {
        StepContext {
            robot: self.robot,
            connection: &mut *self.connection,
        }
    }

    /// 运行流程
    ///
    /// 成功时状态为 `Completed`；失败时撤销已执行的步骤，状态为 `Aborted`，
    /// 返回的错误携带触发失败的原因。
    pub fn start(&mut self) -> Result<(), WorkflowAbortedError> {
        info!("{} workflow started", self.workflow_id);
        self.cursor = 0;

        while self.cursor < self.steps.len() {
            let step = self.steps[self.cursor];
            self.state = step.state();
            if let Err(e) = step.execute(&mut self.context()) {
                warn!("{} workflow step {:?} failed: {}", self.workflow_id, step, e);
                self.revert();
                self.state = WorkflowState::Aborted;
                return Err(self.aborted(&e));
            }
            self.cursor += 1;
        }

        self.state = WorkflowState::Completed;
        info!("{} workflow completed", self.workflow_id);
        Ok(())
    }

    /// 从游标位置逐格后退撤销到第 0 步
    fn revert(&mut self) {
        if self.cursor == 0 {
            return;
        }
        loop {
            let step = self.steps[self.cursor];
            if let Err(e) = step.revert(&mut self.context()) {
                warn!("{} workflow revert of {:?} failed: {}", self.workflow_id, step, e);
            }
            if self.cursor == 0 {
                break;
            }
            self.cursor -= 1;
        }
    }

    fn aborted(&self, error: &StepError) -> WorkflowAbortedError {
        WorkflowAbortedError {
            workflow_id: self.workflow_id.clone(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_error_display() {
        let err = WorkflowAbortedError {
            workflow_id: CALIBRATION_WORKFLOW_ID.to_string(),
            reason: "user input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "XYZ robot calibration workflow was aborted. Reason: user input"
        );
    }

    #[test]
    fn test_step_states() {
        let states: Vec<_> = CalibrationStep::SEQUENCE.iter().map(|s| s.state()).collect();
        assert_eq!(
            states,
            vec![
                WorkflowState::Prepare,
                WorkflowState::InteractiveAlign,
                WorkflowState::Finish
            ]
        );
    }
}
