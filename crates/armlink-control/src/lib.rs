//! # ArmLink Control
//!
//! 机械臂高层流程：目前只有标定流程。
//!
//! 标定流程按 `Prepare → InteractiveAlign → Finish` 的顺序执行，
//! 交互对齐阶段直接接管操作员的连接，直到操作员确认或放弃。
//! 任一步骤失败时，已执行的步骤按相反顺序撤销。
//!
//! ```no_run
//! use armlink_control::{CalibrationWorkflow, MessageConnection};
//! use armlink_driver::RobotClient;
//!
//! fn calibrate(robot: &RobotClient, connection: &mut impl MessageConnection) {
//!     let mut workflow = CalibrationWorkflow::new(robot, connection);
//!     if let Err(e) = workflow.start() {
//!         eprintln!("{e}");
//!     }
//! }
//! ```

pub mod connection;
pub mod steps;
pub mod workflow;

pub use connection::{ConnectionError, MessageConnection};
pub use steps::{CalibrationStep, StepContext, StepError};
pub use workflow::{
    CALIBRATION_WORKFLOW_ID, CalibrationWorkflow, WorkflowAbortedError, WorkflowState,
};
