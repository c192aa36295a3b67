//! Execution planning: stop/target derivation and trigger checklists.

pub mod guidance;
pub mod planner;

pub use guidance::{guidance, mode_title, Guidance};
pub use planner::{
    plan_execution, risk_reward, Direction, ExecutionContext, ExecutionPlan, Mode, ParseModeError,
};
