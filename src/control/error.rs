//! Error definitions for the control loop subsystem

use crate::output::OutputError;
use thiserror::Error;

/// Errors raised by a control loop or its engine
#[derive(Debug, Error)]
pub enum LoopError {
    /// An actuator, LED or speaker refused a command; only this tick is lost
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// The task driving a loop panicked or was aborted
    #[error("Loop task error: {0}")]
    TaskError(String),
}
