use thiserror::Error;

use crate::validate::Violation;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("infeasible pack {pack_id}: {size} bytes exceeds the largest rung limit of {limit} bytes")]
    InfeasiblePack {
        pack_id: String,
        size: u64,
        limit: u64,
    },

    #[error("invalid redundancy config: {0}")]
    InvalidRedundancyConfig(String),

    #[error(
        "capacity exceeded: block {block} copy {copy} needs {needed} bytes, no eligible medium (largest free: {largest_free})"
    )]
    CapacityExceeded {
        block: usize,
        copy: u32,
        needed: u64,
        largest_free: u64,
    },

    #[error("plan invalid: {0}")]
    PlanInvalid(#[from] Violation),

    #[error("planning aborted")]
    Aborted,
}

impl PlanError {
    /// Process exit code for this failure kind. Code 2 is left to clap usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlanError::Io(_) | PlanError::Format(_) => 1,
            PlanError::InfeasiblePack { .. } => 3,
            PlanError::InvalidRedundancyConfig(_) => 4,
            PlanError::CapacityExceeded { .. } => 5,
            PlanError::PlanInvalid(_) => 6,
            PlanError::Aborted => 7,
        }
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(e: serde_json::Error) -> Self {
        PlanError::Format(format!("json: {e}"))
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, PlanError>;
