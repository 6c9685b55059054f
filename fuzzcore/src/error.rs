//! The core's error taxonomy. Every fallible operation returns one of these
//! variants rather than an in-band sentinel; only orchestration-level code
//! (queue interaction, datastore commits) is expected to let one escape past
//! a session or bisection boundary uncaught.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FuzzCoreError>;

#[derive(Debug, Error)]
pub enum FuzzCoreError {
    #[error("target binary not found under build dir: {0}")]
    InvalidTarget(PathBuf),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("corpus merge timed out")]
    MergeTimedOut,

    #[error("corpus merge failed: {0}")]
    MergeFailed(String),

    #[error("build setup failed for revision {revision}")]
    BuildSetup { revision: i64 },

    #[error("bad build at revision {revision}")]
    BadBuild { revision: i64 },

    #[error("testcase target already deleted")]
    InvalidTestCase,

    #[error("revision {revision} not found in revision list")]
    BuildNotFound { revision: i64 },

    #[error("task deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
