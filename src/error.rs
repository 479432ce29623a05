//! Errors produced by the build engine and its database.
//!
//! None of these are recovered from locally: they propagate out of every
//! enclosing recursive build and abort the command.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No build script exists for a target.  Carries every candidate path
    /// that was tried, in search order.
    #[error("cannot find script for target {target}\ntried:\n{}", .tried.join("\n"))]
    ScriptNotFound { target: String, tried: Vec<String> },

    /// A script exited unsuccessfully or could not be launched.  `status`
    /// describes the exit status, the signal, or the launch failure.
    #[error("{command}: build failed ({status})")]
    BuildFailed { command: String, status: String },

    #[error("incompatible database version {found} (expected {expected}), regenerate it with \"init\"")]
    IncompatibleDatabase { found: u32, expected: u32 },

    #[error("corrupt database: {0}")]
    CorruptDatabase(String),

    #[error("cannot find redo database, create one with \"init\"; tried:\n{}", .tried.join("\n"))]
    DatabaseMissing { tried: Vec<String> },

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A target depends on itself, directly or through other targets.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A build script broke the dependency declaration protocol.
    #[error("protocol: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
