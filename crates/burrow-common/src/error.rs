//! Unified error types for the burrow workspace.
//!
//! Launch-time variants (`Setup`, `Mount`) are fatal to the operation that
//! raised them. `ResourceControl` is reported by the engine but never aborts
//! a run. Teardown paths log every variant and keep going.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BurrowError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration or argument value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Preparing the container process failed before it was started.
    #[error("container setup failed: {message}")]
    Setup {
        /// Description of the failed setup step.
        message: String,
    },

    /// A mount, unmount, or root switch step failed.
    #[error("mount step `{step}` failed: {source}")]
    Mount {
        /// Name of the failed step.
        step: &'static str,
        /// Underlying errno.
        source: std::io::Error,
    },

    /// A cgroup path could not be resolved or a control file could not be written.
    #[error("resource control ({subsystem}) failed: {message}")]
    ResourceControl {
        /// Subsystem the failure belongs to.
        subsystem: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The requested lifecycle transition is not allowed from the current state.
    #[error("invalid state transition: {message}")]
    StateViolation {
        /// Description of the rejected transition.
        message: String,
    },

    /// The network collaborator rejected an operation.
    #[error("network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl BurrowError {
    /// Wraps an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps an errno returned by a mount-related syscall.
    #[must_use]
    pub fn mount(step: &'static str, errno: i32) -> Self {
        Self::Mount {
            step,
            source: std::io::Error::from_raw_os_error(errno),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BurrowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_error_names_step_and_errno() {
        let err = BurrowError::mount("pivot_root", 22); // EINVAL
        let text = err.to_string();
        assert!(text.contains("pivot_root"));
        assert!(text.contains("Invalid argument"));
    }

    #[test]
    fn not_found_display() {
        let err = BurrowError::NotFound {
            kind: "container",
            id: "c1".into(),
        };
        assert_eq!(err.to_string(), "container not found: c1");
    }
}
