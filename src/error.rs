//! Error types for runtime operations.

use std::fmt;

use thiserror::Error;

/// Which index a device selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Platform,
    Device,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKind::Platform => write!(f, "platform"),
            SelectionKind::Device => write!(f, "device"),
        }
    }
}

/// Error type for every backend and runtime operation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No platform was found, or the native enumeration call failed.
    #[error("Platform enumeration failed: {0}")]
    PlatformEnumeration(String),

    /// The selected platform exposes no device, or device enumeration failed.
    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    /// A platform or device index outside the enumerated range.
    #[error("{kind} index {index} out of range (available: {available})")]
    DeviceSelectionOutOfRange {
        kind: SelectionKind,
        index: usize,
        available: usize,
    },

    /// The native context could not be created.
    #[error("Context creation failed: {0}")]
    ContextCreation(String),

    /// The backend has no context yet (or was shut down).
    #[error("Backend is not initialized")]
    NotInitialized,

    /// The native compiler rejected the program.
    #[error("Program build failed:\n{log}")]
    CompileError { log: String },

    /// A persisted binary could not be turned into a program.
    #[error("Binary load failed: {0}")]
    BinaryLoad(String),

    /// The entry point does not exist or the kernel could not be created.
    #[error("Failed to create kernel '{name}': {reason}")]
    KernelCreation { name: String, reason: String },

    /// The compiled module could not be retrieved.
    #[error("Module extraction failed: {0}")]
    ModuleExtraction(String),

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Failed to bind kernel argument {slot}: {reason}")]
    ArgumentBinding { slot: u32, reason: String },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid work size: {0}")]
    InvalidWorkSize(String),

    /// The first global extent must be a multiple of the dispatch granularity.
    #[error("Global size {extent} is not a multiple of {granularity}")]
    GlobalSizeGranularity { extent: usize, granularity: usize },

    /// No command queue can be provided for the requested device.
    #[error("No command queue available for device {0}")]
    QueueUnavailable(usize),

    /// The handle was released or was issued by another backend instance.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns true when no further operation on the backend instance can
    /// succeed, so the caller may choose to abort.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::PlatformEnumeration(_)
                | RuntimeError::DeviceEnumeration(_)
                | RuntimeError::DeviceSelectionOutOfRange { .. }
                | RuntimeError::ContextCreation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RuntimeError::PlatformEnumeration("none".into()).is_fatal());
        assert!(RuntimeError::ContextCreation("boom".into()).is_fatal());
        assert!(
            RuntimeError::DeviceSelectionOutOfRange {
                kind: SelectionKind::Platform,
                index: 3,
                available: 1,
            }
            .is_fatal()
        );

        assert!(!RuntimeError::CompileError { log: "x".into() }.is_fatal());
        assert!(!RuntimeError::Transfer("short".into()).is_fatal());
        assert!(!RuntimeError::InvalidHandle("memory").is_fatal());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = RuntimeError::DeviceSelectionOutOfRange {
            kind: SelectionKind::Device,
            index: 4,
            available: 2,
        };
        assert_eq!(err.to_string(), "device index 4 out of range (available: 2)");

        let err = RuntimeError::KernelCreation {
            name: "missing".into(),
            reason: "not found".into(),
        };
        assert!(err.to_string().contains("'missing'"));

        let err = RuntimeError::CompileError {
            log: "line 3: expected ';'".into(),
        };
        assert!(err.to_string().ends_with("line 3: expected ';'"));
    }
}
