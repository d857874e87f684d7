//! Unified error handling for the facelink bridge.
//!
//! Every fatal condition maps to a distinct process exit code so the
//! supervising daemon can tell load failures apart from initialize faults
//! without parsing logs.

use thiserror::Error;

/// Exit code: the module library could not be loaded.
pub const EXIT_LOAD_FAULT: i32 = 10;
/// Exit code: the library loaded but exported no matching entry type.
pub const EXIT_NO_ENTRY: i32 = 11;
/// Exit code: the selected module faulted during initialize.
pub const EXIT_INIT_FAULT: i32 = 12;
/// Exit code: the shared-memory region could not be created or opened.
pub const EXIT_MEMORY: i32 = 13;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Module library could not be loaded or validated
    #[error("Module load failed: {0}")]
    Load(String),

    /// A plugin-local dependency could not be resolved
    #[error("Dependency '{0}' not found next to the module")]
    DependencyNotFound(String),

    /// Registry ABI does not match the bridge's contract version
    #[error("ABI mismatch: bridge speaks v{expected}, module built against v{found}")]
    AbiMismatch { expected: u32, found: u32 },

    /// No exported descriptor matched the tracking module base contract
    #[error("No entry type found in '{0}'")]
    NoEntryType(String),

    /// Module initialize reported a fault
    #[error("Initialize failed: {0}")]
    Initialize(String),

    /// Shared memory errors
    #[error("Memory error: {0}")]
    Memory(String),
}

impl BridgeError {
    /// Create a module load error
    pub fn load<S: Into<String>>(msg: S) -> Self {
        BridgeError::Load(msg.into())
    }

    /// Create a shared-memory error
    pub fn memory<S: Into<String>>(msg: S) -> Self {
        BridgeError::Memory(msg.into())
    }

    /// Process exit code for this error. Fatal conditions only; recoverable
    /// tick faults never reach this path.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::NoEntryType(_) => EXIT_NO_ENTRY,
            BridgeError::Initialize(_) => EXIT_INIT_FAULT,
            BridgeError::Memory(_) => EXIT_MEMORY,
            BridgeError::Io(_)
            | BridgeError::Load(_)
            | BridgeError::DependencyNotFound(_)
            | BridgeError::AbiMismatch { .. } => EXIT_LOAD_FAULT,
        }
    }
}

/// Convenience type alias for Results using BridgeError
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
