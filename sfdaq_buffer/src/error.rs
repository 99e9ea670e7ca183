//! Error types for ring buffer operations

use thiserror::Error;

/// Errors that can occur while creating, attaching or addressing a ring buffer
#[derive(Error, Debug)]
pub enum BufferError {
    /// Region already exists
    #[error("Ring buffer already exists: {name}")]
    AlreadyExists {
        /// Buffer name
        name: String,
    },

    /// Region not found
    #[error("Ring buffer not found: {name}")]
    NotFound {
        /// Buffer name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing ring buffer: {name}")]
    PermissionDenied {
        /// Buffer name
        name: String,
    },

    /// Dimensions rejected before allocation
    #[error("Invalid buffer layout: {reason}")]
    InvalidLayout {
        /// What was wrong
        reason: String,
    },

    /// Existing region does not look like a ring buffer
    #[error("Ring buffer {name} is corrupted: {reason}")]
    Corrupted {
        /// Buffer name
        name: String,
        /// What failed validation
        reason: String,
    },

    /// Module id outside the buffer geometry
    #[error("Module {module_id} out of range (buffer has {n_modules} modules)")]
    ModuleOutOfRange {
        /// Requested module
        module_id: u64,
        /// Modules in the buffer
        n_modules: usize,
    },

    /// Slot index outside the buffer geometry
    #[error("Slot {slot} out of range (buffer has {n_slots} slots)")]
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
        /// Slots in the buffer
        n_slots: usize,
    },

    /// Another writer already holds this module
    #[error("Module {module_id} already has a writer")]
    ModuleClaimed {
        /// Claimed module
        module_id: u64,
    },

    /// Descriptor handed to a writer of a different module
    #[error("Writer for module {expected} got a frame for module {got}")]
    ModuleMismatch {
        /// Module owned by the writer
        expected: u64,
        /// Module named in the descriptor
        got: u64,
    },

    /// Payload length differs from the per-module payload size
    #[error("Payload is {got} bytes, expected {expected}")]
    PayloadSize {
        /// Per-module payload size
        expected: usize,
        /// Length supplied
        got: usize,
    },

    /// Refused to release a region whose owner is still running
    #[error("Ring buffer {name} is still owned by live process {pid}")]
    OwnerAlive {
        /// Buffer name
        name: String,
        /// Owner process ID
        pid: u32,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for ring buffer operations
pub type BufferResult<T> = Result<T, BufferError>;
