//! Error taxonomy for the compositor core.
//!
//! Kinds mirror the propagation policy: construction-time and driver
//! shutdown errors bubble to the process entry point, everything else is
//! absorbed by the draw loop (logged, pane marked dead, loop continues).

use thiserror::Error;

/// Result type alias using paneloom's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the compositor core.
#[derive(Debug, Error)]
pub enum Error {
    /// Screen driver init/fini/show failed. Fatal at startup, best-effort at shutdown.
    #[error("screen driver error: {0}")]
    Driver(String),

    /// A split was rejected because a resulting pane would be smaller than
    /// the configured minimum. No-op, not fatal.
    #[error("split rejected: resulting pane would be smaller than the minimum size")]
    InvalidSplit,

    /// A captured tree referenced a pane index that doesn't exist on restore.
    /// The offending leaf is replaced with a placeholder; not fatal.
    #[error("restore mismatch: pane index {0} out of range")]
    RestoreMismatch(i32),

    /// Storage read/write failed. Reads fall back to empty, writes stay dirty
    /// for a later retry. Not fatal.
    #[error("storage error: {0}")]
    Storage(String),

    /// An app's task exited with an error. Logged; the pane is removed.
    #[error("app exited with error: {0}")]
    AppRun(String),

    /// No factory registered under this name.
    #[error("no app registered under name {0:?}")]
    RegistryMiss(String),

    /// Pane not found (stale handle).
    #[error("pane not found: {0:?}")]
    PaneNotFound(crate::pane::PaneId),

    /// Workspace not found.
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(i32),
}
