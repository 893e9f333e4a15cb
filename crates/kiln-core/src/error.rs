//! Error types for plugin resolution and supervision.
//!
//! One shared hierarchy covers discovery, integrity verification,
//! introspection, and session launch, so every crate in the workspace can
//! return the same [`Result`] and callers can classify failures with the
//! `is_*` predicates.

use crate::ComponentClass;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for plugin resolution and supervision.
#[derive(Error, Debug)]
pub enum Error {
    /// A plugin search pattern could not be expanded.
    ///
    /// Raised for malformed glob patterns and for filesystem errors hit
    /// while walking matches. The search space itself is unreliable at
    /// that point, so discovery aborts rather than registering a partial
    /// view of the installed plugins.
    #[error("invalid plugin search pattern {pattern:?}: {source}")]
    Pattern {
        /// The pattern that failed to expand
        pattern: String,
        /// Underlying glob or filesystem error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error outside of pattern expansion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No readable checksum sidecar exists for a binary.
    ///
    /// Recoverable: the candidate is skipped and discovery continues.
    #[error("no checksum found for {}", .path.display())]
    ChecksumMissing {
        /// The binary that lacks a digest sidecar
        path: PathBuf,
    },

    /// A binary's digest does not match its checksum sidecar.
    ///
    /// Recoverable: the candidate is skipped and discovery continues.
    #[error("{algorithm} mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        /// The binary whose digest was verified
        path: PathBuf,
        /// Algorithm identifier, e.g. `sha256`
        algorithm: &'static str,
        /// Digest read from the sidecar file
        expected: String,
        /// Digest computed from the binary's bytes
        actual: String,
    },

    /// A plugin binary failed to answer the introspection subcommand.
    ///
    /// Covers spawn failures and non-zero exits. Fatal for that plugin's
    /// registration, not for the discovery pass as a whole.
    #[error("plugin {plugin} failed to describe itself: {message}")]
    Describe {
        /// Canonical name of the offending plugin
        plugin: String,
        /// What went wrong, including captured stderr where available
        message: String,
    },

    /// A plugin's capability manifest could not be decoded.
    #[error("plugin {plugin} returned a malformed description: {source}")]
    DescriptionDecode {
        /// Canonical name of the offending plugin
        plugin: String,
        /// The JSON decode failure
        #[source]
        source: serde_json::Error,
    },

    /// An operation exceeded its configured time limit.
    #[error("operation timed out after {duration_secs}s: {operation}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Duration in seconds before timeout occurred
        duration_secs: u64,
    },

    /// A capability lookup found no registered component.
    #[error("no {} named {key:?} is registered", .class.as_str())]
    ComponentNotFound {
        /// The registry namespace that was searched
        class: ComponentClass,
        /// The composite key that was looked up
        key: String,
    },

    /// Every port in the configured RPC range is already leased.
    #[error("no free RPC port in range {min}-{max}")]
    NoFreePort {
        /// Lower bound of the configured range
        min: u16,
        /// Upper bound of the configured range
        max: u16,
    },

    /// A plugin subprocess could not be started.
    ///
    /// Deferred from discovery on purpose: an executable reference that
    /// never resolved is passed through so this error names the real
    /// command instead of an earlier, more ambiguous failure.
    #[error("failed to start plugin {}: {source}", .command.display())]
    Spawn {
        /// The command that failed to spawn
        command: PathBuf,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A launched plugin did not complete the RPC handshake.
    #[error("plugin handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure
        message: String,
    },
}

impl Error {
    /// Returns `true` for integrity failures (missing or mismatched
    /// checksum), the recoverable class discovery skips over.
    #[must_use]
    pub const fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMissing { .. } | Self::ChecksumMismatch { .. }
        )
    }

    /// Returns `true` if this is a failed capability lookup.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ComponentNotFound { .. })
    }

    /// Returns `true` if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for introspection failures (execution or decode),
    /// which skip one plugin's registration without aborting the pass.
    #[must_use]
    pub const fn is_introspection_error(&self) -> bool {
        matches!(
            self,
            Self::Describe { .. } | Self::DescriptionDecode { .. }
        )
    }
}

/// Result type alias for plugin resolution operations.
pub type Result<T> = std::result::Result<T, Error>;
