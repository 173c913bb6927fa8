//! # Session engine errors

use thiserror::Error;

/// Surfaces only the failure that stops the engine task outright; transient storage
/// failures are logged and swallowed inline rather than raised here (§7).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage collaborator reported a permanent failure: {0}")]
    StoragePermanent(String),
}
