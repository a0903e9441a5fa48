//! # Error Handling
//!
//! Unified error taxonomy for migration operations. Only credential failures
//! and input precondition failures stop an operation outright; single-item and
//! single-page remote faults are recovered locally by the batch executor and
//! the paged fetcher respectively.

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::CredentialError;
use crate::http::ApiError;
use crate::store::StoreError;

/// Errors surfaced by a synchronization operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credential acquisition failed; no remote calls were attempted.
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),

    /// A local input precondition failed before any remote mutation.
    #[error("{message}")]
    Precondition { message: String },

    /// Paginated enumeration aborted part-way through.
    #[error(
        "enumeration aborted after {pages_fetched} page(s) ({records_decoded} record(s) decoded): {source}"
    )]
    Fetch {
        pages_fetched: usize,
        records_decoded: usize,
        #[source]
        source: ApiError,
    },

    /// A non-batched remote call failed.
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),

    /// Reading or writing a state file failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Precondition failure with a message naming the offending input.
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Precondition failure for an empty working set read from `path`.
    pub fn empty_input(what: &str, path: &PathBuf) -> Self {
        Self::Precondition {
            message: format!("no {} found; check the input file at {}", what, path.display()),
        }
    }
}
