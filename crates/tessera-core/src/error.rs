//! Error types for all row-layer operations.

use std::collections::HashMap;
use thiserror::Error;

/// Top-level error type for row-layer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An optimistic-concurrency precondition was not met: the row already
    /// exists on insert, or its stored `(rowVersion, createDate)` no longer
    /// matches the caller's snapshot on update/delete. Callers retry with
    /// refreshed state.
    #[error("conditional check failed for ({partition_key}, {sort_key}): {message}")]
    ConditionalCheckFailed {
        partition_key: String,
        sort_key: String,
        message: String,
    },

    /// The backend returned a shape this layer cannot decode.
    #[error("unexpected response: {reason}")]
    UnexpectedResponse { reason: String },

    /// A polymorphic read found a row-type tag with no registered provider.
    #[error("no provider registered for row type '{provided}'")]
    UnexpectedType { provided: String },

    /// A value could not be carried through the diff/expression path
    /// (unsupported attribute type, unrepresentable payload).
    #[error("unable to update: {reason}")]
    UnableToUpdate { reason: String },

    /// At least one statement in a bulk write failed. `message_map` counts
    /// occurrences per `code:message` signature; the caller must assume
    /// partial application and reconcile.
    #[error("{error_count} statement(s) failed in bulk write")]
    BatchErrorsReturned {
        error_count: usize,
        message_map: HashMap<String, usize>,
    },

    /// Transport-level failure surfaced unchanged from the RPC client.
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a `ConditionalCheckFailed` for the given composite key.
    pub fn conditional_check(
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::ConditionalCheckFailed {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            message: message.into(),
        }
    }

    /// Build an `UnexpectedResponse` with the given reason.
    pub fn unexpected_response(reason: impl Into<String>) -> Self {
        Error::UnexpectedResponse {
            reason: reason.into(),
        }
    }

    /// Wrap an arbitrary RPC-client error as a transport failure.
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Transport(Box::new(source))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
