//! Error types for the estimator client.
//!
//! # Design
//! `ApiError` covers everything that can go wrong with one request. `NotFound`
//! gets a dedicated variant because callers frequently distinguish "the record
//! does not exist" from "the server returned an unexpected status." All other
//! non-2xx responses land in `HttpError` with the raw status code and body.
//!
//! `ScreenError` covers actions a screen refuses in its current state. Those
//! never reach the network. `SessionError` is a session store that could not
//! persist a write.

use thiserror::Error;

use crate::types::Id;

/// Errors produced while building requests or interpreting responses.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// No response was obtained (connection refused, timeout, ...).
    #[error("transport failed: {0}")]
    Transport(String),
}

/// Actions rejected by a resource screen before any request is built.
#[derive(Debug, Clone, Error)]
pub enum ScreenError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// A create/update for this screen is already in flight.
    #[error("a save is already in progress")]
    AlreadySubmitting,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    /// A per-record action (project estimate) is already running for this id.
    #[error("an action for record {0} is already running")]
    RecordBusy(Id),

    /// The record is not in the cached collection.
    #[error("record {0} is not loaded")]
    UnknownRecord(Id),

    #[error("failed to build request: {0}")]
    Request(#[from] ApiError),
}

/// A session write that did not stick.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to save session: {0}")]
    Persist(String),
}
