//! Error types shared by codecs, cursors and stores.
//!
//! The three enums mirror the three failure classes of the data-access core:
//! a [`CodecError`] is attached to a single codec and inspected by the caller,
//! a [`CursorError`] is a structural fault raised immediately, and a
//! [`StoreError`] reports a backend that could not run an operation at all.

use thiserror::Error;

use crate::write::ErrorCause;

/// Classifies a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecErrorKind {
    /// `decode` was called without an assembled feature.
    MissingFeature,
    /// The feature could not be serialised into its JSON body.
    Serialize,
    /// The JSON body could not be parsed back into a feature.
    Deserialize,
    /// The binary geometry could not be encoded or decoded.
    Geometry,
    /// The backend rejected the write intent that produced this codec.
    Write(ErrorCause),
}

/// Failure recorded on a codec after a decode, encode or rejected write.
///
/// Codec errors never abort a batch. They are attached to the codec so that
/// callers can report per-item failures inside an otherwise successful run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct CodecError {
    /// What went wrong.
    pub kind: CodecErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl CodecError {
    /// Build an error of `kind` with the given message.
    pub fn new(kind: CodecErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn missing_feature() -> Self {
        Self::new(
            CodecErrorKind::MissingFeature,
            "decode requires an assembled feature",
        )
    }
}

impl From<ErrorCause> for CodecError {
    fn from(cause: ErrorCause) -> Self {
        Self::new(CodecErrorKind::Write(cause), cause.describe())
    }
}

/// Structural faults raised by cursors.
///
/// These are programming errors: the caller asked for a row the cursor is not
/// positioned on, advanced past the end, or used a closed cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    /// A row accessor was used while the cursor was not on a valid row.
    #[error("cursor is not positioned on a row (position {position})")]
    OutOfBounds {
        /// Position at the time of the call.
        position: i64,
    },
    /// `next` was called although no further row exists.
    #[error("cursor has no more rows")]
    Exhausted,
    /// The cursor was already closed.
    #[error("cursor is closed")]
    Closed,
    /// Lazily deriving a part or the assembled feature failed.
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
    /// The backend failed while fetching the next row.
    #[error("backend failure: {0}")]
    Store(#[from] StoreError),
}

/// Backend failures that prevent an operation from running.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation}: {source}")]
    Sqlite {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error from `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A stored JSON body could not be read back.
    #[error("stored body of feature {id} is not valid JSON: {source}")]
    Json {
        /// Identifier of the affected feature.
        id: String,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The store has been closed.
    #[error("store is closed")]
    Closed,
    /// An injected or backend-specific failure.
    #[error("backend failure during {operation}: {message}")]
    Backend {
        /// Description of the failed operation.
        operation: &'static str,
        /// Human readable detail.
        message: String,
    },
}
