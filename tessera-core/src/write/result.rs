//! Results of executed write intents.

use std::collections::HashMap;

use crate::codec::{Codec, FeatureFormat, FeatureParts};
use crate::cursor::{HeapCacheCursor, MutableCursor};
use crate::error::{CodecError, StoreError};

use super::{ExecutedOp, SubmissionOrder, WriteRequest};

/// Why a write intent was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCause {
    /// The supplied version token did not match the stored version.
    Conflict,
    /// A feature with the same id already exists.
    Exists,
    /// The targeted feature does not exist.
    NotFound,
    /// The intent lacks an id or a required feature body.
    Invalid,
}

impl ErrorCause {
    /// Short description of the cause.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Conflict => "version token does not match the stored version",
            Self::Exists => "a feature with this id already exists",
            Self::NotFound => "the feature does not exist",
            Self::Invalid => "the intent lacks an id or a required feature",
        }
    }
}

/// Outcome of one executed intent, or one step of a PURGE.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedResult {
    /// What the backend did.
    pub op: ExecutedOp,
    /// Identifier the intent targeted.
    pub id: Option<String>,
    /// Resulting (or, for errors, current) feature; `None` reports `null`.
    pub feature: Option<FeatureParts>,
    /// Why the intent was rejected, for [`ExecutedOp::Error`].
    pub cause: Option<ErrorCause>,
    /// Execution position of the intent that produced this result.
    pub intent: usize,
}

impl ExecutedResult {
    /// A successful step producing `feature`.
    #[must_use]
    pub fn executed(op: ExecutedOp, feature: FeatureParts) -> Self {
        Self {
            op,
            id: feature.id().map(String::from),
            feature: Some(feature),
            cause: None,
            intent: 0,
        }
    }

    /// Nothing changed; `current` is reported when given.
    #[must_use]
    pub fn retained(id: Option<String>, current: Option<FeatureParts>) -> Self {
        Self {
            op: ExecutedOp::Retained,
            id,
            feature: current,
            cause: None,
            intent: 0,
        }
    }

    /// The intent was rejected; `current` carries the conflicting state.
    #[must_use]
    pub const fn error(cause: ErrorCause, id: Option<String>, current: Option<FeatureParts>) -> Self {
        Self {
            op: ExecutedOp::Error,
            id,
            feature: current,
            cause: Some(cause),
            intent: 0,
        }
    }

    /// Attribute the result to the intent executed at `intent`.
    #[must_use]
    pub const fn for_intent(mut self, intent: usize) -> Self {
        self.intent = intent;
        self
    }

    /// Drop the feature body, keeping id and version.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.feature = self.feature.map(|parts| {
            let mut slim = FeatureParts::new();
            slim.set_id(parts.id().map(String::from));
            slim.set_version(parts.version().map(String::from));
            slim
        });
        self
    }

    /// Convert into a codec carrying the executed op and any error.
    #[must_use]
    pub fn into_codec<F: FeatureFormat>(self) -> Codec<F> {
        let mut parts = self.feature.unwrap_or_default();
        if parts.id().is_none() {
            parts.set_id(self.id);
        }
        parts.set_op(Some(self.op));
        let mut codec = Codec::from_parts(parts);
        codec.set_error(self.cause.map(CodecError::from));
        codec
    }
}

/// Result of executing a [`WriteRequest`].
#[derive(Debug)]
pub enum WriteOutcome<F: FeatureFormat> {
    /// Every intent was executed; some may still report `ERROR`.
    Success(HeapCacheCursor<F>),
    /// The batch could not run to completion.
    Failure {
        /// Backend failure that stopped the batch.
        error: StoreError,
        /// Results of the intents executed before the failure.
        completed: HeapCacheCursor<F>,
    },
}

impl<F: FeatureFormat> WriteOutcome<F> {
    /// Assemble an outcome from executed results.
    ///
    /// When `order` is given the results are put back into submission order,
    /// both results of a PURGE staying together. The cursor also receives
    /// an id map for [`restore_input_order`] when every result has an id and
    /// the map reproduces that order.
    ///
    /// [`restore_input_order`]: MutableCursor::restore_input_order
    #[must_use]
    pub fn from_results(
        mut results: Vec<ExecutedResult>,
        order: Option<SubmissionOrder>,
        failure: Option<StoreError>,
    ) -> Self {
        let mut ranks = None;
        if let Some(order) = order {
            let rank = |result: &ExecutedResult| {
                order.submitted_index(result.intent).unwrap_or(usize::MAX)
            };
            results.sort_by_key(rank);
            ranks = rank_by_id(&results, rank);
            if ranks.is_none() {
                log::debug!("write results carry no usable id map");
            }
        }
        let codecs = results.into_iter().map(ExecutedResult::into_codec).collect();
        let mut cursor = HeapCacheCursor::from_codecs(codecs);
        if let Some(map) = ranks {
            cursor = cursor.with_original_order(map);
        }
        match failure {
            None => Self::Success(cursor),
            Some(error) => Self::Failure {
                error,
                completed: cursor,
            },
        }
    }

    /// Whether the whole batch ran.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Batch-level failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Cursor over the (completed) results.
    pub fn cursor_mut(&mut self) -> &mut HeapCacheCursor<F> {
        match self {
            Self::Success(cursor) | Self::Failure {
                completed: cursor, ..
            } => cursor,
        }
    }

    /// Split into the result cursor and the failure, if any.
    #[must_use]
    pub fn into_parts(self) -> (HeapCacheCursor<F>, Option<StoreError>) {
        match self {
            Self::Success(cursor) => (cursor, None),
            Self::Failure { error, completed } => (completed, Some(error)),
        }
    }
}

/// Submission rank of each id, if restoring by id reproduces `results`.
fn rank_by_id(
    results: &[ExecutedResult],
    rank: impl Fn(&ExecutedResult) -> usize,
) -> Option<HashMap<String, usize>> {
    let mut map = HashMap::with_capacity(results.len());
    let mut previous = 0;
    for result in results {
        let id = result.id.as_ref()?;
        let ranked = *map.entry(id.clone()).or_insert_with(|| rank(result));
        if ranked < previous {
            return None;
        }
        previous = ranked;
    }
    Some(map)
}

/// Executes batches of write intents.
pub trait WriteExecutor {
    /// Execute every intent of `request`, reporting one result per intent
    /// (two for a PURGE that performed its implied delete).
    fn execute<F: FeatureFormat>(&mut self, request: WriteRequest<F>) -> WriteOutcome<F>;
}
