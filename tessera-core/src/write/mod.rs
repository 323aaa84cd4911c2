//! Write intents and the conflict-resolution vocabulary.
//!
//! A caller builds a [`WriteRequest`] of [`WriteIntent`]s and hands it to a
//! [`WriteExecutor`]. The executor reports, per intent, the
//! [`ExecutedOp`] it actually performed. How an intent is resolved against
//! the stored state is defined once, in [`resolve`], so every backend honours
//! the same matrix.

mod resolve;
mod result;

pub use resolve::{Decision, IntentView, StoredState, resolve, resolve_purge};
pub use result::{ErrorCause, ExecutedResult, WriteExecutor, WriteOutcome};

use crate::codec::{Codec, FeatureFormat, FeatureParts};

/// Operation requested by a write intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    /// Create a new feature; fails when the id is taken.
    Create,
    /// Replace an existing feature.
    Update,
    /// Create, or update when the id is taken.
    Put,
    /// Delete the live feature.
    Delete,
    /// Delete, then purge the deleted state.
    Purge,
    /// Bring a deleted feature back to life.
    Restore,
}

impl WriteOp {
    /// Whether the operation needs a feature body rather than just an id.
    #[must_use]
    pub const fn requires_feature(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Put)
    }

    /// Policy applied when the feature exists.
    #[must_use]
    pub const fn default_if_exists(self) -> IfExists {
        match self {
            Self::Create => IfExists::Fail,
            Self::Update | Self::Put => IfExists::Replace,
            Self::Delete => IfExists::Delete,
            Self::Purge => IfExists::Purge,
            Self::Restore => IfExists::Retain,
        }
    }

    /// Policy applied when the feature does not exist.
    #[must_use]
    pub const fn default_if_not_exists(self) -> IfNotExists {
        match self {
            Self::Create | Self::Put => IfNotExists::Create,
            Self::Update | Self::Restore => IfNotExists::Fail,
            Self::Delete | Self::Purge => IfNotExists::Retain,
        }
    }

    /// Lower-case name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Purge => "purge",
            Self::Restore => "restore",
        }
    }
}

/// What to do when the targeted feature exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfExists {
    /// Report an error.
    Fail,
    /// Leave the feature as it is.
    Retain,
    /// Replace it with the supplied feature.
    Replace,
    /// Delete it.
    Delete,
    /// Delete it and purge the deleted state.
    Purge,
}

/// What to do when the supplied version token does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfConflict {
    /// Report an error carrying the current version.
    Fail,
    /// Leave the feature as it is.
    Retain,
    /// Ignore the mismatch and proceed.
    Replace,
}

/// What to do when the targeted feature does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfNotExists {
    /// Report an error.
    Fail,
    /// Do nothing.
    Retain,
    /// Create the supplied feature.
    Create,
}

/// Operation a backend actually performed for a write intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutedOp {
    /// The feature was read.
    Read,
    /// Nothing changed.
    Retained,
    /// A new feature was created.
    Created,
    /// The feature was replaced.
    Updated,
    /// The feature was moved to the deleted state.
    Deleted,
    /// The deleted state was removed for good.
    Purged,
    /// A deleted feature was brought back.
    Restored,
    /// The intent was rejected.
    Error,
}

impl ExecutedOp {
    /// Upper-case name of the executed operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Retained => "RETAINED",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Purged => "PURGED",
            Self::Restored => "RESTORED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ExecutedOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested modification.
///
/// Intents are consumed exactly once by the executor.
#[derive(Debug, Clone)]
pub struct WriteIntent<F: FeatureFormat> {
    op: WriteOp,
    codec: Codec<F>,
    no_result: bool,
    if_exists: IfExists,
    if_conflict: IfConflict,
    if_not_exists: IfNotExists,
}

impl<F: FeatureFormat> WriteIntent<F> {
    /// Build an intent with the default policies of `op`.
    #[must_use]
    pub const fn new(op: WriteOp, codec: Codec<F>) -> Self {
        Self {
            op,
            codec,
            no_result: false,
            if_exists: op.default_if_exists(),
            if_conflict: IfConflict::Fail,
            if_not_exists: op.default_if_not_exists(),
        }
    }

    /// Create `feature`.
    #[must_use]
    pub fn create(feature: F::Feature) -> Self {
        Self::new(WriteOp::Create, Codec::from_feature(feature))
    }

    /// Update `feature`; atomic when it carries a version token.
    #[must_use]
    pub fn update(feature: F::Feature) -> Self {
        Self::new(WriteOp::Update, Codec::from_feature(feature))
    }

    /// Create or update `feature`.
    #[must_use]
    pub fn put(feature: F::Feature) -> Self {
        Self::new(WriteOp::Put, Codec::from_feature(feature))
    }

    /// Delete the feature; atomic when it carries a version token.
    #[must_use]
    pub fn delete(feature: F::Feature) -> Self {
        Self::new(WriteOp::Delete, Codec::from_feature(feature))
    }

    /// Delete by id, optionally guarded by a version token.
    #[must_use]
    pub fn delete_by_id(id: impl Into<String>, version: Option<String>) -> Self {
        Self::new(WriteOp::Delete, id_codec(id.into(), version))
    }

    /// Delete and purge the feature.
    #[must_use]
    pub fn purge(feature: F::Feature) -> Self {
        Self::new(WriteOp::Purge, Codec::from_feature(feature))
    }

    /// Delete and purge by id, optionally guarded by a version token.
    #[must_use]
    pub fn purge_by_id(id: impl Into<String>, version: Option<String>) -> Self {
        Self::new(WriteOp::Purge, id_codec(id.into(), version))
    }

    /// Restore a deleted feature by id, optionally guarded by a version token.
    #[must_use]
    pub fn restore_by_id(id: impl Into<String>, version: Option<String>) -> Self {
        Self::new(WriteOp::Restore, id_codec(id.into(), version))
    }

    /// Suppress the feature body in this intent's results.
    #[must_use]
    pub const fn with_no_result(mut self, no_result: bool) -> Self {
        self.no_result = no_result;
        self
    }

    /// Override the policy applied when the feature exists.
    #[must_use]
    pub const fn with_if_exists(mut self, policy: IfExists) -> Self {
        self.if_exists = policy;
        self
    }

    /// Override the policy applied on a version mismatch.
    #[must_use]
    pub const fn with_if_conflict(mut self, policy: IfConflict) -> Self {
        self.if_conflict = policy;
        self
    }

    /// Override the policy applied when the feature does not exist.
    #[must_use]
    pub const fn with_if_not_exists(mut self, policy: IfNotExists) -> Self {
        self.if_not_exists = policy;
        self
    }

    /// Requested operation.
    #[must_use]
    pub const fn op(&self) -> WriteOp {
        self.op
    }

    /// Whether results should omit the feature body.
    #[must_use]
    pub const fn no_result(&self) -> bool {
        self.no_result
    }

    /// Policy applied when the feature exists.
    #[must_use]
    pub const fn if_exists(&self) -> IfExists {
        self.if_exists
    }

    /// Policy applied on a version mismatch.
    #[must_use]
    pub const fn if_conflict(&self) -> IfConflict {
        self.if_conflict
    }

    /// Policy applied when the feature does not exist.
    #[must_use]
    pub const fn if_not_exists(&self) -> IfNotExists {
        self.if_not_exists
    }

    /// Codec carrying the feature or the bare id and version.
    #[must_use]
    pub const fn codec(&self) -> &Codec<F> {
        &self.codec
    }

    /// Mutable codec.
    pub const fn codec_mut(&mut self) -> &mut Codec<F> {
        &mut self.codec
    }

    /// Identifier targeted by the intent.
    pub fn id(&mut self) -> Option<&str> {
        self.codec.id()
    }

    /// Version token guarding the intent.
    pub fn version(&mut self) -> Option<&str> {
        self.codec.version()
    }

    /// Whether the intent carries a feature body.
    #[must_use]
    pub fn has_feature(&self) -> bool {
        self.codec.feature_ref().is_some() || self.codec.parts().json().is_some()
    }

    /// Replace the version token, e.g. after an implied delete.
    pub fn set_version(&mut self, version: Option<String>) {
        self.codec.set_version(version);
    }

    /// Decoded parts for the backend, or the decode failure.
    pub fn parts(&mut self) -> Result<&FeatureParts, ErrorCause> {
        if !self.codec.is_decoded() && self.codec.feature_ref().is_some() {
            self.codec.decode(false);
        }
        if self.codec.has_error() {
            return Err(ErrorCause::Invalid);
        }
        Ok(self.codec.parts())
    }

    /// Summary of the intent used by the resolver.
    pub fn view(&mut self) -> IntentView {
        let has_feature = self.has_feature();
        IntentView {
            op: self.op,
            if_exists: self.if_exists,
            if_conflict: self.if_conflict,
            if_not_exists: self.if_not_exists,
            version: self.version().map(String::from),
            has_feature,
        }
    }
}

fn id_codec<F: FeatureFormat>(id: String, version: Option<String>) -> Codec<F> {
    let mut parts = FeatureParts::new().with_id(id);
    parts.set_version(version);
    Codec::from_parts(parts)
}

/// Ordered batch of write intents.
#[derive(Debug, Clone)]
pub struct WriteRequest<F: FeatureFormat> {
    intents: Vec<WriteIntent<F>>,
}

impl<F: FeatureFormat> Default for WriteRequest<F> {
    fn default() -> Self {
        Self {
            intents: Vec::new(),
        }
    }
}

impl<F: FeatureFormat> WriteRequest<F> {
    /// Create an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an intent.
    #[must_use]
    pub fn with(mut self, intent: WriteIntent<F>) -> Self {
        self.intents.push(intent);
        self
    }

    /// Append an intent in place.
    pub fn push(&mut self, intent: WriteIntent<F>) {
        self.intents.push(intent);
    }

    /// Number of intents.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the request holds no intents.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Intents in their current order.
    #[must_use]
    pub fn intents(&self) -> &[WriteIntent<F>] {
        &self.intents
    }

    /// Consume the request.
    #[must_use]
    pub fn into_intents(self) -> Vec<WriteIntent<F>> {
        self.intents
    }

    /// Sort intents by id, remembering where each one was submitted.
    ///
    /// Backends sort to take row locks in a stable order. The sort is
    /// stable, so intents sharing an id keep their relative order; intents
    /// without an id sort first.
    pub fn sort_by_id(&mut self) -> SubmissionOrder {
        let mut keyed: Vec<(Option<String>, usize, WriteIntent<F>)> =
            std::mem::take(&mut self.intents)
                .into_iter()
                .enumerate()
                .map(|(index, mut intent)| (intent.id().map(String::from), index, intent))
                .collect();
        keyed.sort_by(|(left, _, _), (right, _, _)| left.cmp(right));
        let mut submitted = Vec::with_capacity(keyed.len());
        self.intents = keyed
            .into_iter()
            .map(|(_, index, intent)| {
                submitted.push(index);
                intent
            })
            .collect();
        SubmissionOrder { submitted }
    }
}

/// Where each intent of a sorted [`WriteRequest`] was submitted.
///
/// Indexed by execution position; lets [`WriteOutcome::from_results`] report
/// results in submission order whether or not the intents carry an id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOrder {
    submitted: Vec<usize>,
}

impl SubmissionOrder {
    /// Submission index of the intent executed at `executed`.
    #[must_use]
    pub fn submitted_index(&self, executed: usize) -> Option<usize> {
        self.submitted.get(executed).copied()
    }

    /// Number of intents covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.submitted.len()
    }

    /// Whether no intent is covered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.submitted.is_empty()
    }
}
