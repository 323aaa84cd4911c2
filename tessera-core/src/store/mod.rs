//! Reference backends executing write batches and streaming reads.
//!
//! Both backends keep features in a *table* of [`StoredRecord`]s keyed by
//! id, each either live or deleted. [`apply_batch`] resolves every intent
//! against that table through [`FeatureTable`], so the in-memory and the
//! SQLite store share one implementation of the write rules and differ only
//! in how records are loaded and saved.

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

use serde::Deserialize;

pub use memory::MemoryFeatureStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteFeatureStore;

use crate::codec::{FeatureFormat, FeatureParts};
use crate::error::StoreError;
use crate::write::{
    Decision, ErrorCause, ExecutedOp, ExecutedResult, StoredState, WriteIntent, WriteOp, resolve,
    resolve_purge,
};

/// Rows fetched per backend round trip unless configured otherwise.
pub const DEFAULT_FETCH_SIZE: usize = 100;

/// Settings shared by the reference backends.
///
/// Deserialisable so a hosting service can keep it in its own configuration
/// files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the feature collection the store operates on.
    pub collection: String,
    /// Rows fetched per backend round trip by streaming reads.
    pub fetch_size: usize,
    /// Whether write batches are executed in id order.
    pub sort_writes_by_id: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: String::from("features"),
            fetch_size: DEFAULT_FETCH_SIZE,
            sort_writes_by_id: true,
        }
    }
}

impl StoreConfig {
    /// Configuration for `collection` with default settings.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Set the number of rows fetched per round trip; zero is raised to one.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// Choose whether write batches are executed in id order.
    #[must_use]
    pub const fn with_sort_writes_by_id(mut self, sort: bool) -> Self {
        self.sort_writes_by_id = sort;
        self
    }
}

/// A feature as held by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Stored parts; the geometry is kept in binary form.
    pub parts: FeatureParts,
    /// Whether this is the deleted state of the feature.
    pub deleted: bool,
}

impl StoredRecord {
    /// State seen by the write resolver.
    #[must_use]
    pub fn state(&self) -> StoredState {
        let version = self.parts.version().unwrap_or_default().to_owned();
        if self.deleted {
            StoredState::Deleted { version }
        } else {
            StoredState::Live { version }
        }
    }
}

/// Record-level access a backend offers to [`apply_batch`].
pub trait FeatureTable {
    /// Load the live or deleted record of `id`.
    fn load(&mut self, id: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Insert or replace the record of its id.
    fn save(&mut self, record: &StoredRecord) -> Result<(), StoreError>;

    /// Remove every state of `id`.
    fn purge(&mut self, id: &str) -> Result<(), StoreError>;

    /// Allocate the version token of the next written state.
    fn next_version(&mut self) -> Result<String, StoreError>;
}

/// Results of one [`apply_batch`] run.
#[derive(Debug)]
pub struct BatchReport {
    /// Results in execution order.
    pub results: Vec<ExecutedResult>,
    /// Backend failure that stopped the batch.
    pub failure: Option<StoreError>,
}

/// Execute `intents` in order against `table`.
///
/// Rejected intents produce `ERROR` results and the batch carries on. A
/// backend failure stops the batch; the results of the intents executed
/// before it are still reported.
pub fn apply_batch<T, F>(table: &mut T, intents: Vec<WriteIntent<F>>) -> BatchReport
where
    T: FeatureTable + ?Sized,
    F: FeatureFormat,
{
    let total = intents.len();
    let mut results = Vec::with_capacity(total);
    for (index, mut intent) in intents.into_iter().enumerate() {
        let start = results.len();
        let applied = apply_intent(table, &mut intent, &mut results);
        for result in results.iter_mut().skip(start) {
            result.intent = index;
        }
        if let Err(failure) = applied {
            log::warn!(
                "write batch stopped after {} of {total} intents: {failure}",
                results.len()
            );
            return BatchReport {
                results,
                failure: Some(failure),
            };
        }
        if intent.no_result() {
            let tail = results.split_off(start);
            results.extend(tail.into_iter().map(ExecutedResult::without_body));
        }
    }
    let rejected = results
        .iter()
        .filter(|result| result.op == ExecutedOp::Error)
        .count();
    log::debug!("applied {total} write intents, {rejected} rejected");
    BatchReport {
        results,
        failure: None,
    }
}

fn apply_intent<T, F>(
    table: &mut T,
    intent: &mut WriteIntent<F>,
    results: &mut Vec<ExecutedResult>,
) -> Result<(), StoreError>
where
    T: FeatureTable + ?Sized,
    F: FeatureFormat,
{
    let view = intent.view();
    let Some(id) = intent.id().filter(|id| !id.is_empty()).map(String::from) else {
        results.push(ExecutedResult::error(ErrorCause::Invalid, None, None));
        return Ok(());
    };
    let stored = table.load(&id)?;
    let state = stored.as_ref().map_or(StoredState::Absent, StoredRecord::state);
    let decision = resolve(&view, &state);
    let written = carry_out(table, intent, &id, stored, decision, results)?;

    if view.op == WriteOp::Purge
        && decision == Decision::Delete
        && let Some(deleted) = written
    {
        let version = view
            .version
            .as_ref()
            .and_then(|_| deleted.parts.version().map(String::from));
        let step = resolve_purge(version.as_deref(), &deleted.state());
        carry_out(table, intent, &id, Some(deleted), step, results)?;
    }
    Ok(())
}

/// Perform `decision`, returning the record it wrote, if any.
fn carry_out<T, F>(
    table: &mut T,
    intent: &mut WriteIntent<F>,
    id: &str,
    stored: Option<StoredRecord>,
    decision: Decision,
    results: &mut Vec<ExecutedResult>,
) -> Result<Option<StoredRecord>, StoreError>
where
    T: FeatureTable + ?Sized,
    F: FeatureFormat,
{
    let current = stored.map(|record| record.parts);
    let (op, mut record) = match decision {
        Decision::Retain { with_current } => {
            results.push(ExecutedResult::retained(
                Some(id.to_owned()),
                current.filter(|_| with_current),
            ));
            return Ok(None);
        }
        Decision::Fail {
            cause,
            with_current,
        } => {
            results.push(ExecutedResult::error(
                cause,
                Some(id.to_owned()),
                current.filter(|_| with_current),
            ));
            return Ok(None);
        }
        Decision::Purge => {
            table.purge(id)?;
            let parts = current.unwrap_or_else(|| FeatureParts::new().with_id(id));
            results.push(ExecutedResult::executed(ExecutedOp::Purged, parts));
            return Ok(None);
        }
        Decision::Create | Decision::Update => {
            let parts = match incoming_parts(intent, id) {
                Ok(parts) => parts,
                Err(cause) => {
                    results.push(ExecutedResult::error(cause, Some(id.to_owned()), None));
                    return Ok(None);
                }
            };
            let op = if decision == Decision::Create {
                ExecutedOp::Created
            } else {
                ExecutedOp::Updated
            };
            (op, StoredRecord { parts, deleted: false })
        }
        Decision::Delete | Decision::Restore => {
            let parts = current.unwrap_or_else(|| FeatureParts::new().with_id(id));
            let deleted = decision == Decision::Delete;
            let op = if deleted {
                ExecutedOp::Deleted
            } else {
                ExecutedOp::Restored
            };
            (op, StoredRecord { parts, deleted })
        }
    };

    record.parts.set_op(None);
    record.parts.set_version(Some(table.next_version()?));
    table.save(&record)?;
    results.push(ExecutedResult::executed(op, record.parts.clone()));
    Ok(Some(record))
}

/// Parts of the intent's feature as they will be stored.
fn incoming_parts<F: FeatureFormat>(
    intent: &mut WriteIntent<F>,
    id: &str,
) -> Result<FeatureParts, ErrorCause> {
    let mut parts = intent.parts()?.clone();
    parts
        .geometry_mut()
        .ensure_binary()
        .map_err(|_| ErrorCause::Invalid)?;
    parts.set_id(Some(id.to_owned()));
    Ok(parts)
}
