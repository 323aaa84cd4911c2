//! In-memory feature store.

use std::collections::BTreeMap;

use super::{FeatureTable, StoreConfig, StoredRecord, apply_batch};
use crate::codec::FeatureFormat;
use crate::cursor::{StreamingCursor, VecRowSupplier};
use crate::error::StoreError;
use crate::write::{ExecutedOp, WriteExecutor, WriteOutcome, WriteRequest};

/// Feature store keeping every record in a sorted map.
///
/// Version tokens have the form `{collection}:{batch}:{write}`, counting
/// executed batches and the writes within each batch.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    config: StoreConfig,
    records: BTreeMap<String, StoredRecord>,
    batch: u64,
    writes: u64,
    closed: bool,
}

impl MemoryFeatureStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Live or deleted record of `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    /// Number of live features.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.records.values().filter(|record| !record.deleted).count()
    }

    /// Stream every live feature in id order.
    ///
    /// The cursor reads a snapshot; later writes are not visible through it.
    pub fn read_all<F: FeatureFormat>(&self) -> Result<StreamingCursor<F>, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let rows = self
            .records
            .values()
            .filter(|record| !record.deleted)
            .map(|record| record.parts.clone().with_op(ExecutedOp::Read));
        Ok(StreamingCursor::new(VecRowSupplier::new(rows)))
    }

    /// Refuse further reads and writes.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl FeatureTable for MemoryFeatureStore {
    fn load(&mut self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn save(&mut self, record: &StoredRecord) -> Result<(), StoreError> {
        let id = record.parts.id().unwrap_or_default().to_owned();
        self.records.insert(id, record.clone());
        Ok(())
    }

    fn purge(&mut self, id: &str) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    fn next_version(&mut self) -> Result<String, StoreError> {
        self.writes = self.writes.saturating_add(1);
        Ok(format!(
            "{}:{}:{}",
            self.config.collection, self.batch, self.writes
        ))
    }
}

impl WriteExecutor for MemoryFeatureStore {
    fn execute<F: FeatureFormat>(&mut self, mut request: WriteRequest<F>) -> WriteOutcome<F> {
        if self.closed {
            return WriteOutcome::from_results(Vec::new(), None, Some(StoreError::Closed));
        }
        let order = self.config.sort_writes_by_id.then(|| request.sort_by_id());
        self.batch = self.batch.saturating_add(1);
        self.writes = 0;
        let report = apply_batch(self, request.into_intents());
        WriteOutcome::from_results(report.results, order, report.failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{ForwardCursor, SeekableCursor};
    use crate::error::CodecErrorKind;
    use crate::test_support::sample_feature;
    use crate::write::{ErrorCause, WriteIntent};
    use crate::{Feature, GeoFeatureFormat};
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> MemoryFeatureStore {
        MemoryFeatureStore::new(StoreConfig::new("roads"))
    }

    fn run(
        store: &mut MemoryFeatureStore,
        intents: Vec<WriteIntent<GeoFeatureFormat>>,
    ) -> Vec<(ExecutedOp, Option<String>)> {
        let mut request = WriteRequest::new();
        for intent in intents {
            request.push(intent);
        }
        let (mut cursor, failure) = store.execute(request).into_parts();
        assert!(failure.is_none());
        let mut seen = Vec::new();
        while cursor.try_next().expect("advance") {
            let op = cursor.op().expect("op").expect("executed op");
            let version = cursor.version().expect("version").map(String::from);
            seen.push((op, version));
        }
        seen
    }

    fn seed(store: &mut MemoryFeatureStore, id: &str) -> String {
        let created = run(store, vec![WriteIntent::create(sample_feature(id, "ignored"))]);
        created
            .into_iter()
            .find_map(|(_, version)| version)
            .expect("created version")
    }

    #[rstest]
    fn versions_follow_collection_batch_and_write(mut store: MemoryFeatureStore) {
        assert_eq!(seed(&mut store, "a"), "roads:1:1");
        assert_eq!(seed(&mut store, "b"), "roads:2:1");
    }

    #[rstest]
    fn create_collision_reports_exists(mut store: MemoryFeatureStore) {
        seed(&mut store, "a");
        let mut request = WriteRequest::new();
        request.push(WriteIntent::<GeoFeatureFormat>::create(sample_feature("a", "x")));
        let mut outcome = store.execute(request);
        let cursor = outcome.cursor_mut();
        cursor.first().expect("first");
        assert_eq!(
            cursor.error().expect("error").map(|error| error.kind),
            Some(CodecErrorKind::Write(ErrorCause::Exists))
        );
    }

    #[rstest]
    fn read_all_streams_live_features_only(mut store: MemoryFeatureStore) {
        seed(&mut store, "b");
        seed(&mut store, "a");
        seed(&mut store, "gone");
        run(&mut store, vec![WriteIntent::delete_by_id("gone", None)]);

        let mut cursor = store.read_all::<GeoFeatureFormat>().expect("cursor");
        let mut ids = Vec::new();
        while cursor.try_next().expect("advance") {
            assert_eq!(cursor.op().expect("op"), Some(ExecutedOp::Read));
            let feature: Feature = cursor.feature().expect("feature").cloned().expect("body");
            assert!(feature.geometry.is_some());
            ids.push(feature.id);
        }
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(store.live_count(), 2);
    }

    #[rstest]
    fn restore_brings_deleted_feature_back(mut store: MemoryFeatureStore) {
        seed(&mut store, "a");
        run(&mut store, vec![WriteIntent::delete_by_id("a", None)]);
        let restored = run(&mut store, vec![WriteIntent::restore_by_id("a", None)]);

        assert_eq!(restored.first().map(|(op, _)| *op), Some(ExecutedOp::Restored));
        assert!(store.get("a").is_some_and(|record| !record.deleted));
    }

    #[rstest]
    fn closed_store_fails_whole_batch(mut store: MemoryFeatureStore) {
        store.close();
        let mut request = WriteRequest::new();
        request.push(WriteIntent::<GeoFeatureFormat>::create(sample_feature("a", "x")));
        let outcome = store.execute(request);
        assert!(matches!(outcome.error(), Some(StoreError::Closed)));
        assert!(store.read_all::<GeoFeatureFormat>().is_err());
    }

    #[rstest]
    fn invalid_intents_keep_their_submission_slot(mut store: MemoryFeatureStore) {
        let mut request = WriteRequest::new();
        request.push(WriteIntent::<GeoFeatureFormat>::create(sample_feature("c", "x")));
        request.push(WriteIntent::delete_by_id("", None));
        request.push(WriteIntent::create(sample_feature("a", "x")));
        let (mut cursor, failure) = store.execute(request).into_parts();
        assert!(failure.is_none());

        let mut seen = Vec::new();
        while cursor.try_next().expect("advance") {
            let op = cursor.op().expect("op").expect("executed op");
            seen.push((op, cursor.id().expect("id").map(String::from)));
        }
        assert_eq!(
            seen,
            [
                (ExecutedOp::Created, Some(String::from("c"))),
                (ExecutedOp::Error, None),
                (ExecutedOp::Created, Some(String::from("a"))),
            ]
        );
    }

    #[rstest]
    fn unsorted_batches_report_in_execution_order(mut store: MemoryFeatureStore) {
        let mut unsorted = MemoryFeatureStore::new(
            StoreConfig::new("roads").with_sort_writes_by_id(false),
        );
        let intents = || {
            vec![
                WriteIntent::<GeoFeatureFormat>::create(sample_feature("b", "x")),
                WriteIntent::create(sample_feature("a", "x")),
            ]
        };
        let sorted_versions = run(&mut store, intents());
        let unsorted_versions = run(&mut unsorted, intents());

        // Sorted execution writes "a" first but still reports "b" first.
        assert_eq!(
            sorted_versions.first().and_then(|(_, version)| version.as_deref()),
            Some("roads:1:2")
        );
        assert_eq!(
            unsorted_versions.first().and_then(|(_, version)| version.as_deref()),
            Some("roads:1:1")
        );
    }
}
