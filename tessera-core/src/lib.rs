//! Data-access core for geospatial feature stores.
//!
//! Features move between callers and backends in two shapes: assembled
//! (a [`Feature`] or a JSON object) and disassembled into [`FeatureParts`]
//! (id, version token, type tags, JSON body and geometry). A [`Codec`]
//! converts lazily between the two. Reads are exposed through cursors:
//! [`StreamingCursor`] walks backend rows with one row of lookahead and
//! [`HeapCacheCursor`] materializes them for random access and edits.
//! Writes are batches of [`WriteIntent`]s resolved against the stored state
//! with optimistic concurrency on version tokens.
//!
//! # Examples
//!
//! ```
//! use tessera_core::{
//!     ExecutedOp, Feature, ForwardCursor, GeoFeatureFormat, MemoryFeatureStore, StoreConfig,
//!     WriteExecutor, WriteIntent, WriteRequest,
//! };
//!
//! let mut store = MemoryFeatureStore::new(StoreConfig::new("landmarks"));
//! let request = WriteRequest::<GeoFeatureFormat>::new()
//!     .with(WriteIntent::create(Feature::new("tower")));
//! let (mut results, failure) = store.execute(request).into_parts();
//!
//! assert!(failure.is_none());
//! assert!(results.try_next().unwrap());
//! assert_eq!(results.op().unwrap(), Some(ExecutedOp::Created));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod cursor;
pub mod error;
mod feature;
mod row;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;
pub mod write;

pub use codec::{
    Codec, CodecFactory, FeatureFormat, FeatureParts, GeoFeatureFormat, GeometryCache,
    GeometryState, JsonFeatureFormat,
};
pub use cursor::{
    CursorResource, ForwardCursor, HeapCacheCursor, MutableCursor, RowSupplier, SeekableCursor,
    StreamingCursor, VecRowSupplier,
};
pub use error::{CodecError, CodecErrorKind, CursorError, StoreError};
pub use feature::{DEFAULT_FEATURE_TYPE, Feature};
pub use row::Row;
#[cfg(feature = "store-sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-sqlite")))]
pub use store::SqliteFeatureStore;
pub use store::{
    BatchReport, DEFAULT_FETCH_SIZE, FeatureTable, MemoryFeatureStore, StoreConfig, StoredRecord,
    apply_batch,
};
pub use write::{
    Decision, ErrorCause, ExecutedOp, ExecutedResult, IfConflict, IfExists, IfNotExists,
    IntentView, StoredState, SubmissionOrder, WriteExecutor, WriteIntent, WriteOp, WriteOutcome,
    WriteRequest, resolve, resolve_purge,
};
