//! Facade crate for the Tessera feature store core.
//!
//! This crate re-exports the codec, cursor and write types and exposes the
//! SQLite backend behind a feature flag.

#![forbid(unsafe_code)]

pub use tessera_core::{
    Codec, CodecError, CodecErrorKind, CodecFactory, CursorError, CursorResource, ErrorCause,
    ExecutedOp, ExecutedResult, Feature, FeatureFormat, FeatureParts, ForwardCursor,
    GeoFeatureFormat, HeapCacheCursor, IfConflict, IfExists, IfNotExists, JsonFeatureFormat,
    MemoryFeatureStore, MutableCursor, RowSupplier, SeekableCursor, StoreConfig, StoreError,
    StreamingCursor, WriteExecutor, WriteIntent, WriteOp, WriteOutcome, WriteRequest,
};

#[cfg(feature = "store-sqlite")]
pub use tessera_core::SqliteFeatureStore;
