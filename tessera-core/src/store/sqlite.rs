//! SQLite-backed feature store.
//!
//! All collections share one `features` table keyed by `(collection, id)`.
//! A row holds either the live or the deleted state of a feature; the
//! geometry is stored as its binary encoding. Batch counters live in
//! `collection_batches` so version tokens stay unique across reopened
//! connections.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use super::{FeatureTable, StoreConfig, StoredRecord, apply_batch};
use crate::codec::{FeatureFormat, FeatureParts};
use crate::cursor::{RowSupplier, StreamingCursor};
use crate::error::StoreError;
use crate::write::{ExecutedOp, WriteExecutor, WriteOutcome, WriteRequest};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS features (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    version TEXT NOT NULL,
    feature_type TEXT,
    properties_type TEXT,
    json TEXT,
    geometry BLOB,
    deleted INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS collection_batches (
    collection TEXT PRIMARY KEY,
    batch INTEGER NOT NULL
);
";

const SELECT_COLUMNS: &str = "id, version, feature_type, properties_type, json, geometry, deleted";

fn sql(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { operation, source }
}

/// Feature store persisting into a SQLite database.
pub struct SqliteFeatureStore {
    connection: Option<Rc<Connection>>,
    config: StoreConfig,
}

impl fmt::Debug for SqliteFeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteFeatureStore")
            .field("config", &self.config)
            .field("closed", &self.connection.is_none())
            .finish_non_exhaustive()
    }
}

impl SqliteFeatureStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(sql("open database"))?;
        Self::with_connection(connection, config)
    }

    /// Create a store in a private in-memory database.
    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(sql("open database"))?;
        Self::with_connection(connection, config)
    }

    fn with_connection(connection: Connection, config: StoreConfig) -> Result<Self, StoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(sql("create schema"))?;
        Ok(Self {
            connection: Some(Rc::new(connection)),
            config,
        })
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stream every live feature of the collection in id order.
    ///
    /// Rows are fetched `fetch_size` at a time as the cursor advances.
    pub fn read_all<F: FeatureFormat>(&self) -> Result<StreamingCursor<F>, StoreError> {
        let connection = Rc::clone(self.connection()?);
        Ok(StreamingCursor::new(PagedRows::new(
            connection,
            self.config.collection.clone(),
            self.config.fetch_size,
        )))
    }

    /// Live or deleted record of `id`.
    pub fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let connection = self.connection()?;
        load_record(connection, &self.config.collection, id)
    }

    /// Release the connection once no cursor holds it any more.
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            log::debug!("closed store for {}", self.config.collection);
        }
    }

    fn connection(&self) -> Result<&Rc<Connection>, StoreError> {
        self.connection.as_ref().ok_or(StoreError::Closed)
    }
}

impl WriteExecutor for SqliteFeatureStore {
    fn execute<F: FeatureFormat>(&mut self, mut request: WriteRequest<F>) -> WriteOutcome<F> {
        let order = self.config.sort_writes_by_id.then(|| request.sort_by_id());
        let connection = match self.connection() {
            Ok(connection) => Rc::clone(connection),
            Err(error) => return WriteOutcome::from_results(Vec::new(), None, Some(error)),
        };
        let mut table = match SqliteTable::begin(&connection, &self.config.collection) {
            Ok(table) => table,
            Err(error) => return WriteOutcome::from_results(Vec::new(), None, Some(error)),
        };
        let report = apply_batch(&mut table, request.into_intents());
        // Completed intents are kept even when the batch stopped early, so
        // the results handed back describe what is actually stored.
        match table.commit() {
            Ok(()) => WriteOutcome::from_results(report.results, order, report.failure),
            Err(error) => WriteOutcome::from_results(Vec::new(), None, Some(error)),
        }
    }
}

/// One write batch running inside a transaction.
struct SqliteTable<'c> {
    transaction: Transaction<'c>,
    collection: &'c str,
    batch: i64,
    writes: u64,
}

impl<'c> SqliteTable<'c> {
    fn begin(connection: &'c Connection, collection: &'c str) -> Result<Self, StoreError> {
        let transaction = connection
            .unchecked_transaction()
            .map_err(sql("begin transaction"))?;
        let batch: i64 = transaction
            .query_row(
                "INSERT INTO collection_batches (collection, batch) VALUES (?1, 1)
                 ON CONFLICT (collection) DO UPDATE SET batch = batch + 1
                 RETURNING batch",
                params![collection],
                |row| row.get(0),
            )
            .map_err(sql("allocate batch number"))?;
        Ok(Self {
            transaction,
            collection,
            batch,
            writes: 0,
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        self.transaction
            .commit()
            .map_err(sql("commit write batch"))
    }
}

impl FeatureTable for SqliteTable<'_> {
    fn load(&mut self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        load_record(&self.transaction, self.collection, id)
    }

    fn save(&mut self, record: &StoredRecord) -> Result<(), StoreError> {
        let parts = &record.parts;
        self.transaction
            .execute(
                "INSERT INTO features
                    (collection, id, version, feature_type, properties_type, json, geometry, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (collection, id) DO UPDATE SET
                    version = excluded.version,
                    feature_type = excluded.feature_type,
                    properties_type = excluded.properties_type,
                    json = excluded.json,
                    geometry = excluded.geometry,
                    deleted = excluded.deleted",
                params![
                    self.collection,
                    parts.id(),
                    parts.version(),
                    parts.feature_type(),
                    parts.properties_type(),
                    parts.json(),
                    parts.geometry().peek_binary(),
                    record.deleted,
                ],
            )
            .map_err(sql("save feature"))?;
        Ok(())
    }

    fn purge(&mut self, id: &str) -> Result<(), StoreError> {
        self.transaction
            .execute(
                "DELETE FROM features WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
            )
            .map_err(sql("purge feature"))?;
        Ok(())
    }

    fn next_version(&mut self) -> Result<String, StoreError> {
        self.writes = self.writes.saturating_add(1);
        Ok(format!("{}:{}:{}", self.collection, self.batch, self.writes))
    }
}

fn load_record(
    connection: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<StoredRecord>, StoreError> {
    connection
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM features WHERE collection = ?1 AND id = ?2"),
            params![collection, id],
            |row| {
                let deleted: bool = row.get(6)?;
                Ok(StoredRecord {
                    parts: read_parts(row)?,
                    deleted,
                })
            },
        )
        .optional()
        .map_err(sql("load feature"))
}

fn read_parts(row: &Row<'_>) -> rusqlite::Result<FeatureParts> {
    let mut parts = FeatureParts::new();
    parts.set_id(row.get(0)?);
    parts.set_version(row.get(1)?);
    parts.set_feature_type(row.get(2)?);
    parts.set_properties_type(row.get(3)?);
    parts.set_json(row.get(4)?);
    parts.set_binary_geometry(row.get(5)?);
    Ok(parts)
}

/// Keyset-paginated supplier of the live rows of one collection.
struct PagedRows {
    connection: Rc<Connection>,
    collection: String,
    page_size: i64,
    buffered: VecDeque<FeatureParts>,
    last_id: Option<String>,
    drained: bool,
}

impl PagedRows {
    fn new(connection: Rc<Connection>, collection: String, fetch_size: usize) -> Self {
        Self {
            connection,
            collection,
            page_size: i64::try_from(fetch_size.max(1)).unwrap_or(i64::MAX),
            buffered: VecDeque::new(),
            last_id: None,
            drained: false,
        }
    }

    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let mut statement = self
            .connection
            .prepare_cached(&format!(
                "SELECT {SELECT_COLUMNS} FROM features
                 WHERE collection = ?1 AND deleted = 0 AND (?2 IS NULL OR id > ?2)
                 ORDER BY id LIMIT ?3"
            ))
            .map_err(sql("prepare page query"))?;
        let rows = statement
            .query_map(
                params![self.collection, self.last_id, self.page_size],
                read_parts,
            )
            .map_err(sql("read page"))?;
        let mut fetched: i64 = 0;
        for row in rows {
            let parts = row.map_err(sql("read row"))?.with_op(ExecutedOp::Read);
            self.last_id = parts.id().map(String::from);
            self.buffered.push_back(parts);
            fetched = fetched.saturating_add(1);
        }
        self.drained = fetched < self.page_size;
        log::debug!("fetched {fetched} rows of {}", self.collection);
        Ok(())
    }
}

impl RowSupplier for PagedRows {
    fn try_load_next(&mut self, parts: &mut FeatureParts) -> Result<bool, StoreError> {
        if self.buffered.is_empty() && !self.drained {
            self.fetch_page()?;
        }
        let Some(row) = self.buffered.pop_front() else {
            return Ok(false);
        };
        *parts = row;
        Ok(true)
    }

    fn close(&mut self) {
        self.buffered.clear();
        self.drained = true;
    }
}
