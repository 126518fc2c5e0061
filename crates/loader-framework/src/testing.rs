//! In-memory connector for exercising the loader without a database.
//!
//! [`MemoryConnector`] keeps every table as a list of [`InsertRow`]s, honours
//! the all-or-nothing contract of [`Connection::write_batch`], interprets
//! [`PostLoadStep`]s, and records enough bookkeeping (connection lifetimes,
//! truncations, which worker wrote through which connection) for tests to
//! check the loader's guarantees.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{Connection, Connector};
use crate::error::ConnectionError;
use crate::generator::BatchWriter;
use crate::loader::current_worker;
use crate::statement::{InsertRow, PostLoadStep, SqlValue};
use crate::watermark::{
    select_watermarks_sql, WATERMARK_KEY_COLUMN, WATERMARK_TABLE, WATERMARK_VALUE_COLUMN,
};

const WATERMARK_COLUMNS: &[&str] = &[WATERMARK_KEY_COLUMN, WATERMARK_VALUE_COLUMN];

type RowPredicate = Arc<dyn Fn(&InsertRow) -> bool + Send + Sync>;

/// Open and close ticks of one connection on the store's event clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub opened: u64,
    /// `None` while the connection is still open (or was dropped unclosed).
    pub closed: Option<u64>,
}

impl Lifetime {
    /// Whether both connections were open at some common tick.
    pub fn overlaps(&self, other: &Lifetime) -> bool {
        let ends_before = |a: &Lifetime, b: &Lifetime| a.closed.is_some_and(|c| c < b.opened);
        !ends_before(self, other) && !ends_before(other, self)
    }
}

/// A [`BatchWriter`] appending to `rows`, for exercising generators directly.
pub fn writer(rows: &mut Vec<InsertRow>) -> BatchWriter<'_> {
    BatchWriter::new(rows)
}

/// Shared state behind every connection of one [`MemoryConnector`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<InsertRow>>>,
    truncations: Mutex<Vec<String>>,
    executed_sql: Mutex<Vec<(u64, String)>>,
    last_writes: Mutex<HashMap<String, u64>>,
    writers: Mutex<BTreeMap<usize, BTreeSet<Option<usize>>>>,
    lifetimes: Mutex<BTreeMap<usize, Lifetime>>,
    clock: AtomicU64,
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Rows currently stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<InsertRow> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        lock(&self.tables).get(table).map_or(0, Vec::len)
    }

    /// Tables truncated so far, in order.
    pub fn truncations(&self) -> Vec<String> {
        lock(&self.truncations).clone()
    }

    /// Opaque SQL post-load steps executed so far, with the tick they ran at.
    pub fn executed_sql(&self) -> Vec<(u64, String)> {
        lock(&self.executed_sql).clone()
    }

    /// Tick of the last committed write into `table`.
    pub fn last_write(&self, table: &str) -> Option<u64> {
        lock(&self.last_writes).get(table).copied()
    }

    /// Pool workers seen calling `write_batch`, per connection id.
    ///
    /// `None` marks a write issued outside any pool worker.
    pub fn writers_per_connection(&self) -> BTreeMap<usize, BTreeSet<Option<usize>>> {
        lock(&self.writers).clone()
    }

    /// Open and close ticks per connection id.
    pub fn lifetimes(&self) -> BTreeMap<usize, Lifetime> {
        lock(&self.lifetimes).clone()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.connections_closed.load(Ordering::SeqCst)
    }

    /// Stored watermark values keyed by entity key.
    pub fn watermarks(&self) -> BTreeMap<String, u64> {
        self.rows(WATERMARK_TABLE)
            .iter()
            .filter_map(|row| {
                let key = row.get(WATERMARK_KEY_COLUMN)?.as_text()?;
                let value = row.get(WATERMARK_VALUE_COLUMN)?.as_i64()?;
                Some((key, value as u64))
            })
            .collect()
    }

    fn recount(
        &self,
        table: &str,
        key_column: &str,
        count_column: &str,
        link_table: &str,
        link_column: &str,
    ) -> u64 {
        let mut tables = lock(&self.tables);

        let mut counts: HashMap<i64, i32> = HashMap::new();
        for row in tables.get(link_table).into_iter().flatten() {
            if let Some(key) = row.get(link_column).and_then(SqlValue::as_i64) {
                *counts.entry(key).or_default() += 1;
            }
        }

        let Some(rows) = tables.get_mut(table) else {
            return 0;
        };
        for (ordinal, row) in rows.iter_mut().enumerate() {
            // Rows without an explicit key column take their insertion ordinal,
            // as an auto-increment column would.
            let key = row
                .get(key_column)
                .and_then(SqlValue::as_i64)
                .unwrap_or(ordinal as i64 + 1);
            let count = counts.get(&key).copied().unwrap_or(0);
            if let Some(pos) = row
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(count_column))
            {
                row.values[pos] = SqlValue::Int(count);
            }
        }
        rows.len() as u64
    }
}

/// Connector whose connections all share one [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    fail_rows: Option<RowPredicate>,
    fail_truncate: Option<String>,
    refuse_connections: bool,
    write_delay: Option<Duration>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            fail_rows: None,
            fail_truncate: None,
            refuse_connections: false,
            write_delay: None,
        }
    }

    /// Reject any batch containing a row matching `predicate`.
    pub fn fail_rows_where(
        mut self,
        predicate: impl Fn(&InsertRow) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_rows = Some(Arc::new(predicate));
        self
    }

    /// Make truncating `table` fail.
    pub fn fail_truncate(mut self, table: impl Into<String>) -> Self {
        self.fail_truncate = Some(table.into());
        self
    }

    /// Make every connection attempt fail.
    pub fn refuse_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Sleep inside every batch write, widening the window for interleaving.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, ConnectionError> {
        if self.refuse_connections {
            return Err(ConnectionError::Connect("connection refused".to_string()));
        }
        let id = self.store.connections_opened.fetch_add(1, Ordering::SeqCst);
        let opened = self.store.tick();
        lock(&self.store.lifetimes).insert(id, Lifetime { opened, closed: None });
        Ok(MemoryConnection {
            id,
            store: Arc::clone(&self.store),
            fail_rows: self.fail_rows.clone(),
            fail_truncate: self.fail_truncate.clone(),
            write_delay: self.write_delay,
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One connection to a [`MemoryStore`].
pub struct MemoryConnection {
    id: usize,
    store: Arc<MemoryStore>,
    fail_rows: Option<RowPredicate>,
    fail_truncate: Option<String>,
    write_delay: Option<Duration>,
}

impl MemoryConnection {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn truncate(&mut self, table: &str) -> Result<(), ConnectionError> {
        if self.fail_truncate.as_deref() == Some(table) {
            return Err(ConnectionError::Statement(format!(
                "permission denied for table {table}"
            )));
        }
        lock(&self.store.tables).remove(table);
        lock(&self.store.truncations).push(table.to_string());
        Ok(())
    }

    async fn write_batch(&mut self, rows: &[InsertRow]) -> Result<u64, ConnectionError> {
        lock(&self.store.writers)
            .entry(self.id)
            .or_default()
            .insert(current_worker());
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let rejected = self
            .fail_rows
            .as_ref()
            .and_then(|pred| rows.iter().find(|row| pred(row)));
        if let Some(row) = rejected {
            return Err(ConnectionError::Statement(format!(
                "injected failure on {} row",
                row.table
            )));
        }

        {
            let mut tables = lock(&self.store.tables);
            let mut last_writes = lock(&self.store.last_writes);
            let tick = self.store.tick();
            for row in rows {
                tables.entry(row.table.to_string()).or_default().push(row.clone());
                last_writes.insert(row.table.to_string(), tick);
            }
        }
        Ok(rows.len() as u64)
    }

    async fn post_load(&mut self, step: &PostLoadStep) -> Result<u64, ConnectionError> {
        match step {
            PostLoadStep::RecountReferences {
                table,
                key_column,
                count_column,
                link_table,
                link_column,
            } => Ok(self
                .store
                .recount(table, key_column, count_column, link_table, link_column)),
            PostLoadStep::RegisterWatermark { key, table } => {
                let count = self.store.row_count(table) as i64;
                lock(&self.store.tables)
                    .entry(WATERMARK_TABLE.to_string())
                    .or_default()
                    .push(InsertRow::new(
                        WATERMARK_TABLE,
                        WATERMARK_COLUMNS,
                        vec![SqlValue::from(*key), SqlValue::BigInt(count)],
                    ));
                Ok(1)
            }
            PostLoadStep::Sql(sql) => {
                let tick = self.store.tick();
                lock(&self.store.executed_sql).push((tick, sql.clone()));
                Ok(0)
            }
        }
    }

    async fn query_text(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, ConnectionError> {
        if sql != select_watermarks_sql() {
            return Err(ConnectionError::Statement(format!("unsupported query: {sql}")));
        }
        Ok(self
            .store
            .rows(WATERMARK_TABLE)
            .iter()
            .map(|row| row.values.iter().map(SqlValue::as_text).collect())
            .collect())
    }

    async fn close(self) -> Result<(), ConnectionError> {
        let closed = self.store.tick();
        if let Some(lifetime) = lock(&self.store.lifetimes).get_mut(&self.id) {
            lifetime.closed = Some(closed);
        }
        self.store.connections_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
