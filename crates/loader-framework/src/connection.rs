//! Database connections and the per-worker batching context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::context::WorkerContext;
use crate::error::ConnectionError;
use crate::generator::{BatchWriter, Generator};
use crate::metrics::EntityTally;
use crate::statement::{InsertRow, PostLoadStep};

/// One physical database connection.
///
/// A connection is only ever used by the worker that opened it.
#[async_trait]
pub trait Connection: Send {
    /// Remove every row of `table`.
    async fn truncate(&mut self, table: &str) -> Result<(), ConnectionError>;

    /// Insert `rows` atomically: either all of them are committed or none.
    async fn write_batch(&mut self, rows: &[InsertRow]) -> Result<u64, ConnectionError>;

    /// Run one finalization step, returning the affected row count.
    async fn post_load(&mut self, step: &PostLoadStep) -> Result<u64, ConnectionError>;

    /// Run a query and return its rows in text form.
    async fn query_text(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, ConnectionError>;

    /// Close the connection.
    async fn close(self) -> Result<(), ConnectionError>
    where
        Self: Sized;
}

/// Factory for fresh connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection + 'static;

    /// Open a new physical connection.
    async fn connect(&self) -> Result<Self::Connection, ConnectionError>;

    /// Human-readable target for logs; must not contain credentials.
    fn describe(&self) -> String;
}

enum State<T> {
    Closed,
    Open(T),
    Retired(ConnectionError),
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub committed: u64,
    pub errored: u64,
}

/// A worker's connection plus its open batch.
///
/// The batch holds whole units (all rows of one prepared entity). A unit is
/// committed together or recorded as errored together; it is never left
/// half-applied.
pub struct ConnectionContext<C: Connector> {
    owner: usize,
    connector: Arc<C>,
    state: State<C::Connection>,
    pending: Vec<InsertRow>,
    unit_ends: Vec<usize>,
    batch_size: usize,
}

impl<C: Connector> ConnectionContext<C> {
    /// Context for worker `owner`. The connection is opened on first use.
    pub fn new(owner: usize, connector: Arc<C>, batch_size: usize) -> Self {
        Self {
            owner,
            connector,
            state: State::Closed,
            pending: Vec::with_capacity(batch_size),
            unit_ends: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Whether the worker gave up on obtaining a connection.
    pub fn is_retired(&self) -> bool {
        matches!(self.state, State::Retired(_))
    }

    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }

    /// Open the connection if needed. Failure retires the context.
    pub async fn acquire(&mut self) -> Result<(), ConnectionError> {
        match &self.state {
            State::Open(_) => return Ok(()),
            State::Retired(e) => return Err(e.clone()),
            State::Closed => {}
        }

        match self.connector.connect().await {
            Ok(conn) => {
                debug!("Worker {} connected to {}", self.owner, self.connector.describe());
                self.state = State::Open(conn);
                Ok(())
            }
            Err(e) => {
                error!(
                    "Worker {} could not connect to {}: {}",
                    self.owner,
                    self.connector.describe(),
                    e
                );
                self.state = State::Retired(e.clone());
                Err(e)
            }
        }
    }

    /// Prepare and stage one unit of `generator` into the open batch.
    pub fn stage(&mut self, generator: &dyn Generator, index: u64, worker: &mut WorkerContext) {
        let mut writer = BatchWriter::new(&mut self.pending);
        generator.generate(index, worker, &mut writer);
        self.unit_ends.push(self.pending.len());
    }

    /// Whether the open batch reached the flush threshold.
    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    /// Commit the open batch, tallying results against `tally`.
    ///
    /// The whole batch is tried first. If it is rejected, each unit is retried
    /// on its own so only the offending units are counted as errored.
    pub async fn flush(&mut self, tally: &EntityTally) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        if self.unit_ends.is_empty() {
            return outcome;
        }

        let rows = std::mem::take(&mut self.pending);
        let unit_ends = std::mem::take(&mut self.unit_ends);
        let units = unit_ends.len() as u64;

        if self.acquire().await.is_err() {
            tally.record_errored(units);
            outcome.errored = units;
            return outcome;
        }

        let batch_err = match self.write(&rows).await {
            Ok(written) => {
                tally.record_committed(units, written);
                outcome.committed = units;
                debug!(
                    "Worker {} committed {} {} units ({} rows)",
                    self.owner,
                    units,
                    tally.entity(),
                    written
                );
                self.recycle(rows);
                return outcome;
            }
            Err(e) => e,
        };

        warn!(
            "Worker {}: batch of {} {} units rejected ({}); retrying units individually",
            self.owner,
            units,
            tally.entity(),
            batch_err
        );

        let mut start = 0;
        for (i, &end) in unit_ends.iter().enumerate() {
            let unit = &rows[start..end];
            start = end;

            if self.acquire().await.is_err() {
                let remaining = (unit_ends.len() - i) as u64;
                tally.record_errored(remaining);
                outcome.errored += remaining;
                break;
            }

            match self.write(unit).await {
                Ok(written) => {
                    tally.record_committed(1, written);
                    outcome.committed += 1;
                }
                Err(e) => {
                    error!(
                        "Worker {}: failed to write {} row: {}",
                        self.owner,
                        tally.entity(),
                        e
                    );
                    tally.record_errored(1);
                    outcome.errored += 1;
                }
            }
        }

        self.recycle(rows);
        outcome
    }

    /// Write through the open connection, dropping it if it turns out to be dead.
    async fn write(&mut self, rows: &[InsertRow]) -> Result<u64, ConnectionError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let State::Open(conn) = &mut self.state else {
            return Err(ConnectionError::Disconnected("connection not open".to_string()));
        };

        let result = conn.write_batch(rows).await;
        if let Err(e) = &result {
            if e.is_disconnect() {
                warn!("Worker {} lost its connection: {}; reconnecting", self.owner, e);
                self.state = State::Closed;
            }
        }
        result
    }

    fn recycle(&mut self, mut rows: Vec<InsertRow>) {
        rows.clear();
        self.pending = rows;
    }

    /// Close the connection. Callers flush first.
    pub async fn close(mut self) {
        debug_assert!(self.unit_ends.is_empty(), "closing with unflushed units");
        if let State::Open(conn) = std::mem::replace(&mut self.state, State::Closed) {
            if let Err(e) = conn.close().await {
                warn!("Worker {} failed to close its connection: {}", self.owner, e);
            }
        }
    }
}
