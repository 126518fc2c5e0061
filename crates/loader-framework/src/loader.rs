//! The load orchestration engine.
//!
//! A [`Loader`] owns a fixed pool of worker tasks. Each worker owns one
//! [`WorkerContext`] and one [`ConnectionContext`] for its whole life, so
//! batches are never shared between workers. `load` splits a row count into
//! one work item per worker; `wait_processing` is the barrier that returns
//! once every submitted item is committed or recorded as errored.
//!
//! ```text
//!             load(Person, 100)
//!                    │
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   worker 0     worker 1     worker 2      (34 / 33 / 33 units)
//!   ctx + conn   ctx + conn   ctx + conn
//!        │           │           │
//!        └─── flush batches ─────┘
//!                    │
//!           wait_processing()  ──►  Idle
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, ConnectionContext, Connector, FlushOutcome};
use crate::context::WorkerContext;
use crate::error::LoadError;
use crate::generator::Generator;
use crate::graph::DependencyGraph;
use crate::metrics::{EntityMetrics, EntityTally};
use crate::sequence::{Sequence, SequenceSource};
use crate::watermark::{parse_watermarks, select_watermarks_sql};

tokio::task_local! {
    static WORKER_ID: usize;
}

/// Id of the pool worker running the current task, if any.
pub fn current_worker() -> Option<usize> {
    WORKER_ID.try_with(|id| *id).ok()
}

/// Default number of buffered rows that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default random seed.
pub const DEFAULT_SEED: u64 = 42;

/// Loader tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of workers (and therefore connections) in the pool.
    pub parallelism: usize,
    /// Buffered rows per worker before a flush.
    pub batch_size: usize,
    /// Base seed for the workers' random generators.
    pub seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get(),
            batch_size: DEFAULT_BATCH_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

impl LoaderConfig {
    /// Set the number of workers.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Set the flush threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Where the loader is in its phase cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Clearing,
    Loading,
    Draining,
}

/// Split `count` units over `workers`, giving the remainder to the first workers.
pub fn partition(count: u64, workers: usize) -> Vec<u64> {
    let workers = workers.max(1) as u64;
    let base = count / workers;
    let remainder = count % workers;
    (0..workers)
        .map(|i| base + u64::from(i < remainder))
        .collect()
}

/// Settles a work item's units however the item ends.
///
/// Units not reported as committed or errored by the time the item is
/// dropped (worker retired, task panicked, channel closed) are recorded as
/// errored, and the item stops counting as outstanding.
struct Completion {
    tally: Arc<EntityTally>,
    unsettled: u64,
    outstanding: Arc<watch::Sender<usize>>,
}

impl Completion {
    fn settle(&mut self, outcome: FlushOutcome) {
        self.unsettled = self
            .unsettled
            .saturating_sub(outcome.committed + outcome.errored);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.unsettled > 0 {
            warn!(
                "{} {} units were not processed; recording them as errors",
                self.unsettled,
                self.tally.entity()
            );
            self.tally.record_errored(self.unsettled);
        }
        self.tally.item_finished();
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct WorkItem {
    generator: Arc<dyn Generator>,
    sequence: Sequence,
    count: u64,
    completion: Completion,
}

struct WorkerPool {
    senders: Vec<mpsc::UnboundedSender<WorkItem>>,
    tasks: JoinSet<()>,
}

/// Parallel loader for one target database.
pub struct Loader<C: Connector> {
    connector: Arc<C>,
    config: LoaderConfig,
    sequences: Arc<SequenceSource>,
    graph: Option<DependencyGraph>,
    tallies: BTreeMap<&'static str, Arc<EntityTally>>,
    order: Vec<&'static str>,
    undrained: HashSet<&'static str>,
    pool: Option<WorkerPool>,
    outstanding: Arc<watch::Sender<usize>>,
    phase: Phase,
}

impl<C: Connector> Loader<C> {
    pub fn new(connector: C, config: LoaderConfig) -> Self {
        let (outstanding, _) = watch::channel(0usize);
        Self {
            connector: Arc::new(connector),
            config,
            sequences: Arc::new(SequenceSource::new()),
            graph: None,
            tallies: BTreeMap::new(),
            order: Vec::new(),
            undrained: HashSet::new(),
            pool: None,
            outstanding: Arc::new(outstanding),
            phase: Phase::Idle,
        }
    }

    /// Reject loads whose prerequisites in `graph` have not drained.
    pub fn with_dependency_graph(mut self, graph: DependencyGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Use `sequences` instead of counters starting at zero.
    pub fn with_sequences(mut self, sequences: SequenceSource) -> Self {
        self.sequences = Arc::new(sequences);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sequences(&self) -> &SequenceSource {
        &self.sequences
    }

    /// Work items submitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Counters for every entity seen so far, in first-seen order.
    pub fn metrics(&self) -> Vec<EntityMetrics> {
        self.order
            .iter()
            .filter_map(|e| self.tallies.get(e))
            .map(|t| t.snapshot())
            .collect()
    }

    fn tally(&mut self, entity: &'static str) -> Arc<EntityTally> {
        if !self.tallies.contains_key(entity) {
            self.order.push(entity);
        }
        Arc::clone(
            self.tallies
                .entry(entity)
                .or_insert_with(|| Arc::new(EntityTally::new(entity))),
        )
    }

    fn require_idle(&self, operation: &str) -> Result<(), LoadError> {
        if self.phase != Phase::Idle {
            return Err(LoadError::InvalidPhase(format!(
                "{operation} requires an idle loader, but it is {:?} with {} outstanding work items",
                self.phase,
                self.outstanding()
            )));
        }
        Ok(())
    }

    /// Empty the backing table of `generator`, if it has one.
    pub async fn clear(&mut self, generator: &dyn Generator) -> Result<(), LoadError> {
        match generator.clear_target() {
            Some(table) => self.clear_table(table).await,
            None => Ok(()),
        }
    }

    /// Empty `table`. Failure is fatal to the run.
    pub async fn clear_table(&mut self, table: &str) -> Result<(), LoadError> {
        self.require_idle("clear")?;
        self.phase = Phase::Clearing;
        let result = self.truncate(table).await;
        self.phase = Phase::Idle;
        result
    }

    async fn truncate(&self, table: &str) -> Result<(), LoadError> {
        let clear_err = |source| LoadError::Clear {
            table: table.to_string(),
            source,
        };
        let mut conn = self.connector.connect().await.map_err(clear_err)?;
        conn.truncate(table).await.map_err(clear_err)?;
        if let Err(e) = conn.close().await {
            warn!("Failed to close connection after clearing {}: {}", table, e);
        }
        debug!("Cleared table {}", table);
        Ok(())
    }

    /// Submit `count` units of `generator`, split across the worker pool.
    ///
    /// Returns once the work is queued; use [`Loader::wait_processing`] to
    /// wait for it to commit.
    pub async fn load(&mut self, generator: Arc<dyn Generator>, count: u64) -> Result<(), LoadError> {
        let entity = generator.entity();

        if let Some(graph) = &self.graph {
            if let Some(prerequisite) = graph
                .prerequisites(entity)
                .into_iter()
                .find(|p| self.undrained.contains(p))
            {
                return Err(LoadError::DependencyNotDrained {
                    entity: entity.to_string(),
                    prerequisite: prerequisite.to_string(),
                });
            }
        }

        let tally = self.tally(entity);
        tally.add_requested(count);
        if count == 0 {
            info!("Nothing to load for {}", entity);
            return Ok(());
        }

        self.undrained.insert(entity);
        self.phase = Phase::Loading;
        let sequence = self.sequences.sequence(entity);
        let shares = partition(count, self.config.parallelism);
        let senders = self.start_pool();

        info!(
            "Loading {} {} units across {} workers",
            count,
            entity,
            shares.iter().filter(|&&s| s > 0).count()
        );

        for (worker, share) in shares.into_iter().enumerate() {
            if share == 0 {
                continue;
            }
            tally.item_submitted();
            self.outstanding.send_modify(|n| *n += 1);
            let item = WorkItem {
                generator: Arc::clone(&generator),
                sequence: sequence.clone(),
                count: share,
                completion: Completion {
                    tally: Arc::clone(&tally),
                    unsettled: share,
                    outstanding: Arc::clone(&self.outstanding),
                },
            };
            if senders[worker].send(item).is_err() {
                // Dropping the returned item records its units as errored.
                error!("Worker {} is gone; {} {} units not loaded", worker, share, entity);
            }
        }

        Ok(())
    }

    /// Start the worker pool if needed and return its senders.
    fn start_pool(&mut self) -> Vec<mpsc::UnboundedSender<WorkItem>> {
        let connector = &self.connector;
        let config = &self.config;
        let pool = self.pool.get_or_insert_with(|| {
            let mut tasks = JoinSet::new();
            let senders = (0..config.parallelism)
                .map(|id| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let worker = WorkerContext::new(id, config.seed);
                    let conn = ConnectionContext::new(id, Arc::clone(connector), config.batch_size);
                    tasks.spawn(WORKER_ID.scope(id, run_worker(rx, worker, conn)));
                    tx
                })
                .collect();
            debug!("Started worker pool with {} workers", config.parallelism);
            WorkerPool { senders, tasks }
        });
        pool.senders.clone()
    }

    /// Block until every submitted work item has finished.
    pub async fn wait_processing(&mut self) -> Vec<EntityMetrics> {
        self.phase = Phase::Draining;
        let mut rx = self.outstanding.subscribe();
        if rx.wait_for(|n| *n == 0).await.is_err() {
            warn!("Outstanding-work channel closed while draining");
        }
        self.undrained.clear();
        self.phase = Phase::Idle;

        let metrics = self.metrics();
        let errored: u64 = metrics.iter().map(|m| m.errored).sum();
        if errored > 0 {
            warn!("Drained with {} errored units so far", errored);
        } else {
            debug!("Drained; no errored units so far");
        }
        metrics
    }

    /// Drain every worker, flush and close its connection, and retire the pool.
    ///
    /// Idempotent; a later `load` starts a new pool.
    pub async fn shutdown(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        self.phase = Phase::Draining;

        let WorkerPool { senders, mut tasks } = pool;
        drop(senders);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Worker task ended abnormally: {}", e);
            }
        }

        self.undrained.clear();
        self.phase = Phase::Idle;
        info!("Worker pool shut down");
    }

    /// Run the finalization steps of `generator` on a fresh connection.
    ///
    /// Returns the number of failed steps. Failures are logged and counted
    /// but never undo earlier commits.
    pub async fn post_load(&mut self, generator: &dyn Generator) -> Result<u64, LoadError> {
        self.require_idle("post-load")?;
        let steps = generator.post_load();
        if steps.is_empty() {
            return Ok(0);
        }

        let entity = generator.entity();
        let tally = self.tally(entity);

        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Post-load for {} could not connect: {}", entity, e);
                for _ in &steps {
                    tally.record_post_load_error();
                }
                return Ok(steps.len() as u64);
            }
        };

        let mut failures = 0;
        for step in &steps {
            match conn.post_load(step).await {
                Ok(affected) => debug!("Post-load for {}: {:?} affected {} rows", entity, step, affected),
                Err(e) => {
                    error!("Post-load step for {} failed: {}", entity, e);
                    tally.record_post_load_error();
                    failures += 1;
                }
            }
        }

        if let Err(e) = conn.close().await {
            warn!("Failed to close post-load connection for {}: {}", entity, e);
        }
        info!("Post-load for {} finished ({} steps, {} failed)", entity, steps.len(), failures);
        Ok(failures)
    }

    /// Read the registered watermarks through a fresh connection.
    pub async fn read_watermarks(&mut self) -> Result<BTreeMap<String, u64>, LoadError> {
        self.require_idle("reading watermarks")?;
        let mut conn = self.connector.connect().await?;
        let rows = conn.query_text(&select_watermarks_sql()).await;
        if let Err(e) = conn.close().await {
            warn!("Failed to close watermark connection: {}", e);
        }
        Ok(parse_watermarks(rows?))
    }
}

async fn run_worker<C: Connector>(
    mut rx: mpsc::UnboundedReceiver<WorkItem>,
    mut worker: WorkerContext,
    mut conn: ConnectionContext<C>,
) {
    while let Some(item) = rx.recv().await {
        process(item, &mut worker, &mut conn).await;
    }
    conn.close().await;
    debug!("Worker {} stopped", worker.worker_id());
}

async fn process<C: Connector>(
    mut item: WorkItem,
    worker: &mut WorkerContext,
    conn: &mut ConnectionContext<C>,
) {
    if conn.acquire().await.is_err() {
        warn!(
            "Worker {} is retired; skipping {} {} units",
            worker.worker_id(),
            item.count,
            item.generator.entity()
        );
        return;
    }

    for _ in 0..item.count {
        let index = item.sequence.next();
        conn.stage(item.generator.as_ref(), index, worker);
        if conn.should_flush() {
            let outcome = conn.flush(&item.completion.tally).await;
            item.completion.settle(outcome);
        }
    }

    let outcome = conn.flush(&item.completion.tally).await;
    item.completion.settle(outcome);
}
