//! Parallel load orchestration for seeding benchmark databases.
//!
//! An entity type implements [`Loadable`]: `prepare` computes one row's
//! values from its row index and a per-worker random generator, `load`
//! turns them into [`InsertRow`]s. The [`Loader`] splits row counts across
//! a pool of workers, each owning one database connection, batches rows,
//! and tallies every unit as committed or errored. Phase barriers
//! (`wait_processing`, `shutdown`) let a controller order entity types by
//! their [`DependencyGraph`].
//!
//! # Example
//!
//! ```ignore
//! use loader_framework::{Loader, LoaderConfig};
//!
//! let mut loader = Loader::new(connector, LoaderConfig::default().with_batch_size(500));
//! loader.clear(person.as_ref()).await?;
//! loader.load(person.clone(), 10_000).await?;
//! loader.wait_processing().await;
//! loader.shutdown().await;
//! loader.post_load(person.as_ref()).await?;
//! ```

pub mod connection;
pub mod context;
pub mod error;
pub mod generator;
pub mod graph;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod sequence;
pub mod statement;
pub mod testing;
pub mod watermark;

pub use connection::{Connection, ConnectionContext, Connector, FlushOutcome};
pub use context::WorkerContext;
pub use error::{ConnectionError, LoadError};
pub use generator::{BatchWriter, Generator, Loadable};
pub use graph::DependencyGraph;
pub use loader::{current_worker, partition, Loader, LoaderConfig, Phase, DEFAULT_BATCH_SIZE, DEFAULT_SEED};
pub use metrics::{EntityMetrics, EntityTally};
pub use report::{LoadReport, RunStatus, WatermarkMismatch, DEFAULT_SEEDED_THRESHOLD};
pub use sequence::{Sequence, SequenceSource};
pub use statement::{group_rows, InsertRow, PostLoadStep, RowGroup, SqlValue, MAX_BIND_PARAMS};
pub use watermark::WATERMARK_TABLE;
