//! The entity generator contract.
//!
//! An entity type plugs into the loader by implementing [`Loadable`]. The
//! loader only ever sees the object-safe [`Generator`] view, which every
//! `Loadable` gets for free, so new entity types never touch the engine.

use crate::context::WorkerContext;
use crate::statement::{InsertRow, PostLoadStep};

/// Sink for the rows of one prepared entity.
///
/// Rows added here join the calling worker's open batch and are committed
/// together with the rest of the unit, or not at all.
pub struct BatchWriter<'a> {
    rows: &'a mut Vec<InsertRow>,
    added: usize,
}

impl<'a> BatchWriter<'a> {
    pub(crate) fn new(rows: &'a mut Vec<InsertRow>) -> Self {
        Self { rows, added: 0 }
    }

    pub fn add(&mut self, row: InsertRow) {
        self.rows.push(row);
        self.added += 1;
    }

    /// Rows added through this writer.
    pub fn added(&self) -> usize {
        self.added
    }
}

/// How to produce and write rows of one entity type.
///
/// A generator holds only immutable configuration. Everything computed for a
/// row lives in the [`Loadable::Row`] returned by `prepare`, so nothing can
/// leak from one row to the next.
pub trait Loadable: Send + Sync + 'static {
    /// In-memory form of one prepared entity.
    type Row: Send;

    /// Entity name: sequence key and dependency-graph node.
    fn entity(&self) -> &'static str;

    /// Table emptied by a clear, if any.
    fn clear_target(&self) -> Option<&'static str>;

    /// Compute the field values for the entity with row index `index`.
    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> Self::Row;

    /// Append the prepared entity's rows to the worker's batch.
    fn load(&self, row: Self::Row, batch: &mut BatchWriter<'_>);

    /// Steps to run once every row of this type is committed.
    fn post_load(&self) -> Vec<PostLoadStep> {
        Vec::new()
    }
}

/// Object-safe view of a [`Loadable`] used by the loader.
pub trait Generator: Send + Sync + 'static {
    fn entity(&self) -> &'static str;

    fn clear_target(&self) -> Option<&'static str>;

    /// Prepare and load the entity with row index `index`.
    fn generate(&self, index: u64, ctx: &mut WorkerContext, batch: &mut BatchWriter<'_>);

    fn post_load(&self) -> Vec<PostLoadStep>;
}

impl<L: Loadable> Generator for L {
    fn entity(&self) -> &'static str {
        Loadable::entity(self)
    }

    fn clear_target(&self) -> Option<&'static str> {
        Loadable::clear_target(self)
    }

    fn generate(&self, index: u64, ctx: &mut WorkerContext, batch: &mut BatchWriter<'_>) {
        let row = self.prepare(index, ctx);
        self.load(row, batch);
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        Loadable::post_load(self)
    }
}
