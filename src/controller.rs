//! Dataset-level sequencing of a complete Olio load.
//!
//! The controller drives one [`Loader`] through the fixed pipeline: clear
//! every table, load the entity types stage by stage with a full drain
//! between stages, shut the pool down, run post-load steps on fresh
//! connections, and check the registered ID watermarks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use loader_framework::{
    Connector, DependencyGraph, EntityMetrics, Generator, LoadError, LoadReport, Loader, LoaderConfig,
    PostLoadStep, WatermarkMismatch, WATERMARK_TABLE,
};
use olio_entities::{olio_graph, Registry, POST_LOAD_ORDER};
use tracing::{debug, error, info, warn};

/// Runs a full clear, load and finalization of the Olio data set.
pub struct LoadController<C: Connector> {
    loader: Loader<C>,
    registry: Registry,
    graph: DependencyGraph,
    started: Option<Instant>,
}

impl<C: Connector> LoadController<C> {
    /// Controller loading every entity in `registry` over `connector`.
    pub fn new(connector: C, config: LoaderConfig, registry: Registry) -> Self {
        let graph = olio_graph();
        Self {
            loader: Loader::new(connector, config).with_dependency_graph(graph.clone()),
            registry,
            graph,
            started: None,
        }
    }

    pub fn loader(&self) -> &Loader<C> {
        &self.loader
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Counters for every entity loaded so far.
    pub fn metrics(&self) -> Vec<EntityMetrics> {
        self.loader.metrics()
    }

    /// Report for a run that could not complete, with whatever was counted so far.
    pub fn aborted_report(&self, reason: impl Into<String>) -> LoadReport {
        let duration = self.started.map(|s| s.elapsed()).unwrap_or_default();
        LoadReport::aborted(reason, self.loader.metrics(), duration)
    }

    /// Empty every registered table and the watermark table.
    ///
    /// Dependents are cleared before the tables they reference.
    pub async fn clear_all(&mut self) -> Result<(), LoadError> {
        let generators: Vec<_> = self
            .registry
            .iter()
            .map(|planned| Arc::clone(&planned.generator))
            .collect();

        for generator in generators.iter().rev() {
            self.loader.clear(generator.as_ref()).await?;
        }
        self.loader.clear_table(WATERMARK_TABLE).await?;

        info!("Cleared {} entity tables and {}", generators.len(), WATERMARK_TABLE);
        Ok(())
    }

    /// Entity names per load stage, with unregistered entities removed.
    ///
    /// Registered entities unknown to the graph form a final stage.
    pub fn load_stages(&self) -> Result<Vec<Vec<&'static str>>, LoadError> {
        let mut stages: Vec<Vec<&'static str>> = self
            .graph
            .stages()?
            .into_iter()
            .map(|stage| {
                stage
                    .into_iter()
                    .filter(|entity| self.registry.get(entity).is_some())
                    .collect::<Vec<_>>()
            })
            .filter(|stage| !stage.is_empty())
            .collect();

        let extra: Vec<&'static str> = self
            .registry
            .entities()
            .filter(|entity| !self.graph.contains(entity))
            .collect();
        if !extra.is_empty() {
            stages.push(extra);
        }
        Ok(stages)
    }

    /// Entities whose post-load steps run, in run order.
    pub fn post_load_order(&self) -> Vec<&'static str> {
        let mut order: Vec<&'static str> = POST_LOAD_ORDER
            .iter()
            .copied()
            .filter(|entity| self.registry.get(entity).is_some())
            .collect();
        order.extend(
            self.registry
                .entities()
                .filter(|entity| !POST_LOAD_ORDER.contains(entity)),
        );
        order
    }

    /// Run the whole pipeline.
    ///
    /// Returns `Err` only when the run had to be aborted (a failed clear or
    /// a malformed dependency graph). Row-level failures are reported in the
    /// returned [`LoadReport`].
    pub async fn run(&mut self) -> Result<LoadReport, LoadError> {
        let started = Instant::now();
        self.started = Some(started);

        let result = self.run_pipeline(started).await;
        if let Err(e) = &result {
            error!("Load aborted: {}", e);
            self.loader.shutdown().await;
        }
        result
    }

    async fn run_pipeline(&mut self, started: Instant) -> Result<LoadReport, LoadError> {
        info!(
            "Loading {} units across {} entity types",
            self.registry.total_units(),
            self.registry.entities().count()
        );

        self.clear_all().await?;
        let stages = self.load_stages()?;

        for (i, stage) in stages.iter().enumerate() {
            info!("Stage {}/{}: {}", i + 1, stages.len(), stage.join(", "));
            for entity in stage {
                if let Some(planned) = self.registry.get(entity) {
                    let generator = Arc::clone(&planned.generator);
                    let count = planned.count;
                    self.loader.load(generator, count).await?;
                }
            }
            let metrics = self.loader.wait_processing().await;
            for m in metrics.iter().filter(|m| stage.iter().any(|e| *e == m.entity)) {
                info!(
                    "{}: {}/{} units committed, {} errored ({} rows)",
                    m.entity, m.committed, m.requested, m.errored, m.rows_written
                );
            }
        }

        self.loader.shutdown().await;

        for entity in self.post_load_order() {
            if let Some(planned) = self.registry.get(entity) {
                let generator = Arc::clone(&planned.generator);
                self.loader.post_load(generator.as_ref()).await?;
            }
        }

        self.loader.shutdown().await;

        let watermarks = match self.loader.read_watermarks().await {
            Ok(watermarks) => watermarks,
            Err(e) => {
                warn!("Could not read back watermarks: {}", e);
                BTreeMap::new()
            }
        };
        let mismatches = self.check_watermarks(&watermarks);

        let report = LoadReport::completed(self.loader.metrics(), watermarks, started.elapsed())
            .with_watermark_mismatches(mismatches);
        info!(
            "Load finished in {:?}: {} committed, {} errored",
            report.duration,
            report.total_committed(),
            report.total_errored()
        );
        Ok(report)
    }

    /// Compare each registered watermark with the rows its entity committed.
    pub fn check_watermarks(&self, watermarks: &BTreeMap<String, u64>) -> Vec<WatermarkMismatch> {
        let metrics = self.loader.metrics();
        let mut mismatches = Vec::new();

        for planned in self.registry.iter() {
            let entity = planned.generator.entity();
            let expected = metrics
                .iter()
                .find(|m| m.entity == entity)
                .map_or(0, |m| m.rows_written);

            for step in planned.generator.post_load() {
                let PostLoadStep::RegisterWatermark { key, .. } = step else {
                    continue;
                };
                let found = watermarks.get(key).copied();
                if found == Some(expected) {
                    debug!("Watermark {} = {}", key, expected);
                    continue;
                }
                warn!(
                    "Watermark {} is {:?}, but {} rows of {} were loaded",
                    key, found, expected, entity
                );
                mismatches.push(WatermarkMismatch {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }
        mismatches
    }
}
