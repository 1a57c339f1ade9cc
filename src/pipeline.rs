//! Run orchestration: fresh start or resume, one-off community detection,
//! then the batch scheduler.

use std::io;
use std::path::Path;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::checkpoint::{self, RunStart, edge_list_path};
use crate::community::{CommunityDetector, CommunityReport};
use crate::config::RunConfig;
use crate::error::{PipelineError, Result};
use crate::graph::{
    Edge, Graph, assign_random_positions, ingest_edges, ingest_positions, open_lines,
};
use crate::layout::LayoutEngine;
use crate::render::SnapshotRenderer;
use crate::scheduler::{BatchPlan, BatchScheduler, ScheduleOutcome, StopToken};

/// The external computations the pipeline drives.
pub struct Collaborators<'a> {
    pub layout: &'a mut dyn LayoutEngine,
    pub renderer: &'a mut dyn SnapshotRenderer,
    pub communities: Option<&'a mut dyn CommunityDetector>,
}

/// Everything one run owns. The graph is never shared outside it.
pub struct RunContext {
    config: RunConfig,
    start: RunStart,
    graph: Graph,
    stop: StopToken,
}

#[derive(Debug)]
pub struct RunSummary {
    /// How the run actually began, after the empty-checkpoint fallback.
    pub start: RunStart,
    pub nodes: usize,
    pub edges: usize,
    pub communities: Option<CommunityReport>,
    pub outcome: ScheduleOutcome,
}

fn edge_weight(edge: &Edge) -> f64 {
    edge.weight_or_zero()
}

fn unreadable(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + use<> {
    let path = path.to_path_buf();
    move |source| PipelineError::Input { path, source }
}

impl RunContext {
    pub fn new(config: RunConfig, stop: StopToken) -> Result<Self> {
        config.validate()?;
        let start = RunStart::classify(&config.input);
        Ok(Self {
            config,
            start,
            graph: Graph::new(),
            stop,
        })
    }

    pub fn start(&self) -> &RunStart {
        &self.start
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Builds the graph and gives every node a position.
    pub fn load(&mut self) -> Result<()> {
        let mut time0 = Instant::now();
        let edge_list = match &self.start {
            RunStart::Fresh { .. } => self.config.input.clone(),
            RunStart::Resume { root, .. } => edge_list_path(root),
        };

        open_lines(&edge_list)
            .and_then(|lines| ingest_edges(&mut self.graph, lines))
            .map_err(unreadable(&edge_list))?;
        info!(
            path = %edge_list.display(),
            seconds = time0.elapsed().as_secs_f64(),
            "graph loaded from edge list"
        );
        time0 = Instant::now();

        if let RunStart::Resume {
            root,
            prior_iterations,
        } = &self.start
        {
            let records =
                checkpoint::read(&self.config.input).map_err(unreadable(&self.config.input))?;
            let loaded = ingest_positions(&mut self.graph, records);

            if loaded == 0 {
                warn!(
                    path = %self.config.input.display(),
                    prior_iterations,
                    "checkpoint holds no usable positions, starting fresh"
                );
                self.start = RunStart::Fresh { root: root.clone() };
            } else {
                info!(
                    positions = loaded,
                    seconds = time0.elapsed().as_secs_f64(),
                    "positions from previous run assigned"
                );
            }
            time0 = Instant::now();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let assigned = assign_random_positions(&mut self.graph, &mut rng);
        match self.start {
            RunStart::Fresh { .. } => info!(
                nodes = assigned,
                seconds = time0.elapsed().as_secs_f64(),
                "random positions assigned"
            ),
            RunStart::Resume { .. } if assigned > 0 => warn!(
                nodes = assigned,
                "nodes missing from the checkpoint were given random positions"
            ),
            RunStart::Resume { .. } => {}
        }

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            density = self.graph.density(),
            "graph ready"
        );
        Ok(())
    }

    /// Runs community detection on fresh starts only. The report is logged
    /// and returned; it never touches the graph or the checkpoint.
    pub fn detect_communities(
        &self,
        detector: &mut dyn CommunityDetector,
    ) -> Result<Option<CommunityReport>> {
        if !matches!(self.start, RunStart::Fresh { .. }) {
            return Ok(None);
        }

        let time0 = Instant::now();
        let report = detector
            .detect(&self.graph, edge_weight)
            .map_err(PipelineError::Community)?;
        info!(
            communities = report.count,
            modularity = report.modularity,
            seconds = time0.elapsed().as_secs_f64(),
            "community detection processed"
        );
        Ok(Some(report))
    }

    pub fn schedule(
        &mut self,
        layout: &mut dyn LayoutEngine,
        renderer: &mut dyn SnapshotRenderer,
    ) -> Result<ScheduleOutcome> {
        let plan = BatchPlan {
            root: self.start.root().to_string(),
            prior_iterations: self.start.prior_iterations(),
            target_iterations: self.config.iterations,
            batch_size: self.config.batch_size,
            preview_size: self.config.preview_size,
            final_size: self.config.final_size,
        };
        BatchScheduler::new(plan, layout, renderer, self.stop.clone(), edge_weight)
            .run(&mut self.graph)
    }
}

/// Loads, optionally partitions, lays out and checkpoints one graph.
pub fn run(
    config: RunConfig,
    collaborators: Collaborators<'_>,
    stop: StopToken,
) -> Result<RunSummary> {
    let mut context = RunContext::new(config, stop)?;
    context.load()?;

    let communities = match collaborators.communities {
        Some(detector) if context.config.detect_communities => {
            context.detect_communities(detector)?
        }
        _ => None,
    };

    let outcome = context.schedule(collaborators.layout, collaborators.renderer)?;
    Ok(RunSummary {
        start: context.start.clone(),
        nodes: context.graph.node_count(),
        edges: context.graph.edge_count(),
        communities,
        outcome,
    })
}
