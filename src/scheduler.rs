//! The batch loop: layout batch, preview render, stop check, and the final
//! render plus checkpoint that every run ends with.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::checkpoint;
use crate::error::{PipelineError, Result};
use crate::graph::{EdgeWeight, Graph};
use crate::layout::LayoutEngine;
use crate::render::{SnapshotRenderer, final_render_path, preview_path};

/// Cooperative stop request, polled only between batches.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Returns `true` if this call was the first request.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningBatch,
    Rendering,
    CheckingStop,
    Finalizing,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    /// Artifact name prefix, see [`checkpoint::checkpoint_path`].
    pub root: String,
    /// Iterations already behind the loaded positions.
    pub prior_iterations: u64,
    /// Iterations to run in this invocation.
    pub target_iterations: u64,
    pub batch_size: u64,
    pub preview_size: u32,
    pub final_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub batches: u64,
    pub iterations_done: u64,
    /// `prior_iterations + iterations_done`, the count encoded in the checkpoint.
    pub total_iterations: u64,
    pub interrupted: bool,
    pub checkpoint: PathBuf,
    pub rows_written: usize,
}

pub struct BatchScheduler<'a> {
    plan: BatchPlan,
    layout: &'a mut dyn LayoutEngine,
    renderer: &'a mut dyn SnapshotRenderer,
    stop: StopToken,
    weight: EdgeWeight,
    state: SchedulerState,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(
        plan: BatchPlan,
        layout: &'a mut dyn LayoutEngine,
        renderer: &'a mut dyn SnapshotRenderer,
        stop: StopToken,
        weight: EdgeWeight,
    ) -> Self {
        Self {
            plan,
            layout,
            renderer,
            stop,
            weight,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!(from = ?self.state, to = ?next, "scheduler transition");
        self.state = next;
    }

    fn should_stop(&self, done: u64) -> bool {
        self.stop.is_cancelled() || done >= self.plan.target_iterations
    }

    pub fn run(&mut self, graph: &mut Graph) -> Result<ScheduleOutcome> {
        // The last batch may overshoot the target by less than one batch.
        let plan = &self.plan;
        if plan.target_iterations > 0
            && plan
                .prior_iterations
                .checked_add(plan.target_iterations)
                .and_then(|total| total.checked_add(plan.batch_size))
                .is_none()
        {
            return Err(PipelineError::Config(format!(
                "{} prior plus {} requested iterations overflow the iteration count",
                plan.prior_iterations, plan.target_iterations
            )));
        }

        let started = Instant::now();
        let mut batches = 0u64;
        let mut done = 0u64;

        info!(
            target = self.plan.target_iterations,
            batch_size = self.plan.batch_size,
            prior = self.plan.prior_iterations,
            "starting layout"
        );

        loop {
            match self.state {
                SchedulerState::Idle => {
                    let next = if self.should_stop(done) {
                        SchedulerState::Finalizing
                    } else {
                        SchedulerState::RunningBatch
                    };
                    self.transition(next);
                }
                SchedulerState::RunningBatch => {
                    let batch_started = Instant::now();
                    self.layout
                        .run(graph, self.plan.batch_size, self.weight)
                        .map_err(|cause| PipelineError::Layout {
                            completed: self.plan.prior_iterations + done,
                            cause,
                        })?;
                    batches += 1;
                    info!(
                        batch = batches,
                        iterations = self.plan.batch_size,
                        seconds = batch_started.elapsed().as_secs_f64(),
                        "layout batch processed"
                    );
                    self.transition(SchedulerState::Rendering);
                }
                SchedulerState::Rendering => {
                    let cumulative = self.plan.prior_iterations + done + self.plan.batch_size;
                    let path = preview_path(&self.plan.root, cumulative);
                    self.render(graph, self.plan.preview_size, path);
                    self.transition(SchedulerState::CheckingStop);
                }
                SchedulerState::CheckingStop => {
                    done += self.plan.batch_size;
                    let next = if self.should_stop(done) {
                        SchedulerState::Finalizing
                    } else {
                        SchedulerState::RunningBatch
                    };
                    self.transition(next);
                }
                SchedulerState::Finalizing => {
                    let interrupted = self.stop.is_cancelled() && done < self.plan.target_iterations;
                    let total_iterations = self.plan.prior_iterations + done;
                    info!(
                        iterations = done,
                        seconds = started.elapsed().as_secs_f64(),
                        "layout {} processed",
                        if interrupted { "partially" } else { "fully" }
                    );

                    let path = final_render_path(&self.plan.root, total_iterations);
                    self.render(graph, self.plan.final_size, path);

                    let checkpoint = checkpoint::checkpoint_path(&self.plan.root, total_iterations);
                    let write_started = Instant::now();
                    let rows_written = checkpoint::write(&checkpoint, graph).map_err(|source| {
                        PipelineError::Checkpoint {
                            path: checkpoint.clone(),
                            source,
                        }
                    })?;
                    info!(
                        path = %checkpoint.display(),
                        rows = rows_written,
                        seconds = write_started.elapsed().as_secs_f64(),
                        "positions stored"
                    );

                    self.transition(SchedulerState::Done);
                    return Ok(ScheduleOutcome {
                        batches,
                        iterations_done: done,
                        total_iterations,
                        interrupted,
                        checkpoint,
                        rows_written,
                    });
                }
                SchedulerState::Done => {
                    return Err(PipelineError::Config(
                        "batch scheduler has already finished".into(),
                    ));
                }
            }
        }
    }

    fn render(&mut self, graph: &Graph, size: u32, path: PathBuf) {
        let render_started = Instant::now();
        match self.renderer.render(graph, size, &path) {
            Ok(()) => info!(
                path = %path.display(),
                seconds = render_started.elapsed().as_secs_f64(),
                "snapshot rendered"
            ),
            Err(error) => warn!(path = %path.display(), error = %format!("{error:#}"), "snapshot render failed, continuing"),
        }
    }
}
