use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spatialize::community::Louvain;
use spatialize::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_FINAL_SIZE, DEFAULT_ITERATIONS, DEFAULT_PREVIEW_SIZE,
    DEFAULT_RESOLUTION, RunConfig,
};
use spatialize::layout::{ForceAtlas2, ForceAtlas2Settings};
use spatialize::pipeline::{self, Collaborators, RunSummary};
use spatialize::render::PngRenderer;
use spatialize::scheduler::StopToken;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Edge list (`source,target,weight`) or a `*_positions_after_<N>_iterations.csv` checkpoint
    input: PathBuf,

    /// Layout iterations to run in this invocation
    #[arg(long, env = "SPATIALIZE_ITERATIONS", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,

    /// Iterations per batch; a preview is rendered after each batch
    #[arg(long, env = "SPATIALIZE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    #[arg(long, env = "SPATIALIZE_PREVIEW_SIZE", default_value_t = DEFAULT_PREVIEW_SIZE)]
    preview_size: u32,

    #[arg(long, env = "SPATIALIZE_FINAL_SIZE", default_value_t = DEFAULT_FINAL_SIZE)]
    final_size: u32,

    /// Seed for the initial random positions
    #[arg(long, env = "SPATIALIZE_SEED", default_value_t = 0)]
    seed: u64,

    /// Skip community detection on fresh runs
    #[arg(long, env = "SPATIALIZE_NO_COMMUNITIES")]
    no_communities: bool,

    /// Louvain resolution
    #[arg(long, env = "SPATIALIZE_RESOLUTION", default_value_t = DEFAULT_RESOLUTION)]
    resolution: f64,

    #[arg(long, env = "SPATIALIZE_GRAVITY", default_value_t = ForceAtlas2Settings::default().gravity)]
    gravity: f32,

    #[arg(long, env = "SPATIALIZE_SCALING_RATIO", default_value_t = ForceAtlas2Settings::default().scaling_ratio)]
    scaling_ratio: f32,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SPATIALIZE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> RunConfig {
        RunConfig {
            iterations: self.iterations,
            batch_size: self.batch_size,
            preview_size: self.preview_size,
            final_size: self.final_size,
            seed: self.seed,
            detect_communities: !self.no_communities,
            resolution: self.resolution,
            layout: ForceAtlas2Settings {
                gravity: self.gravity,
                scaling_ratio: self.scaling_ratio,
                ..ForceAtlas2Settings::default()
            },
            ..RunConfig::new(self.input)
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}

async fn watch_interrupts(stop: StopToken) {
    loop {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "cannot listen for interrupts, graceful stop disabled");
            return;
        }
        if stop.cancel() {
            info!("caught interrupt signal, finishing current batch, then rendering and saving positions");
        } else {
            warn!("already stopping, waiting for the current batch to finish");
        }
    }
}

fn run_blocking(config: RunConfig, stop: StopToken) -> Result<RunSummary> {
    let mut layout = ForceAtlas2::new(config.layout);
    let mut renderer = PngRenderer;
    let mut louvain = Louvain::new(config.resolution);

    let input = config.input.clone();
    pipeline::run(
        config,
        Collaborators {
            layout: &mut layout,
            renderer: &mut renderer,
            communities: Some(&mut louvain),
        },
        stop,
    )
    .with_context(|| format!("failed to spatialize {}", input.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let config = args.into_config();
    let stop = StopToken::new();
    tokio::spawn(watch_interrupts(stop.clone()));

    let summary = tokio::task::spawn_blocking(move || run_blocking(config, stop))
        .await
        .context("layout task did not complete")??;

    info!(
        nodes = summary.nodes,
        edges = summary.edges,
        iterations = summary.outcome.total_iterations,
        interrupted = summary.outcome.interrupted,
        checkpoint = %summary.outcome.checkpoint.display(),
        "done"
    );
    Ok(())
}
