//! Position checkpoints and their naming convention.
//!
//! A checkpoint is a `Node,xPos,yPos` CSV whose file name carries the
//! cumulative number of layout iterations that produced it:
//! `<root>_positions_after_<N>_iterations.csv`. The edge list it belongs to
//! is `<root>.csv`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::CheckpointError;
use crate::graph::{Graph, PositionRecord, open_lines, parse_position_line, scan_records};

const POSITIONS_INFIX: &str = "_positions_after_";
const ITERATIONS_SUFFIX: &str = "_iterations.csv";
const LEGACY_INFIX: &str = ".csv_positions_after_";
const LEGACY_SUFFIX: &str = "_FA2Iterations.csv";
const EDGE_LIST_EXTENSION: &str = ".csv";

/// How a run begins, decided from the input path alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStart {
    /// The input is an edge list.
    Fresh { root: String },
    /// The input is a checkpoint written after `prior_iterations`.
    Resume { root: String, prior_iterations: u64 },
}

impl RunStart {
    pub fn classify(path: &Path) -> Self {
        let name = path.to_string_lossy();

        for (infix, suffix) in [
            (POSITIONS_INFIX, ITERATIONS_SUFFIX),
            (LEGACY_INFIX, LEGACY_SUFFIX),
        ] {
            if let Some((root, prior_iterations)) = split_checkpoint_name(&name, infix, suffix) {
                return Self::Resume {
                    root: root.to_string(),
                    prior_iterations,
                };
            }
        }

        let root = name
            .strip_suffix(EDGE_LIST_EXTENSION)
            .unwrap_or(&name)
            .to_string();
        Self::Fresh { root }
    }

    pub fn root(&self) -> &str {
        match self {
            Self::Fresh { root } | Self::Resume { root, .. } => root,
        }
    }

    pub fn prior_iterations(&self) -> u64 {
        match self {
            Self::Fresh { .. } => 0,
            Self::Resume {
                prior_iterations, ..
            } => *prior_iterations,
        }
    }
}

fn split_checkpoint_name<'a>(name: &'a str, infix: &str, suffix: &str) -> Option<(&'a str, u64)> {
    let rest = name.strip_suffix(suffix)?;
    let split = rest.rfind(infix)?;
    let digits = &rest[split + infix.len()..];
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let count = digits.parse::<u64>().ok()?;
    Some((&rest[..split], count))
}

pub fn checkpoint_path(root: &str, iterations: u64) -> PathBuf {
    PathBuf::from(format!("{root}{POSITIONS_INFIX}{iterations}{ITERATIONS_SUFFIX}"))
}

pub fn edge_list_path(root: &str) -> PathBuf {
    PathBuf::from(format!("{root}{EDGE_LIST_EXTENSION}"))
}

#[derive(Serialize)]
struct CheckpointRow<'a> {
    node: &'a str,
    x: f64,
    y: f64,
}

/// Writes every positioned node, returning the number of rows written.
///
/// The file is written next to `path` and renamed into place once flushed,
/// so an interrupted write never leaves a truncated checkpoint behind.
pub fn write(path: &Path, graph: &Graph) -> Result<usize, CheckpointError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_path(&partial)?;
    writer.write_record(["Node", "xPos", "yPos"])?;

    let mut rows = 0usize;
    let mut unpositioned = 0usize;
    for node in graph.nodes() {
        let Some(position) = node.position else {
            unpositioned += 1;
            continue;
        };
        writer.serialize(CheckpointRow {
            node: &node.id,
            x: position.x,
            y: position.y,
        })?;
        rows += 1;
    }
    writer.flush()?;
    drop(writer);

    if unpositioned > 0 {
        warn!(unpositioned, path = %path.display(), "nodes without a position were left out of the checkpoint");
    }

    fs::rename(&partial, path)?;
    Ok(rows)
}

/// Reads a checkpoint or positions file back. Only the first line may be a
/// header. Malformed rows are logged and skipped; failing to read the file
/// is the only error.
pub fn read(path: &Path) -> io::Result<Vec<PositionRecord>> {
    let mut positions = Vec::new();
    let stats = scan_records(
        open_lines(path)?,
        "position",
        parse_position_line,
        |record, _, _| positions.push(record),
    )?;
    info!(
        path = %path.display(),
        rows = stats.records,
        skipped = stats.skipped,
        "positions read"
    );
    Ok(positions)
}
