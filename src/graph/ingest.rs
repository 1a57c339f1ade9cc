use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use tracing::{debug, info, warn};

use super::model::{Graph, Position};
use super::parse::{PositionRecord, Record, parse_edge_line};

const PROGRESS_EVERY: usize = 100_000;

/// Running counters for one ingestion pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
    pub unknown_weights: usize,
    /// Edge lines that overwrote an edge seen earlier.
    pub duplicates: usize,
}

/// Opens `path` as a lazily-read line source. Anything but a regular file
/// is refused, since reading a directory fails on every line.
pub fn open_lines(path: &Path) -> io::Result<impl Iterator<Item = io::Result<String>>> {
    let file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }
    Ok(BufReader::new(file).lines())
}

/// Feeds every data record of `lines` to `on_record`.
///
/// Only the first line may be a header. A line that is not valid UTF-8 is
/// skipped; any other read error ends the scan, because the reader would
/// keep failing at the same spot.
pub fn scan_records<I, T>(
    lines: I,
    kind: &'static str,
    parse: fn(&str, bool) -> Record<T>,
    mut on_record: impl FnMut(T, &str, &mut IngestStats),
) -> io::Result<IngestStats>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut stats = IngestStats::default();

    for (line_number, line) in lines.into_iter().enumerate() {
        stats.lines += 1;
        let line = match line {
            Ok(line) => line,
            Err(error) if error.kind() == io::ErrorKind::InvalidData => {
                warn!(line = line_number + 1, %error, "failed to decode {kind} line, skipping");
                stats.skipped += 1;
                continue;
            }
            Err(error) => return Err(error),
        };

        match parse(&line, line_number == 0) {
            Record::Data(record) => {
                on_record(record, &line, &mut stats);
                stats.records += 1;
            }
            Record::Header | Record::Blank => {}
            Record::Unparsable => {
                warn!(line = line_number + 1, content = %line, "unparsable {kind} line, skipping");
                stats.skipped += 1;
            }
        }

        if stats.lines % PROGRESS_EVERY == 0 {
            debug!(lines = stats.lines, records = stats.records, "ingesting {kind} lines");
        }
    }

    Ok(stats)
}

pub fn ingest_edges<I>(graph: &mut Graph, lines: I) -> io::Result<IngestStats>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let stats = scan_records(lines, "edge", parse_edge_line, |record, line, stats| {
        if record.weight.is_none() {
            warn!(content = %line, "edge weight is missing or not a non-negative integer, treating as unknown");
            stats.unknown_weights += 1;
        }
        if !graph.upsert_edge(&record.source, &record.target, record.weight) {
            debug!(content = %line, "duplicate edge, weight overwritten");
            stats.duplicates += 1;
        }
    })?;

    info!(
        lines = stats.lines,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        skipped = stats.skipped,
        duplicates = stats.duplicates,
        "edge list ingested"
    );
    Ok(stats)
}

/// Applies positions read from a positions file or checkpoint, creating
/// nodes the edge list did not mention. Returns how many were applied.
pub fn ingest_positions<I>(graph: &mut Graph, records: I) -> usize
where
    I: IntoIterator<Item = PositionRecord>,
{
    let mut applied = 0usize;
    for record in records {
        graph.set_position(&record.node, Position::new(record.x, record.y));
        applied += 1;
    }
    info!(positions = applied, "positions assigned");
    applied
}

/// Places every unpositioned node uniformly in the unit square.
pub fn assign_random_positions<R: Rng + ?Sized>(graph: &mut Graph, rng: &mut R) -> usize {
    let mut assigned = 0usize;
    for index in 0..graph.node_count() {
        if graph.position_at(index).is_some() {
            continue;
        }
        let position = Position::new(rng.random::<f64>(), rng.random::<f64>());
        graph.set_position_at(index, position);
        assigned += 1;
    }
    assigned
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn lines(text: &str) -> Vec<io::Result<String>> {
        text.lines().map(|line| Ok(line.to_string())).collect()
    }

    fn ingest(graph: &mut Graph, text: &str) -> IngestStats {
        ingest_edges(graph, lines(text)).expect("ingest")
    }

    #[test]
    fn triangle_without_header() {
        let mut graph = Graph::new();
        let stats = ingest(&mut graph, "A,B,10\nB,C,5\nC,A,1\n");

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn node_count_matches_distinct_endpoints() {
        let text = "source,target,weight\n\
                    a,b,1\nb,c,2\na,c,3\nd,a,4\nc,b,5\ne,e,1\n";
        let mut graph = Graph::new();
        ingest(&mut graph, text);

        let distinct = text
            .lines()
            .skip(1)
            .flat_map(|line| line.split(',').take(2))
            .collect::<HashSet<_>>();
        assert_eq!(graph.node_count(), distinct.len());
    }

    #[test]
    fn duplicate_lines_overwrite_weight() {
        let mut graph = Graph::new();
        let stats = ingest(&mut graph, "a,b,1\na,b,9\n");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(graph.edge("a", "b").and_then(|edge| edge.weight), Some(9));
    }

    #[test]
    fn header_name_later_in_the_file_is_a_node() {
        let mut graph = Graph::new();
        let stats = ingest(&mut graph, "a,b,1\nsource,b,7\n");

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(stats.records, 2);
        assert_eq!(graph.edge("source", "b").and_then(|edge| edge.weight), Some(7));
    }

    #[test]
    fn bad_lines_are_skipped_not_fatal() {
        let mut graph = Graph::new();
        let mut input = lines(",x,1\na,b,1\nbroken\n\nb,c,oops\n");
        input.insert(2, Err(io::Error::new(io::ErrorKind::InvalidData, "bad utf-8")));
        let stats = ingest_edges(&mut graph, input).expect("ingest");

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.unknown_weights, 1);
        assert_eq!(graph.edge("b", "c").and_then(|edge| edge.weight), None);
    }

    #[test]
    fn read_failure_ends_ingestion() {
        let mut graph = Graph::new();
        let mut input = lines("a,b,1\nb,c,1\n");
        input.insert(1, Err(io::Error::other("device gone")));

        let error = ingest_edges(&mut graph, input).expect_err("read failure");
        assert_eq!(error.kind(), io::ErrorKind::Other);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn directory_is_not_a_line_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = open_lines(dir.path()).err().expect("directory refused");
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn positions_merge_into_existing_graph() {
        let mut graph = Graph::new();
        ingest(&mut graph, "a,b,1\n");
        let records = [("a", 1.5, -2.0), ("z", 0.0, 0.0)].map(|(node, x, y)| PositionRecord {
            node: node.into(),
            x,
            y,
        });

        assert_eq!(ingest_positions(&mut graph, records), 2);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(
            graph.node("a").and_then(|node| node.position),
            Some(Position::new(1.5, -2.0))
        );
        assert!(graph.node("b").is_some_and(|node| node.position.is_none()));
    }

    #[test]
    fn random_assignment_only_fills_gaps() {
        let mut graph = Graph::new();
        ingest(&mut graph, "a,b,1\nb,c,1\n");
        graph.set_position("a", Position::new(42.0, 42.0));

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(assign_random_positions(&mut graph, &mut rng), 2);
        assert_eq!(graph.positioned_count(), 3);
        assert_eq!(
            graph.node("a").and_then(|node| node.position),
            Some(Position::new(42.0, 42.0))
        );

        for node in graph.nodes() {
            let position = node.position.expect("assigned");
            if node.id != "a" {
                assert!((0.0..1.0).contains(&position.x));
                assert!((0.0..1.0).contains(&position.y));
            }
        }
    }
}
