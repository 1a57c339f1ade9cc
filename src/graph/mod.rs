mod ingest;
mod model;
mod parse;

pub use ingest::{
    IngestStats, assign_random_positions, ingest_edges, ingest_positions, open_lines, scan_records,
};
pub use model::{Edge, EdgeWeight, Graph, Node, Position};
pub use parse::{EdgeRecord, PositionRecord, Record, parse_edge_line, parse_position_line};
