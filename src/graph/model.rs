use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub position: Option<Position>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    /// `None` when the weight column did not parse.
    pub weight: Option<u64>,
}

impl Edge {
    /// Weight seen by weighted collaborators; unknown weights count as zero.
    pub fn weight_or_zero(&self) -> f64 {
        self.weight.map(|weight| weight as f64).unwrap_or(0.0)
    }
}

/// Accessor handed to layout and community collaborators.
pub type EdgeWeight = fn(&Edge) -> f64;

/// Directed graph with string-keyed nodes and at most one edge per ordered
/// pair. Node and edge order is insertion order.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_by_pair: HashMap<(usize, usize), usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    /// Returns the index of `id`, creating an unpositioned node if needed.
    pub fn merge_node(&mut self, id: &str) -> usize {
        if let Some(&index) = self.index_by_id.get(id) {
            return index;
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            id: id.to_string(),
            position: None,
        });
        self.index_by_id.insert(id.to_string(), index);
        index
    }

    /// Creates the edge, or overwrites the weight of an existing one.
    /// Returns `true` when the edge is new.
    pub fn upsert_edge(&mut self, source: &str, target: &str, weight: Option<u64>) -> bool {
        let source = self.merge_node(source);
        let target = self.merge_node(target);

        if let Some(&edge_index) = self.edge_by_pair.get(&(source, target)) {
            self.edges[edge_index].weight = weight;
            return false;
        }

        self.edge_by_pair.insert((source, target), self.edges.len());
        self.edges.push(Edge {
            source,
            target,
            weight,
        });
        true
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        let source = self.index_of(source)?;
        let target = self.index_of(target)?;
        self.edge_by_pair
            .get(&(source, target))
            .map(|&index| &self.edges[index])
    }

    pub fn set_position(&mut self, id: &str, position: Position) {
        let index = self.merge_node(id);
        self.nodes[index].position = Some(position);
    }

    pub fn position_at(&self, index: usize) -> Option<Position> {
        self.nodes.get(index).and_then(|node| node.position)
    }

    pub fn set_position_at(&mut self, index: usize, position: Position) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.position = Some(position);
        }
    }

    pub fn positioned_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.position.is_some())
            .count()
    }

    /// In plus out degree for every node, indexed like [`Graph::nodes`].
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.source] += 1;
            degrees[edge.target] += 1;
        }
        degrees
    }

    pub fn degree(&self, id: &str) -> Option<usize> {
        let index = self.index_of(id)?;
        Some(
            self.edges
                .iter()
                .filter(|edge| edge.source == index || edge.target == index)
                .map(|edge| if edge.source == edge.target { 2 } else { 1 })
                .sum(),
        )
    }

    /// Directed density, `E / (N (N - 1))`.
    pub fn density(&self) -> f64 {
        let n = self.nodes.len() as f64;
        if n < 2.0 {
            return 0.0;
        }
        self.edges.len() as f64 / (n * (n - 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_creates_missing_endpoints() {
        let mut graph = Graph::new();
        assert!(graph.upsert_edge("a", "b", Some(3)));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.node("a").is_some_and(|node| node.position.is_none()));
    }

    #[test]
    fn duplicate_edge_keeps_last_weight() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", Some(3));
        assert!(!graph.upsert_edge("a", "b", Some(7)));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("a", "b").and_then(|edge| edge.weight), Some(7));
    }

    #[test]
    fn reverse_edge_is_distinct() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", Some(1));
        graph.upsert_edge("b", "a", Some(1));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn degree_counts_both_directions() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", Some(1));
        graph.upsert_edge("c", "a", Some(1));
        graph.upsert_edge("b", "c", None);

        assert_eq!(graph.degree("a"), Some(2));
        assert_eq!(graph.degrees(), vec![2, 2, 2]);
        assert_eq!(graph.degree("missing"), None);
    }

    #[test]
    fn density_of_triangle() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", Some(1));
        graph.upsert_edge("b", "c", Some(1));
        graph.upsert_edge("c", "a", Some(1));
        assert!((graph.density() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_weight_reads_as_zero() {
        let edge = Edge {
            source: 0,
            target: 1,
            weight: None,
        };
        assert_eq!(edge.weight_or_zero(), 0.0);
    }
}
