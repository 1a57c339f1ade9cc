//! One-off community detection, reported in the log and never persisted.

use anyhow::Result;

use crate::graph::{EdgeWeight, Graph};

const MIN_GAIN: f64 = 1e-12;
const MAX_LEVELS: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub struct CommunityReport {
    /// Community of every node, indexed like [`Graph::nodes`].
    pub assignment: Vec<usize>,
    pub count: usize,
    pub modularity: f64,
}

pub trait CommunityDetector {
    fn detect(&mut self, graph: &Graph, weight: EdgeWeight) -> Result<CommunityReport>;
}

/// Multi-level Louvain over the graph viewed as undirected and weighted.
pub struct Louvain {
    resolution: f64,
}

impl Louvain {
    pub fn new(resolution: f64) -> Self {
        Self { resolution }
    }
}

/// Symmetric weighted adjacency. `self_weight[i]` holds `A_ii`, so a
/// node's strength is its self weight plus its neighbour weights.
struct LevelGraph {
    neighbors: Vec<Vec<(usize, f64)>>,
    self_weight: Vec<f64>,
}

impl LevelGraph {
    fn from_graph(graph: &Graph, weight: EdgeWeight) -> Self {
        let node_count = graph.node_count();
        let mut neighbors = vec![Vec::new(); node_count];
        let mut self_weight = vec![0.0; node_count];

        for edge in graph.edges() {
            let w = weight(edge).max(0.0);
            if w == 0.0 {
                continue;
            }
            if edge.source == edge.target {
                self_weight[edge.source] += 2.0 * w;
            } else {
                neighbors[edge.source].push((edge.target, w));
                neighbors[edge.target].push((edge.source, w));
            }
        }

        Self {
            neighbors,
            self_weight,
        }
    }

    fn len(&self) -> usize {
        self.self_weight.len()
    }

    fn strengths(&self) -> Vec<f64> {
        self.neighbors
            .iter()
            .zip(&self.self_weight)
            .map(|(neighbors, self_weight)| {
                self_weight + neighbors.iter().map(|(_, w)| w).sum::<f64>()
            })
            .collect()
    }

    /// Moves nodes between communities until no move improves modularity.
    /// Returns dense community labels and whether anything moved.
    fn local_moves(&self, resolution: f64, total: f64) -> (Vec<usize>, bool) {
        let node_count = self.len();
        let strengths = self.strengths();
        let mut community = (0..node_count).collect::<Vec<_>>();
        let mut community_strength = strengths.clone();
        let mut link_weight = vec![0.0; node_count];
        let mut touched = Vec::new();
        let mut moved_any = false;

        loop {
            let mut moved = false;
            for node in 0..node_count {
                let current = community[node];
                let strength = strengths[node];
                community_strength[current] -= strength;

                for &(neighbor, w) in &self.neighbors[node] {
                    let target = community[neighbor];
                    if link_weight[target] == 0.0 {
                        touched.push(target);
                    }
                    link_weight[target] += w;
                }

                let gain = |candidate: usize, links: f64| {
                    links - resolution * community_strength[candidate] * strength / total
                };
                let mut best = current;
                let mut best_gain = gain(current, link_weight[current]);
                for &candidate in &touched {
                    let candidate_gain = gain(candidate, link_weight[candidate]);
                    if candidate_gain > best_gain + MIN_GAIN {
                        best = candidate;
                        best_gain = candidate_gain;
                    }
                }

                for candidate in touched.drain(..) {
                    link_weight[candidate] = 0.0;
                }

                community_strength[best] += strength;
                if best != current {
                    community[node] = best;
                    moved = true;
                    moved_any = true;
                }
            }

            if !moved {
                break;
            }
        }

        (relabel(&community), moved_any)
    }

    fn aggregate(&self, community: &[usize], count: usize) -> Self {
        let mut self_weight = vec![0.0; count];
        let mut merged = vec![std::collections::HashMap::<usize, f64>::new(); count];

        for node in 0..self.len() {
            let from = community[node];
            self_weight[from] += self.self_weight[node];
            for &(neighbor, w) in &self.neighbors[node] {
                let to = community[neighbor];
                if from == to {
                    self_weight[from] += w;
                } else {
                    *merged[from].entry(to).or_insert(0.0) += w;
                }
            }
        }

        let neighbors = merged
            .into_iter()
            .map(|links| {
                let mut links = links.into_iter().collect::<Vec<_>>();
                links.sort_unstable_by_key(|&(to, _)| to);
                links
            })
            .collect();

        Self {
            neighbors,
            self_weight,
        }
    }
}

fn relabel(community: &[usize]) -> Vec<usize> {
    let mut labels = vec![usize::MAX; community.len()];
    let mut next = 0usize;
    community
        .iter()
        .map(|&raw| {
            if labels[raw] == usize::MAX {
                labels[raw] = next;
                next += 1;
            }
            labels[raw]
        })
        .collect()
}

/// Resolution-scaled modularity of `assignment` on the base graph.
fn modularity(level: &LevelGraph, assignment: &[usize], count: usize, resolution: f64) -> f64 {
    let strengths = level.strengths();
    let total = strengths.iter().sum::<f64>();
    if total <= 0.0 {
        return 0.0;
    }

    let mut internal = vec![0.0; count];
    let mut strength = vec![0.0; count];
    for node in 0..level.len() {
        let community = assignment[node];
        strength[community] += strengths[node];
        internal[community] += level.self_weight[node];
        for &(neighbor, w) in &level.neighbors[node] {
            if assignment[neighbor] == community {
                internal[community] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&strength)
        .map(|(inside, tot)| inside / total - resolution * (tot / total).powi(2))
        .sum()
}

impl CommunityDetector for Louvain {
    fn detect(&mut self, graph: &Graph, weight: EdgeWeight) -> Result<CommunityReport> {
        let base = LevelGraph::from_graph(graph, weight);
        let total = base.strengths().iter().sum::<f64>();
        let mut assignment = (0..graph.node_count()).collect::<Vec<_>>();

        if total > 0.0 {
            let mut level = LevelGraph::from_graph(graph, weight);
            for _ in 0..MAX_LEVELS {
                let (community, moved) = level.local_moves(self.resolution, total);
                if !moved {
                    break;
                }
                let count = community.iter().copied().max().map_or(0, |max| max + 1);
                for slot in &mut assignment {
                    *slot = community[*slot];
                }
                level = level.aggregate(&community, count);
            }
        }

        let assignment = relabel(&assignment);
        let count = assignment.iter().copied().max().map_or(0, |max| max + 1);
        let modularity = modularity(&base, &assignment, count, self.resolution);

        Ok(CommunityReport {
            assignment,
            count,
            modularity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn weight(edge: &Edge) -> f64 {
        edge.weight_or_zero()
    }

    fn two_triangles() -> Graph {
        let mut graph = Graph::new();
        for (source, target) in [
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("d", "e"),
            ("e", "f"),
            ("f", "d"),
            ("c", "d"),
        ] {
            graph.upsert_edge(source, target, Some(1));
        }
        graph
    }

    #[test]
    fn splits_two_triangles() {
        let graph = two_triangles();
        let report = Louvain::new(1.0).detect(&graph, weight).expect("louvain");

        assert_eq!(report.count, 2);
        let a = report.assignment[graph.index_of("a").expect("a")];
        let b = report.assignment[graph.index_of("b").expect("b")];
        let d = report.assignment[graph.index_of("d").expect("d")];
        assert_eq!(a, b);
        assert_ne!(a, d);
        assert!((report.modularity - 5.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn empty_graph_has_no_communities() {
        let report = Louvain::new(0.05)
            .detect(&Graph::new(), weight)
            .expect("louvain");
        assert_eq!(report.count, 0);
        assert_eq!(report.modularity, 0.0);
    }

    #[test]
    fn zero_weight_edges_leave_singletons() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", None);
        graph.upsert_edge("b", "c", Some(0));
        let report = Louvain::new(1.0).detect(&graph, weight).expect("louvain");
        assert_eq!(report.count, 3);
        assert_eq!(report.modularity, 0.0);
    }

    #[test]
    fn low_resolution_merges_more() {
        let graph = two_triangles();
        let coarse = Louvain::new(0.05).detect(&graph, weight).expect("louvain");
        let fine = Louvain::new(1.0).detect(&graph, weight).expect("louvain");
        assert!(coarse.count <= fine.count);
    }
}
