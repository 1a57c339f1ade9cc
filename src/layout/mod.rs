//! ForceAtlas2-style layout behind the [`LayoutEngine`] seam.
//!
//! The scheduler only ever calls [`LayoutEngine::run`] for whole batches; it
//! never looks inside. Per-node speed state lives in the engine and survives
//! between batches of one process, but is not part of a checkpoint.

mod forces;
mod quadtree;

use anyhow::{Result, anyhow, bail};
use emath::{Vec2, vec2};

use crate::graph::{EdgeWeight, Graph, Position};
use forces::{
    accumulate_attraction, accumulate_gravity, accumulate_repulsion_exact,
    accumulate_repulsion_for_node,
};
use quadtree::QuadNode;

/// Advances every node position of `graph` by `iterations` steps.
pub trait LayoutEngine {
    fn run(&mut self, graph: &mut Graph, iterations: u64, weight: EdgeWeight) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceAtlas2Settings {
    pub barnes_hut: bool,
    pub barnes_hut_theta: f32,
    pub edge_weight_influence: f32,
    pub gravity: f32,
    pub scaling_ratio: f32,
    pub strong_gravity: bool,
    pub slow_down: f32,
}

impl Default for ForceAtlas2Settings {
    fn default() -> Self {
        Self {
            barnes_hut: true,
            barnes_hut_theta: 0.5,
            edge_weight_influence: 1.0,
            gravity: 0.05,
            scaling_ratio: 20.0,
            strong_gravity: true,
            slow_down: 1.0,
        }
    }
}

#[derive(Clone, Copy)]
struct NodeMotion {
    previous_force: Vec2,
    convergence: f32,
}

impl Default for NodeMotion {
    fn default() -> Self {
        Self {
            previous_force: Vec2::ZERO,
            convergence: 1.0,
        }
    }
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    masses: Vec<f32>,
    forces: Vec<Vec2>,
    edges: Vec<(usize, usize, f32)>,
}

pub struct ForceAtlas2 {
    settings: ForceAtlas2Settings,
    motion: Vec<NodeMotion>,
    scratch: Scratch,
}

impl ForceAtlas2 {
    pub fn new(settings: ForceAtlas2Settings) -> Self {
        Self {
            settings,
            motion: Vec::new(),
            scratch: Scratch::default(),
        }
    }

    fn load(&mut self, graph: &Graph, weight: EdgeWeight) -> Result<()> {
        let node_count = graph.node_count();
        let scratch = &mut self.scratch;

        scratch.positions.clear();
        scratch.positions.reserve(node_count);
        for node in graph.nodes() {
            let Some(position) = node.position else {
                bail!("node {} has no position to lay out", node.id);
            };
            scratch
                .positions
                .push(vec2(position.x as f32, position.y as f32));
        }

        scratch.masses.clear();
        scratch
            .masses
            .extend(graph.degrees().into_iter().map(|degree| 1.0 + degree as f32));

        scratch.edges.clear();
        scratch.edges.extend(
            graph
                .edges()
                .iter()
                .map(|edge| (edge.source, edge.target, weight(edge) as f32)),
        );

        if self.motion.len() != node_count {
            self.motion = vec![NodeMotion::default(); node_count];
        }
        Ok(())
    }

    fn step(&mut self) {
        let settings = self.settings;
        let scratch = &mut self.scratch;
        let node_count = scratch.positions.len();

        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec2::ZERO);
        let positions = &scratch.positions;
        let masses = &scratch.masses;
        let forces = &mut scratch.forces;

        if settings.barnes_hut {
            if let Some(tree) = QuadNode::build(positions, masses) {
                for (index, force) in forces.iter_mut().enumerate() {
                    accumulate_repulsion_for_node(
                        &tree,
                        index,
                        positions,
                        masses,
                        settings.scaling_ratio,
                        settings.barnes_hut_theta,
                        force,
                    );
                }
            }
        } else {
            accumulate_repulsion_exact(positions, masses, settings.scaling_ratio, forces);
        }

        accumulate_gravity(
            positions,
            masses,
            settings.gravity,
            settings.scaling_ratio,
            settings.strong_gravity,
            forces,
        );
        accumulate_attraction(
            &scratch.edges,
            positions,
            settings.edge_weight_influence,
            forces,
        );

        for ((position, force), (motion, mass)) in scratch
            .positions
            .iter_mut()
            .zip(scratch.forces.iter())
            .zip(self.motion.iter_mut().zip(scratch.masses.iter()))
        {
            let swinging = mass * (motion.previous_force - *force).length();
            let traction = (motion.previous_force + *force).length() * 0.5;
            let node_speed =
                motion.convergence * (1.0 + traction).ln() / (1.0 + swinging.sqrt());
            motion.convergence = (node_speed * force.length_sq() / (1.0 + swinging.sqrt()))
                .sqrt()
                .min(1.0);

            *position += *force * (node_speed / settings.slow_down);
            motion.previous_force = *force;
        }
    }

    fn store(&self, graph: &mut Graph) -> Result<()> {
        for (index, position) in self.scratch.positions.iter().enumerate() {
            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(anyhow!("layout diverged: node {index} has a non-finite position"));
            }
            graph.set_position_at(
                index,
                Position::new(f64::from(position.x), f64::from(position.y)),
            );
        }
        Ok(())
    }
}

impl LayoutEngine for ForceAtlas2 {
    fn run(&mut self, graph: &mut Graph, iterations: u64, weight: EdgeWeight) -> Result<()> {
        if graph.node_count() == 0 {
            return Ok(());
        }

        self.load(graph, weight)?;
        for _ in 0..iterations {
            self.step();
        }
        self.store(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn weight(edge: &Edge) -> f64 {
        edge.weight_or_zero()
    }

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        for (source, target, w) in [("a", "b", 10), ("b", "c", 5), ("c", "a", 1), ("c", "d", 2)] {
            graph.upsert_edge(source, target, Some(w));
        }
        for (index, node) in ["a", "b", "c", "d"].into_iter().enumerate() {
            let offset = index as f64;
            graph.set_position(node, Position::new(offset * 0.3, 1.0 - offset * 0.2));
        }
        graph
    }

    fn positions(graph: &Graph) -> Vec<Position> {
        graph
            .nodes()
            .iter()
            .map(|node| node.position.expect("positioned"))
            .collect()
    }

    #[test]
    fn deterministic_for_same_input() {
        let mut first = sample_graph();
        let mut second = sample_graph();
        ForceAtlas2::new(ForceAtlas2Settings::default())
            .run(&mut first, 25, weight)
            .expect("layout");
        ForceAtlas2::new(ForceAtlas2Settings::default())
            .run(&mut second, 25, weight)
            .expect("layout");
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn moves_nodes_and_stays_finite() {
        let mut graph = sample_graph();
        let before = positions(&graph);
        ForceAtlas2::new(ForceAtlas2Settings::default())
            .run(&mut graph, 50, weight)
            .expect("layout");
        let after = positions(&graph);

        assert_ne!(before, after);
        assert!(after.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn exact_and_barnes_hut_both_run() {
        let mut graph = sample_graph();
        let settings = ForceAtlas2Settings {
            barnes_hut: false,
            ..ForceAtlas2Settings::default()
        };
        ForceAtlas2::new(settings)
            .run(&mut graph, 10, weight)
            .expect("layout");
        assert_eq!(graph.positioned_count(), 4);
    }

    #[test]
    fn zero_iterations_leave_positions_untouched() {
        let mut graph = sample_graph();
        let before = positions(&graph);
        ForceAtlas2::new(ForceAtlas2Settings::default())
            .run(&mut graph, 0, weight)
            .expect("layout");
        let after = positions(&graph);
        for (b, a) in before.iter().zip(&after) {
            assert!((b.x - a.x).abs() < 1e-6 && (b.y - a.y).abs() < 1e-6);
        }
    }

    #[test]
    fn unpositioned_node_is_an_error() {
        let mut graph = Graph::new();
        graph.upsert_edge("a", "b", Some(1));
        let result = ForceAtlas2::new(ForceAtlas2Settings::default()).run(&mut graph, 1, weight);
        assert!(result.is_err());
    }
}
