use emath::Vec2;

use super::quadtree::QuadNode;

fn repulsion_between(delta: Vec2, mass_product: f32, scaling_ratio: f32) -> Vec2 {
    let distance_sq = delta.length_sq();
    if distance_sq <= f32::EPSILON {
        return Vec2::ZERO;
    }
    delta * (scaling_ratio * mass_product / distance_sq)
}

/// Exact pairwise repulsion, used when Barnes-Hut is disabled.
pub(super) fn accumulate_repulsion_exact(
    positions: &[Vec2],
    masses: &[f32],
    scaling_ratio: f32,
    forces: &mut [Vec2],
) {
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let force = repulsion_between(
                positions[i] - positions[j],
                masses[i] * masses[j],
                scaling_ratio,
            );
            forces[i] += force;
            forces[j] -= force;
        }
    }
}

pub(super) fn accumulate_repulsion_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    masses: &[f32],
    scaling_ratio: f32,
    theta: f32,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            *force += repulsion_between(
                point - positions[other_index],
                masses[index] * masses[other_index],
                scaling_ratio,
            );
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance = delta.length().max(f32::EPSILON);
    let can_approximate =
        !node.bounds.contains(point) && (node.bounds.side_length() / distance) < theta;

    if can_approximate {
        *force += repulsion_between(delta, masses[index] * node.mass, scaling_ratio);
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion_for_node(
            child,
            index,
            positions,
            masses,
            scaling_ratio,
            theta,
            force,
        );
    }
}

/// Linear attraction along each edge, scaled by `weight ^ influence`.
pub(super) fn accumulate_attraction(
    edges: &[(usize, usize, f32)],
    positions: &[Vec2],
    edge_weight_influence: f32,
    forces: &mut [Vec2],
) {
    for &(source, target, weight) in edges {
        if source == target {
            continue;
        }

        let scale = if edge_weight_influence == 0.0 {
            1.0
        } else if edge_weight_influence == 1.0 {
            weight
        } else {
            weight.powf(edge_weight_influence)
        };
        if scale == 0.0 {
            continue;
        }

        let pull = (positions[source] - positions[target]) * scale;
        forces[source] -= pull;
        forces[target] += pull;
    }
}

pub(super) fn accumulate_gravity(
    positions: &[Vec2],
    masses: &[f32],
    gravity: f32,
    scaling_ratio: f32,
    strong_gravity: bool,
    forces: &mut [Vec2],
) {
    for ((position, mass), force) in positions.iter().zip(masses).zip(forces.iter_mut()) {
        let distance = position.length();
        if strong_gravity {
            *force -= *position * (scaling_ratio * mass * gravity);
        } else if distance > 0.0 {
            *force -= *position * (mass * gravity / distance);
        }
    }
}
