use emath::{Vec2, vec2};

const QUADTREE_LEAF_CAPACITY: usize = 8;
const QUADTREE_MAX_DEPTH: usize = 24;

#[derive(Clone, Copy)]
pub(super) struct QuadBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), &point| (min.min(point), max.max(point)),
        );
        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        // Padded so points on the far edge still fall inside.
        let span = (max - min).max_elem().max(f32::EPSILON);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span * 0.5 * 1.001,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point - self.center).abs().max_elem() <= self.half_extent
    }

    /// Quadrant bit 0 is set right of center, bit 1 above it.
    fn quadrant_for(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | usize::from(point.y >= self.center.y) << 1
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let sign = |bit: usize| if quadrant & bit != 0 { quarter } else { -quarter };
        Self {
            center: self.center + vec2(sign(1), sign(2)),
            half_extent: quarter,
        }
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }
}

/// Barnes-Hut region. `mass` is the summed node mass and `center_of_mass`
/// the mass-weighted centroid of every node below this region.
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(positions: &[Vec2], masses: &[f32]) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions)?;
        Some(Self::build_node(bounds, (0..positions.len()).collect(), positions, masses, 0))
    }

    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        masses: &[f32],
        depth: usize,
    ) -> Self {
        let (weighted, mass) = indices.iter().fold((Vec2::ZERO, 0.0_f32), |(sum, mass), &index| {
            (sum + positions[index] * masses[index], mass + masses[index])
        });

        let center_of_mass = if mass > 0.0 {
            weighted / mass
        } else {
            bounds.center
        };

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        // Coincident points cannot be separated any further.
        if bounds.half_extent <= f32::EPSILON {
            return node;
        }

        let mut buckets: [Vec<usize>; 4] = Default::default();
        for index in std::mem::take(&mut node.indices) {
            buckets[bounds.quadrant_for(positions[index])].push(index);
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                let region = bounds.child(quadrant);
                let child = Self::build_node(region, bucket, positions, masses, depth + 1);
                node.children[quadrant] = Some(Box::new(child));
            }
        }
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}
