use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use resvg::tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::graph::{Graph, Position};

const MARGIN_RATIO: f32 = 0.02;

pub trait SnapshotRenderer {
    /// Rasterizes `graph` into a `size` x `size` image at `path`.
    fn render(&mut self, graph: &Graph, size: u32, path: &Path) -> Result<()>;
}

pub fn preview_path(root: &str, iterations: u64) -> PathBuf {
    PathBuf::from(format!("{root}_{iterations}.png"))
}

pub fn final_render_path(root: &str, iterations: u64) -> PathBuf {
    PathBuf::from(format!("{root}_after_{iterations}_iterations.png"))
}

/// Black nodes over light grey edges on a white square canvas.
#[derive(Default)]
pub struct PngRenderer;

struct Viewport {
    center: Position,
    scale: f32,
    half_size: f32,
}

impl Viewport {
    fn fit(graph: &Graph, size: u32) -> Option<Self> {
        let mut min = Position::new(f64::INFINITY, f64::INFINITY);
        let mut max = Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for position in graph.nodes().iter().filter_map(|node| node.position) {
            min.x = min.x.min(position.x);
            min.y = min.y.min(position.y);
            max.x = max.x.max(position.x);
            max.y = max.y.max(position.y);
        }
        if !min.x.is_finite() || !max.x.is_finite() || !min.y.is_finite() || !max.y.is_finite() {
            return None;
        }

        let half_size = size as f32 * 0.5;
        let usable = size as f32 * (1.0 - 2.0 * MARGIN_RATIO);
        let span = (max.x - min.x).max(max.y - min.y);
        let scale = if span > 0.0 {
            usable / span as f32
        } else {
            1.0
        };

        Some(Self {
            center: Position::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5),
            scale,
            half_size,
        })
    }

    fn project(&self, position: Position) -> (f32, f32) {
        let x = (position.x - self.center.x) as f32 * self.scale + self.half_size;
        let y = self.half_size - (position.y - self.center.y) as f32 * self.scale;
        (x, y)
    }
}

impl SnapshotRenderer for PngRenderer {
    fn render(&mut self, graph: &Graph, size: u32, path: &Path) -> Result<()> {
        let mut pixmap = Pixmap::new(size, size)
            .ok_or_else(|| anyhow!("failed to allocate {size}x{size} surface"))?;
        pixmap.fill(resvg::tiny_skia::Color::WHITE);

        if let Some(viewport) = Viewport::fit(graph, size) {
            let line_width = (size as f32 / 4096.0).max(0.25);
            let node_radius = (size as f32 / 1024.0).max(0.75);

            let mut edges = PathBuilder::new();
            for edge in graph.edges() {
                let (Some(from), Some(to)) =
                    (graph.position_at(edge.source), graph.position_at(edge.target))
                else {
                    continue;
                };
                let (x1, y1) = viewport.project(from);
                let (x2, y2) = viewport.project(to);
                edges.move_to(x1, y1);
                edges.line_to(x2, y2);
            }

            let mut paint = Paint::default();
            paint.anti_alias = true;
            if let Some(edge_path) = edges.finish() {
                paint.set_color_rgba8(0xcc, 0xcc, 0xcc, 0xff);
                let stroke = Stroke {
                    width: line_width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&edge_path, &paint, &stroke, Transform::identity(), None);
            }

            let mut nodes = PathBuilder::new();
            for position in graph.nodes().iter().filter_map(|node| node.position) {
                let (x, y) = viewport.project(position);
                nodes.push_circle(x, y, node_radius);
            }
            if let Some(node_path) = nodes.finish() {
                paint.set_color_rgba8(0x00, 0x00, 0x00, 0xff);
                pixmap.fill_path(
                    &node_path,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }

        pixmap
            .save_png(path)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
