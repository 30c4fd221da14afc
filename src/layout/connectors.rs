use std::collections::HashSet;

use serde::Serialize;

use super::{LayoutTree, NodeId, Point, Rect};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: impl Into<String>, width: f32) -> Self {
        Self {
            color: color.into(),
            width,
        }
    }
}

impl Default for Stroke {
    fn default() -> Self {
        Self::new("#000000", 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStyle {
    pub fill: String,
    pub stroke: Stroke,
    pub corner_radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: String,
    pub line_height: f32,
}

/// Drawing surface the layout renders into.
pub trait Canvas {
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke);

    fn draw_rect(&mut self, _rect: Rect, _style: &BoxStyle) {}

    /// Draws `lines` as a block centred on `center`.
    fn draw_text(&mut self, _center: Point, _lines: &[String], _style: &TextStyle) {}
}

/// Elbow connector between a parent and one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Connector {
    pub parent: NodeId,
    pub child: NodeId,
    pub segments: [(Point, Point); 3],
}

/// Down from the parent, across on the midline, down into the child.
pub fn elbow_segments(parent: Rect, child: Rect, vertical_spacing: f32) -> [(Point, Point); 3] {
    let parent_x = parent.mid_x();
    let child_x = child.mid_x();
    let mid_y = parent.bottom + vertical_spacing / 2.0;
    [
        (parent.bottom_center(), Point::new(parent_x, mid_y)),
        (Point::new(parent_x, mid_y), Point::new(child_x, mid_y)),
        (Point::new(child_x, mid_y), child.top_center()),
    ]
}

/// Every parent-child edge reachable from `nodes`, depth first, each edge once.
pub fn collect_connectors<E>(
    tree: &LayoutTree<E>,
    nodes: &[NodeId],
    vertical_spacing: f32,
) -> Vec<Connector> {
    let mut connectors = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = nodes.iter().rev().copied().collect();
    while let Some(parent) = stack.pop() {
        if !visited.insert(parent) {
            continue;
        }
        let parent_bounds = tree.bounds(parent);
        for &child in tree.children(parent) {
            connectors.push(Connector {
                parent,
                child,
                segments: elbow_segments(parent_bounds, tree.bounds(child), vertical_spacing),
            });
        }
        stack.extend(tree.children(parent).iter().rev().copied());
    }
    connectors
}

pub(super) fn draw_connectors<E>(
    tree: &LayoutTree<E>,
    nodes: &[NodeId],
    vertical_spacing: f32,
    stroke: &Stroke,
    canvas: &mut dyn Canvas,
) -> usize {
    let connectors = collect_connectors(tree, nodes, vertical_spacing);
    for connector in &connectors {
        for (from, to) in connector.segments {
            canvas.draw_line(from, to, stroke);
        }
    }
    connectors.len()
}
