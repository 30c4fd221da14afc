use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{trace, warn};

use super::hierarchical::SubtreeSpan;
use super::{Element, LayoutTree, LevelHeightTable, NodeId, Rect, Size, are_close, group_by_level};

/// Uniform shrink factors applied to every node's desired size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Ratio {
    pub width: f32,
    pub height: f32,
}

impl Ratio {
    pub fn fit(available: Size, natural: Size) -> Self {
        Self {
            width: fit_ratio(available.width, natural.width),
            height: fit_ratio(available.height, natural.height),
        }
    }
}

/// Shrink-only ratio; a zero or degenerate natural extent never scales.
fn fit_ratio(available: f32, natural: f32) -> f32 {
    if !natural.is_finite() || natural <= 0.0 || available.is_nan() || available >= natural {
        return 1.0;
    }
    (available / natural).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
struct Row {
    top: f32,
    height: f32,
}

pub(super) struct ArrangePass<'a, E> {
    tree: &'a mut LayoutTree<E>,
    spans: &'a HashMap<NodeId, SubtreeSpan>,
    rows: BTreeMap<usize, Row>,
    below_rows: f32,
    ratio: Ratio,
    spacing: f32,
    visited: HashSet<NodeId>,
}

impl<'a, E: Element> ArrangePass<'a, E> {
    pub(super) fn new(
        tree: &'a mut LayoutTree<E>,
        heights: &LevelHeightTable,
        spans: &'a HashMap<NodeId, SubtreeSpan>,
        ratio: Ratio,
        top: f32,
        horizontal_spacing: f32,
        vertical_spacing: f32,
    ) -> Self {
        let mut rows = BTreeMap::new();
        let mut cursor_y = top;
        for (level, height) in heights.iter() {
            let height = height * ratio.height;
            rows.insert(level, Row { top: cursor_y, height });
            cursor_y += height + vertical_spacing;
        }
        Self {
            tree,
            spans,
            rows,
            below_rows: cursor_y,
            ratio,
            spacing: horizontal_spacing,
            visited: HashSet::new(),
        }
    }

    pub(super) fn run(mut self, nodes: &[NodeId], left: f32) {
        let mut x = left;
        for (level, group) in group_by_level(self.tree, nodes) {
            x = self.arrange_level(level, &group, x);
        }
    }

    fn row(&self, level: usize) -> Row {
        match self.rows.get(&level) {
            Some(row) => *row,
            None => {
                warn!(level, "level was not measured, placing it below the measured rows");
                Row {
                    top: self.below_rows,
                    height: 0.0,
                }
            }
        }
    }

    fn arrange_level(&mut self, level: usize, nodes: &[NodeId], mut x: f32) -> f32 {
        let row = self.row(level);
        for &id in nodes {
            if !self.visited.insert(id) {
                continue;
            }
            let desired = self.tree.desired_size(id);
            let width = desired.width * self.ratio.width;
            let height = desired.height * self.ratio.height;
            let y = row.top + (row.height - height) / 2.0;
            let own_extent = width + self.spacing;

            let children = self.tree.children(id).to_vec();
            if !children.is_empty() {
                let span = self
                    .spans
                    .get(&id)
                    .map(|span| span.scaled(self.ratio.width, self.spacing))
                    .unwrap_or(0.0);
                let start = if span < own_extent {
                    x + (own_extent - span) / 2.0
                } else {
                    x
                };
                let end = self.arrange_level(level + 1, &children, start);
                if !are_close(end, start) {
                    // Midpoint of the children's rectangles, without the trailing gap.
                    let mid = start + (end - start - self.spacing) / 2.0;
                    let rect = Rect::from_xywh(mid - width / 2.0, y, width, height);
                    self.tree.arrange_node(id, rect);
                    x = end.max(x + own_extent);
                    continue;
                }
                trace!(node = %id, "arranging collapsed subtree as a leaf");
            }

            self.tree.arrange_node(id, Rect::from_xywh(x, y, width, height));
            x += own_extent;
        }
        x
    }
}
