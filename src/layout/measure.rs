use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::hierarchical::SubtreeSpan;
use super::{Element, LayoutTree, LevelHeightTable, NodeId, Size, are_close, group_by_level};

/// Running horizontal offset plus the number of spacing gaps laid down so far.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    x: f32,
    gaps: u32,
}

impl Cursor {
    fn advance(self, width: f32, spacing: f32) -> Self {
        Self {
            x: self.x + width + spacing,
            gaps: self.gaps + 1,
        }
    }
}

pub(super) struct MeasurePass<'a, E> {
    tree: &'a mut LayoutTree<E>,
    heights: &'a mut LevelHeightTable,
    spans: &'a mut HashMap<NodeId, SubtreeSpan>,
    available: Size,
    spacing: f32,
    visited: HashSet<NodeId>,
}

impl<'a, E: Element> MeasurePass<'a, E> {
    pub(super) fn new(
        tree: &'a mut LayoutTree<E>,
        heights: &'a mut LevelHeightTable,
        spans: &'a mut HashMap<NodeId, SubtreeSpan>,
        available: Size,
        spacing: f32,
    ) -> Self {
        Self {
            tree,
            heights,
            spans,
            available,
            spacing,
            visited: HashSet::new(),
        }
    }

    pub(super) fn run(mut self, nodes: &[NodeId], vertical_spacing: f32) -> Size {
        let mut cursor = Cursor::default();
        let mut max_width = 0.0f32;
        for (level, group) in group_by_level(self.tree, nodes) {
            cursor = self.measure_level(level, &group, cursor);
            max_width = max_width.max(cursor.x);
        }
        trace!(nodes = self.visited.len(), "measure pass visited nodes");
        Size::new(
            (max_width - self.spacing).max(0.0),
            self.heights.total_height(vertical_spacing),
        )
    }

    fn measure_level(&mut self, level: usize, nodes: &[NodeId], mut cursor: Cursor) -> Cursor {
        for &id in nodes {
            if !self.visited.insert(id) {
                trace!(node = %id, "skipping node reached through its parent");
                continue;
            }
            let desired = self.tree.measure_node(id, self.available);
            self.heights.record(level, desired.height);
            let as_leaf = cursor.advance(desired.width, self.spacing);

            let children = self.tree.children(id).to_vec();
            if children.is_empty() {
                cursor = as_leaf;
                continue;
            }
            let end = self.measure_level(level + 1, &children, cursor);
            if are_close(end.x, cursor.x) {
                trace!(node = %id, "children contributed no width");
                cursor = as_leaf;
                continue;
            }

            let span = SubtreeSpan {
                extent: end.x - cursor.x,
                gaps: end.gaps - cursor.gaps,
            };
            self.spans.insert(id, span);
            // A parent wider than its children keeps its own width reserved.
            cursor = if span.extent >= desired.width + self.spacing {
                end
            } else {
                as_leaf
            };
        }
        cursor
    }
}
