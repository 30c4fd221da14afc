use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::config::LayoutConfig;

use super::arrange::{ArrangePass, Ratio};
use super::connectors::{Canvas, Stroke, draw_connectors};
use super::measure::MeasurePass;
use super::{
    Element, HierarchicalLayout, LayoutError, LayoutTree, LevelHeightTable, NodeId, Rect, Size,
    render_elements,
};

pub const DEFAULT_SPACING: f32 = 6.0;

/// Horizontal room a node's children took during measure.
///
/// `extent` includes the trailing spacing after the last child; `gaps` counts the
/// spacing increments inside it so the arranger can scale node widths but not spacing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct SubtreeSpan {
    pub extent: f32,
    pub gaps: u32,
}

impl SubtreeSpan {
    pub fn scaled(self, ratio: f32, spacing: f32) -> f32 {
        let gap_total = self.gaps as f32 * spacing;
        (self.extent - gap_total) * ratio + gap_total
    }
}

/// Top-down tree layout: children centred under their parent, one row per level,
/// elbow connectors between rows.
#[derive(Debug, Clone)]
pub struct HierarchicalTree {
    horizontal_spacing: f32,
    vertical_spacing: f32,
    stroke: Stroke,
    heights: LevelHeightTable,
    spans: HashMap<NodeId, SubtreeSpan>,
    total_size: Option<Size>,
}

impl Default for HierarchicalTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchicalTree {
    pub fn new() -> Self {
        Self::with_spacing(DEFAULT_SPACING, DEFAULT_SPACING)
    }

    pub fn with_spacing(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal_spacing: horizontal,
            vertical_spacing: vertical,
            stroke: Stroke::default(),
            heights: LevelHeightTable::new(),
            spans: HashMap::new(),
            total_size: None,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::with_spacing(config.horizontal_spacing, config.vertical_spacing)
    }

    pub fn horizontal_spacing(&self) -> f32 {
        self.horizontal_spacing
    }

    pub fn set_horizontal_spacing(&mut self, value: f32) {
        self.horizontal_spacing = value;
    }

    pub fn vertical_spacing(&self) -> f32 {
        self.vertical_spacing
    }

    pub fn set_vertical_spacing(&mut self, value: f32) {
        self.vertical_spacing = value;
    }

    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    pub fn set_stroke(&mut self, stroke: Stroke) {
        self.stroke = stroke;
    }

    /// Natural size from the last measure pass.
    pub fn total_size(&self) -> Option<Size> {
        self.total_size
    }

    pub fn level_heights(&self) -> &LevelHeightTable {
        &self.heights
    }

    /// Width the children of `id` occupied during the last measure, from the left edge
    /// of the first subtree to the right edge of the last. `None` for leaves and
    /// collapsed subtrees.
    pub fn children_span(&self, id: NodeId) -> Option<f32> {
        self.spans
            .get(&id)
            .map(|span| (span.extent - self.horizontal_spacing).max(0.0))
    }

    fn check_spacing(&self) -> Result<(), LayoutError> {
        for (name, value) in [
            ("horizontal spacing", self.horizontal_spacing),
            ("vertical spacing", self.vertical_spacing),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidSpacing { name, value });
            }
        }
        Ok(())
    }
}

impl HierarchicalLayout for HierarchicalTree {
    #[instrument(level = "debug", skip_all, fields(nodes = nodes.len()))]
    fn measure<E: Element>(
        &mut self,
        tree: &mut LayoutTree<E>,
        nodes: &[NodeId],
        available: Size,
    ) -> Result<Size, LayoutError> {
        self.check_spacing()?;
        tree.validate(nodes)?;
        self.heights.clear();
        self.spans.clear();
        self.total_size = None;

        let size = MeasurePass::new(
            tree,
            &mut self.heights,
            &mut self.spans,
            available,
            self.horizontal_spacing,
        )
        .run(nodes, self.vertical_spacing);

        debug!(
            width = size.width,
            height = size.height,
            levels = self.heights.len(),
            "measured tree"
        );
        self.total_size = Some(size);
        Ok(size)
    }

    #[instrument(level = "debug", skip_all, fields(nodes = nodes.len()))]
    fn arrange<E: Element>(
        &mut self,
        tree: &mut LayoutTree<E>,
        nodes: &[NodeId],
        bounds: Rect,
    ) -> Result<(), LayoutError> {
        let total = self.total_size.ok_or(LayoutError::NotMeasured)?;
        self.check_spacing()?;
        tree.validate(nodes)?;

        let ratio = Ratio::fit(bounds.size(), total);
        debug!(
            width_ratio = ratio.width,
            height_ratio = ratio.height,
            "arranging tree"
        );
        ArrangePass::new(
            tree,
            &self.heights,
            &self.spans,
            ratio,
            bounds.top,
            self.horizontal_spacing,
            self.vertical_spacing,
        )
        .run(nodes, bounds.left);
        Ok(())
    }

    fn render<E: Element>(
        &self,
        tree: &LayoutTree<E>,
        nodes: &[NodeId],
        _bounds: Rect,
        canvas: &mut dyn Canvas,
    ) {
        let drawn = draw_connectors(tree, nodes, self.vertical_spacing, &self.stroke, canvas);
        debug!(connectors = drawn, "drew connectors");
        render_elements(tree, nodes, canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(width: f32, height: f32) -> Size {
        Size::new(width, height)
    }

    #[test]
    fn defaults_match_documented_spacing() {
        let layout = HierarchicalTree::new();
        assert_eq!(layout.horizontal_spacing(), 6.0);
        assert_eq!(layout.vertical_spacing(), 6.0);
        assert!(layout.total_size().is_none());
    }

    #[test]
    fn spacing_setters_round_trip() {
        let mut layout = HierarchicalTree::new();
        layout.set_horizontal_spacing(12.0);
        layout.set_vertical_spacing(3.5);
        assert_eq!(layout.horizontal_spacing(), 12.0);
        assert_eq!(layout.vertical_spacing(), 3.5);
    }

    #[test]
    fn three_siblings_trim_trailing_spacing() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let nodes: Vec<NodeId> = (0..3).map(|_| tree.add_root(leaf(4.0, 5.0))).collect();
        let mut layout = HierarchicalTree::with_spacing(2.0, 6.0);
        let size = layout.measure(&mut tree, &nodes, Size::unbounded()).unwrap();
        assert_eq!(size, Size::new(16.0, 5.0));
    }

    #[test]
    fn parent_is_centred_over_children_span() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(leaf(8.0, 10.0));
        let a = tree.add_child(root, leaf(10.0, 10.0)).unwrap();
        let b = tree.add_child(root, leaf(10.0, 10.0)).unwrap();
        let mut layout = HierarchicalTree::new();

        let size = layout.measure(&mut tree, &[root], Size::unbounded()).unwrap();
        assert_eq!(size, Size::new(26.0, 26.0));
        assert_eq!(layout.children_span(root), Some(26.0));

        layout.arrange(&mut tree, &[root], Rect::from_size(size)).unwrap();
        assert_eq!(tree.bounds(a), Rect::from_xywh(0.0, 16.0, 10.0, 10.0));
        assert_eq!(tree.bounds(b), Rect::from_xywh(16.0, 16.0, 10.0, 10.0));
        assert_eq!(tree.bounds(root).mid_x(), 13.0);
        assert_eq!(tree.bounds(root), Rect::from_xywh(9.0, 0.0, 8.0, 10.0));
    }

    #[test]
    fn flat_collection_is_not_measured_twice() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(leaf(8.0, 10.0));
        let a = tree.add_child(root, leaf(10.0, 10.0)).unwrap();
        let b = tree.add_child(root, leaf(10.0, 10.0)).unwrap();
        let mut layout = HierarchicalTree::new();
        let from_roots = layout.measure(&mut tree, &[root], Size::unbounded()).unwrap();
        let from_all = layout.measure(&mut tree, &[b, root, a], Size::unbounded()).unwrap();
        assert_eq!(from_roots, from_all);
    }

    #[test]
    fn arrange_requires_measure() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(leaf(1.0, 1.0));
        let mut layout = HierarchicalTree::new();
        let err = layout
            .arrange(&mut tree, &[root], Rect::from_xywh(0.0, 0.0, 10.0, 10.0))
            .unwrap_err();
        assert_eq!(err, LayoutError::NotMeasured);
    }

    #[test]
    fn negative_spacing_is_rejected() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(leaf(1.0, 1.0));
        let mut layout = HierarchicalTree::with_spacing(-1.0, 6.0);
        let err = layout
            .measure(&mut tree, &[root], Size::unbounded())
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidSpacing { value, .. } if value == -1.0));
    }

    #[test]
    fn empty_input_measures_to_zero() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let mut layout = HierarchicalTree::new();
        let size = layout.measure(&mut tree, &[], Size::unbounded()).unwrap();
        assert_eq!(size, Size::ZERO);
        layout
            .arrange(&mut tree, &[], Rect::from_xywh(0.0, 0.0, 100.0, 100.0))
            .unwrap();
    }

    #[test]
    fn measure_resets_side_tables() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(leaf(8.0, 10.0));
        tree.add_child(root, leaf(10.0, 10.0)).unwrap();
        let lone = tree.add_root(leaf(3.0, 3.0));
        let mut layout = HierarchicalTree::new();
        layout.measure(&mut tree, &[root], Size::unbounded()).unwrap();
        assert!(layout.children_span(root).is_some());
        layout.measure(&mut tree, &[lone], Size::unbounded()).unwrap();
        assert!(layout.children_span(root).is_none());
        assert_eq!(layout.level_heights().len(), 1);
    }

    #[test]
    fn scaled_span_keeps_spacing() {
        let span = SubtreeSpan {
            extent: 32.0,
            gaps: 2,
        };
        assert_eq!(span.scaled(1.0, 6.0), 32.0);
        assert_eq!(span.scaled(0.5, 6.0), 22.0);
    }
}
