use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::ir::Diagram;
use crate::theme::Theme;

mod arrange;
mod connectors;
mod error;
mod hierarchical;
mod levels;
mod measure;
mod text;

pub use connectors::{
    BoxStyle, Canvas, Connector, Stroke, TextStyle, collect_connectors, elbow_segments,
};
pub use error::LayoutError;
pub use hierarchical::HierarchicalTree;
pub use levels::LevelHeightTable;
pub use text::{LabelElement, TextBlock};

/// Tolerance used by both passes to decide whether a subtree contributed any width.
///
/// Measure and arrange must agree on which subtrees collapse, so neither pass compares
/// offsets any other way.
pub const SPAN_EPSILON: f32 = 1e-4;

/// Returns true when two offsets differ by at most [`SPAN_EPSILON`], or by a few ulps
/// at offsets large enough that the ulp exceeds it.
pub fn are_close(a: f32, b: f32) -> bool {
    if a == b {
        return true;
    }
    let drift = 4.0 * f32::EPSILON * a.abs().max(b.abs());
    (a - b).abs() <= SPAN_EPSILON.max(drift)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A size that never constrains a measurement.
    pub fn unbounded() -> Self {
        Self::new(f32::INFINITY, f32::INFINITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle stored as edges, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn from_size(size: Size) -> Self {
        Self::from_xywh(0.0, 0.0, size.width, size.height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn mid_x(&self) -> f32 {
        self.left + self.width() / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.top + self.height() / 2.0
    }

    pub fn top_center(&self) -> Point {
        Point::new(self.mid_x(), self.top)
    }

    pub fn bottom_center(&self) -> Point {
        Point::new(self.mid_x(), self.bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The capabilities a laid-out node provides on its own.
pub trait Element {
    /// Computes the size this element wants given the space on offer.
    fn measure(&mut self, available: Size) -> Size;

    /// Receives the final rectangle chosen by the layout.
    fn arrange(&mut self, _bounds: Rect) {}

    /// Draws the element itself; connectors are drawn by the layout.
    fn render(&self, _bounds: Rect, _canvas: &mut dyn Canvas) {}
}

/// Fixed-size node, handy for hosts that size nodes up front.
impl Element for Size {
    fn measure(&mut self, _available: Size) -> Size {
        *self
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode<E> {
    pub element: E,
    level: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    desired_size: Size,
    bounds: Rect,
}

/// Arena owning every node of a forest plus the geometry the layout assigns to them.
#[derive(Debug, Clone)]
pub struct LayoutTree<E> {
    nodes: Vec<TreeNode<E>>,
}

impl<E> Default for LayoutTree<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> LayoutTree<E> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_root(&mut self, element: E) -> NodeId {
        self.insert(element, 0)
    }

    /// Adds `element` as the last child of `parent`, one level below it.
    pub fn add_child(&mut self, parent: NodeId, element: E) -> Result<NodeId, LayoutError> {
        let level = self.get(parent)?.level + 1;
        let child = self.insert(element, level);
        self.attach(parent, child)?;
        Ok(child)
    }

    /// Inserts a detached node at an explicit level.
    pub fn insert(&mut self, element: E, level: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            element,
            level,
            parent: None,
            children: Vec::new(),
            desired_size: Size::ZERO,
            bounds: Rect::default(),
        });
        id
    }

    /// Links `child` under `parent` without checking the tree invariants;
    /// [`LayoutTree::validate`] reports violations.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), LayoutError> {
        self.get(child)?;
        self.get_mut(parent)?.children.push(child);
        let node = &mut self.nodes[child.0];
        if node.parent.is_none() {
            node.parent = Some(parent);
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Result<&TreeNode<E>, LayoutError> {
        self.nodes.get(id.0).ok_or(LayoutError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut TreeNode<E>, LayoutError> {
        self.nodes.get_mut(id.0).ok_or(LayoutError::UnknownNode(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.nodes[id.0].parent.is_none())
            .collect()
    }

    // Accessors below index directly; ids only come from this arena and callers go
    // through `validate` before a pass.
    pub fn level(&self, id: NodeId) -> usize {
        self.nodes[id.0].level
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn desired_size(&self, id: NodeId) -> Size {
        self.nodes[id.0].desired_size
    }

    pub fn bounds(&self, id: NodeId) -> Rect {
        self.nodes[id.0].bounds
    }

    pub fn element(&self, id: NodeId) -> &E {
        &self.nodes[id.0].element
    }

    pub fn element_mut(&mut self, id: NodeId) -> &mut E {
        &mut self.nodes[id.0].element
    }

    /// Checks that everything reachable from `nodes` forms a true tree whose levels
    /// increase by exactly one along every edge.
    pub fn validate(&self, nodes: &[NodeId]) -> Result<(), LayoutError> {
        let mut first_parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = Vec::new();
        for &id in nodes {
            self.get(id)?;
            stack.push(id);
        }
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let level = self.nodes[id.0].level;
            for &child in &self.nodes[id.0].children {
                let child_node = self.get(child)?;
                if let Some(&first) = first_parent.get(&child) {
                    if first != id {
                        return Err(LayoutError::DuplicateParent {
                            child,
                            first,
                            second: id,
                        });
                    }
                    continue;
                }
                if child_node.level != level + 1 {
                    return Err(LayoutError::LevelMismatch {
                        parent: id,
                        child,
                        expected: level + 1,
                        found: child_node.level,
                    });
                }
                first_parent.insert(child, id);
                stack.push(child);
            }
        }
        Ok(())
    }
}

impl<E: Element> LayoutTree<E> {
    pub(crate) fn measure_node(&mut self, id: NodeId, available: Size) -> Size {
        let node = &mut self.nodes[id.0];
        let desired = node.element.measure(available);
        node.desired_size = desired;
        desired
    }

    pub(crate) fn arrange_node(&mut self, id: NodeId, bounds: Rect) {
        let node = &mut self.nodes[id.0];
        node.bounds = bounds;
        node.element.arrange(bounds);
    }
}

/// Groups nodes by level, ascending, keeping input order within a level.
pub(crate) fn group_by_level<E>(tree: &LayoutTree<E>, nodes: &[NodeId]) -> BTreeMap<usize, Vec<NodeId>> {
    let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for &id in nodes {
        groups.entry(tree.level(id)).or_default().push(id);
    }
    groups
}

/// The three-phase contract a host drives: measure, then arrange, then render.
pub trait HierarchicalLayout {
    fn measure<E: Element>(
        &mut self,
        tree: &mut LayoutTree<E>,
        nodes: &[NodeId],
        available: Size,
    ) -> Result<Size, LayoutError>;

    fn arrange<E: Element>(
        &mut self,
        tree: &mut LayoutTree<E>,
        nodes: &[NodeId],
        bounds: Rect,
    ) -> Result<(), LayoutError>;

    fn render<E: Element>(
        &self,
        tree: &LayoutTree<E>,
        nodes: &[NodeId],
        _bounds: Rect,
        canvas: &mut dyn Canvas,
    ) {
        render_elements(tree, nodes, canvas);
    }
}

/// Default rendering: every node reachable from `nodes`, once, with its own bounds.
pub fn render_elements<E: Element>(tree: &LayoutTree<E>, nodes: &[NodeId], canvas: &mut dyn Canvas) {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = nodes.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        tree.element(id).render(tree.bounds(id), canvas);
        stack.extend(tree.children(id).iter().rev().copied());
    }
}

/// A laid-out diagram ready to be rendered or dumped.
#[derive(Debug, Clone)]
pub struct DiagramLayout {
    pub tree: LayoutTree<LabelElement>,
    pub roots: Vec<NodeId>,
    pub engine: HierarchicalTree,
    /// Natural size reported by the measure pass.
    pub natural_size: Size,
    /// Rectangle handed to the arrange pass.
    pub bounds: Rect,
    pub width: f32,
    pub height: f32,
}

pub fn compute_layout(
    diagram: &Diagram,
    theme: &Theme,
    config: &LayoutConfig,
    viewport: Size,
) -> Result<DiagramLayout, LayoutError> {
    let mut tree: LayoutTree<LabelElement> = LayoutTree::new();
    let mut ids: Vec<NodeId> = Vec::with_capacity(diagram.nodes.len());
    for node in &diagram.nodes {
        let element = LabelElement::new(&node.id, &node.label, theme, config);
        ids.push(tree.insert(element, node.level));
    }
    for (idx, node) in diagram.nodes.iter().enumerate() {
        for &child in &node.children {
            tree.attach(ids[idx], ids[child])?;
        }
    }
    let roots: Vec<NodeId> = diagram.roots.iter().map(|&idx| ids[idx]).collect();

    let pad = config.diagram_padding.max(0.0);
    let available = Size::new(
        (viewport.width - pad * 2.0).max(0.0),
        (viewport.height - pad * 2.0).max(0.0),
    );

    let mut engine = HierarchicalTree::from_config(config);
    engine.set_stroke(Stroke::new(theme.line_color.clone(), theme.line_width));
    let natural_size = engine.measure(&mut tree, &roots, available)?;
    let bounds = if config.fit_to_viewport {
        Rect::from_xywh(pad, pad, available.width, available.height)
    } else {
        Rect::from_xywh(pad, pad, natural_size.width, natural_size.height)
    };
    engine.arrange(&mut tree, &roots, bounds)?;

    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for id in tree.ids() {
        let rect = tree.bounds(id);
        max_x = max_x.max(rect.right);
        max_y = max_y.max(rect.bottom);
    }

    Ok(DiagramLayout {
        tree,
        roots,
        engine,
        natural_size,
        bounds,
        width: (max_x + pad).max(1.0),
        height: (max_y + pad).max(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn are_close_tolerates_accumulated_drift() {
        let mut sum = 0.0f32;
        for _ in 0..10 {
            sum += 0.1;
        }
        assert!(are_close(sum, 1.0));
        assert!(!are_close(1.0, 1.01));
        assert!(are_close(0.0, 0.0));
    }

    #[test]
    fn are_close_does_not_grow_with_the_offset() {
        assert!(!are_close(100_000.0, 100_006.0));
        assert!(!are_close(1.0e7, 1.0e7 + 6.0));
        assert!(are_close(100_000.0, 100_000.0 + f32::EPSILON * 100_000.0));
    }

    #[test]
    fn canvas_grows_to_cover_unscaled_spacing() {
        let mut diagram = Diagram::new();
        for idx in 0..100 {
            diagram.push(format!("n{idx}"), "x".into(), None);
        }
        let config = LayoutConfig {
            horizontal_spacing: 6.0,
            ..fast_config()
        };
        let layout = compute_layout(&diagram, &Theme::classic(), &config, Size::new(500.0, 600.0)).unwrap();
        assert!(layout.natural_size.width > 500.0);
        let rightmost = layout
            .tree
            .ids()
            .map(|id| layout.tree.bounds(id).right)
            .fold(0.0f32, f32::max);
        assert!(rightmost > layout.bounds.right);
        assert!(layout.width >= rightmost + config.diagram_padding - 1e-3);
    }

    #[test]
    fn rect_helpers() {
        let rect = Rect::from_xywh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right, 40.0);
        assert_eq!(rect.bottom, 60.0);
        assert_eq!(rect.mid_x(), 25.0);
        assert_eq!(rect.bottom_center(), Point::new(25.0, 60.0));
        assert_eq!(rect.top_center(), Point::new(25.0, 20.0));
    }

    #[test]
    fn add_child_sets_level_and_parent() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(Size::new(1.0, 1.0));
        let child = tree.add_child(root, Size::new(1.0, 1.0)).unwrap();
        assert_eq!(tree.level(child), 1);
        assert_eq!(tree.parent(child), Some(root));
        assert_eq!(tree.children(root), &[child]);
        assert_eq!(tree.roots(), vec![root]);
    }

    #[test]
    fn validate_accepts_flat_collection_of_a_tree() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(Size::ZERO);
        let a = tree.add_child(root, Size::ZERO).unwrap();
        let b = tree.add_child(a, Size::ZERO).unwrap();
        assert!(tree.validate(&[root, a, b]).is_ok());
    }

    #[test]
    fn validate_rejects_second_parent() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let r1 = tree.add_root(Size::ZERO);
        let r2 = tree.add_root(Size::ZERO);
        let child = tree.add_child(r1, Size::ZERO).unwrap();
        tree.attach(r2, child).unwrap();
        let err = tree.validate(&[r1, r2]).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateParent { child: c, .. } if c == child));
    }

    #[test]
    fn validate_rejects_level_gap_and_cycles() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let root = tree.add_root(Size::ZERO);
        let skipped = tree.insert(Size::ZERO, 2);
        tree.attach(root, skipped).unwrap();
        assert!(matches!(
            tree.validate(&[root]),
            Err(LayoutError::LevelMismatch { expected: 1, found: 2, .. })
        ));

        let mut cyclic: LayoutTree<Size> = LayoutTree::new();
        let a = cyclic.add_root(Size::ZERO);
        let b = cyclic.add_child(a, Size::ZERO).unwrap();
        cyclic.attach(b, a).unwrap();
        assert!(cyclic.validate(&[a]).is_err());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let tree: LayoutTree<Size> = LayoutTree::new();
        let mut other: LayoutTree<Size> = LayoutTree::new();
        let foreign = other.add_root(Size::ZERO);
        assert_eq!(tree.validate(&[foreign]), Err(LayoutError::UnknownNode(foreign)));
    }

    fn sample_diagram() -> Diagram {
        let mut diagram = Diagram::new();
        let root = diagram.push("root".into(), "Root".into(), None);
        diagram.push("a".into(), "Alpha".into(), Some(root));
        diagram.push("b".into(), "Beta".into(), Some(root));
        diagram
    }

    fn fast_config() -> LayoutConfig {
        LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn compute_layout_pads_and_styles_the_tree() {
        let theme = Theme::modern();
        let config = fast_config();
        let layout = compute_layout(&sample_diagram(), &theme, &config, Size::new(800.0, 600.0)).unwrap();

        assert_eq!(layout.roots.len(), 1);
        assert_eq!(layout.engine.stroke(), &Stroke::new(theme.line_color.clone(), theme.line_width));
        let pad = config.diagram_padding;
        for id in layout.tree.ids() {
            let rect = layout.tree.bounds(id);
            assert!(rect.left >= pad && rect.top >= pad);
            assert!(rect.right + pad <= layout.width + 1e-3);
        }
        assert_eq!(layout.tree.element(layout.roots[0]).id, "root");
    }

    #[test]
    fn compute_layout_without_fit_uses_natural_size() {
        let theme = Theme::classic();
        let config = LayoutConfig {
            fit_to_viewport: false,
            ..fast_config()
        };
        let layout = compute_layout(&sample_diagram(), &theme, &config, Size::new(10.0, 10.0)).unwrap();
        assert!((layout.bounds.width() - layout.natural_size.width).abs() < 1e-3);
        assert!((layout.bounds.height() - layout.natural_size.height).abs() < 1e-3);
        assert!(layout.width > 10.0);
    }

    #[test]
    fn compute_layout_reports_bad_spacing() {
        let config = LayoutConfig {
            vertical_spacing: f32::NAN,
            ..fast_config()
        };
        let err = compute_layout(&sample_diagram(), &Theme::classic(), &config, Size::new(100.0, 100.0))
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidSpacing { name: "vertical spacing", .. }));
    }

    #[test]
    fn group_by_level_is_ascending_and_stable() {
        let mut tree: LayoutTree<Size> = LayoutTree::new();
        let deep = tree.insert(Size::ZERO, 2);
        let a = tree.insert(Size::ZERO, 0);
        let b = tree.insert(Size::ZERO, 0);
        let groups = group_by_level(&tree, &[deep, b, a]);
        let keys: Vec<usize> = groups.keys().copied().collect();
        assert_eq!(keys, vec![0, 2]);
        assert_eq!(groups[&0], vec![b, a]);
    }
}
