use super::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("node {0} does not belong to this tree")]
    UnknownNode(NodeId),
    #[error("node {child} has two parents: {first} and {second}")]
    DuplicateParent {
        child: NodeId,
        first: NodeId,
        second: NodeId,
    },
    #[error("node {child} sits at level {found} under {parent}, expected level {expected}")]
    LevelMismatch {
        parent: NodeId,
        child: NodeId,
        expected: usize,
        found: usize,
    },
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidSpacing { name: &'static str, value: f32 },
    #[error("arrange called before measure")]
    NotMeasured,
}
