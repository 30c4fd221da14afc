/// One labelled node of a parsed tree. `children` index into [`Diagram::nodes`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub level: usize,
    pub children: Vec<usize>,
}

/// A forest in document order; every node appears after its parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagram {
    pub nodes: Vec<DiagramNode>,
    pub roots: Vec<usize>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node under `parent` (or as a root) and returns its index.
    pub fn push(&mut self, id: String, label: String, parent: Option<usize>) -> usize {
        let level = parent.map(|p| self.nodes[p].level + 1).unwrap_or(0);
        let idx = self.nodes.len();
        self.nodes.push(DiagramNode {
            id,
            label,
            level,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        idx
    }

    pub fn find(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| node.level + 1)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub diagram: Diagram,
    pub init_config: Option<serde_json::Value>,
}
