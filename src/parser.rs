use crate::ir::{Diagram, ParseOutput};
use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^tree\s*$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<id>[^\s\[\]()"]+)(?:\[(?P<square>.*)\]|\((?P<round>.*)\))$"#).unwrap()
});

/// Parses either an indented outline or a JSON tree, picked by the first character.
pub fn parse_tree(input: &str) -> Result<ParseOutput> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_json_tree(trimmed);
    }
    parse_outline(input)
}

pub fn parse_outline(input: &str) -> Result<ParseOutput> {
    let (lines, init_config) = preprocess_input(input);
    let mut diagram = Diagram::new();
    let mut ids = IdAllocator::default();
    // (indent, node index) for the current chain of ancestors.
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for (line_no, raw_line) in lines.iter().enumerate() {
        let trimmed = raw_line.trim();
        if line_no == 0 && HEADER_RE.is_match(trimmed) {
            continue;
        }

        let indent = count_indent(raw_line);
        while stack.last().is_some_and(|&(level_indent, _)| level_indent >= indent) {
            stack.pop();
        }
        let parent = stack.last().map(|&(_, idx)| idx);

        let (raw_id, label) = parse_node_token(trimmed);
        let id = ids.allocate(raw_id.as_deref(), &label, diagram.len());
        let idx = diagram.push(id, label, parent);
        stack.push((indent, idx));
    }

    if diagram.is_empty() {
        return Err(anyhow!("no tree nodes found in input"));
    }
    Ok(ParseOutput {
        diagram,
        init_config,
    })
}

#[derive(Debug, Deserialize)]
struct JsonNode {
    id: Option<String>,
    label: Option<String>,
    #[serde(default)]
    children: Vec<JsonNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonTree {
    Forest(Vec<JsonNode>),
    Single(JsonNode),
}

pub fn parse_json_tree(input: &str) -> Result<ParseOutput> {
    let parsed: JsonTree = serde_json::from_str(input).context("invalid JSON tree")?;
    let roots = match parsed {
        JsonTree::Forest(nodes) => nodes,
        JsonTree::Single(node) => vec![node],
    };

    let mut diagram = Diagram::new();
    let mut ids = IdAllocator::default();
    let mut stack: Vec<(JsonNode, Option<usize>)> =
        roots.into_iter().rev().map(|node| (node, None)).collect();
    while let Some((node, parent)) = stack.pop() {
        let label = node
            .label
            .clone()
            .or_else(|| node.id.clone())
            .unwrap_or_default();
        let id = ids.allocate(node.id.as_deref(), &label, diagram.len());
        let idx = diagram.push(id, label, parent);
        stack.extend(node.children.into_iter().rev().map(|child| (child, Some(idx))));
    }

    if diagram.is_empty() {
        return Err(anyhow!("no tree nodes found in input"));
    }
    Ok(ParseOutput {
        diagram,
        init_config: None,
    })
}

#[derive(Debug, Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn allocate(&mut self, explicit: Option<&str>, label: &str, position: usize) -> String {
        let mut base = explicit
            .map(str::to_string)
            .unwrap_or_else(|| sanitize_id(label));
        if base.is_empty() {
            base = format!("node_{}", position);
        }
        let mut id = base.clone();
        let mut suffix = 2;
        while self.used.contains(&id) {
            id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.used.insert(id.clone());
        id
    }
}

fn preprocess_input(input: &str) -> (Vec<String>, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut lines = Vec::new();

    for raw_line in input.lines() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        let without_comment = strip_trailing_comment(raw_line);
        if without_comment.trim().is_empty() {
            continue;
        }
        lines.push(without_comment);
    }

    (lines, init_config)
}

/// Splits `id[Label]`, `id(Label)`, `"Label"` or a bare label into (id, label).
fn parse_node_token(token: &str) -> (Option<String>, String) {
    if let Some(caps) = NODE_RE.captures(token) {
        let id = caps["id"].to_string();
        let label = caps
            .name("square")
            .or_else(|| caps.name("round"))
            .map(|m| unquote(m.as_str().trim()))
            .unwrap_or_default();
        return (Some(id), label);
    }
    (None, unquote(token))
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return text[1..text.len() - 1].to_string();
    }
    text.to_string()
}

fn strip_trailing_comment(line: &str) -> String {
    let mut in_quote = false;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            in_quote = !in_quote;
        } else if !in_quote
            && ch == '%'
            && let Some('%') = chars.peek().copied()
        {
            break;
        }
        out.push(ch);
    }
    out.trim_end().to_string()
}

fn count_indent(line: &str) -> usize {
    let mut count = 0;
    for ch in line.chars() {
        match ch {
            ' ' => count += 1,
            '\t' => count += 4,
            _ => break,
        }
    }
    count
}

fn sanitize_id(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
