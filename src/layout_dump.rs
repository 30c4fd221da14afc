use crate::layout::{DiagramLayout, collect_connectors};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub natural_width: f32,
    pub natural_height: f32,
    pub horizontal_spacing: f32,
    pub vertical_spacing: f32,
    pub level_heights: Vec<LevelDump>,
    pub nodes: Vec<NodeDump>,
    pub connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Serialize)]
pub struct LevelDump {
    pub level: usize,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub level: usize,
    pub parent: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub desired_width: f32,
    pub desired_height: f32,
    pub label_lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub from: String,
    pub to: String,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(layout: &DiagramLayout) -> Self {
        let tree = &layout.tree;
        let node_id = |id| tree.element(id).id.clone();

        let nodes = tree
            .ids()
            .map(|id| {
                let bounds = tree.bounds(id);
                let desired = tree.desired_size(id);
                let element = tree.element(id);
                NodeDump {
                    id: element.id.clone(),
                    label: element.text.clone(),
                    level: tree.level(id),
                    parent: tree.parent(id).map(node_id),
                    x: bounds.left,
                    y: bounds.top,
                    width: bounds.width(),
                    height: bounds.height(),
                    desired_width: desired.width,
                    desired_height: desired.height,
                    label_lines: element.block.lines.clone(),
                }
            })
            .collect();

        let connectors = collect_connectors(tree, &layout.roots, layout.engine.vertical_spacing())
            .into_iter()
            .map(|connector| {
                let mut points = vec![[connector.segments[0].0.x, connector.segments[0].0.y]];
                points.extend(connector.segments.iter().map(|(_, to)| [to.x, to.y]));
                ConnectorDump {
                    from: node_id(connector.parent),
                    to: node_id(connector.child),
                    points,
                }
            })
            .collect();

        let level_heights = layout
            .engine
            .level_heights()
            .iter()
            .map(|(level, height)| LevelDump { level, height })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            natural_width: layout.natural_size.width,
            natural_height: layout.natural_size.height,
            horizontal_spacing: layout.engine.horizontal_spacing(),
            vertical_spacing: layout.engine.vertical_spacing(),
            level_heights,
            nodes,
            connectors,
        }
    }
}

pub fn write_layout_dump(output: Option<&Path>, layout: &DiagramLayout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => println!("{}", serde_json::to_string_pretty(&dump)?),
    }
    Ok(())
}
