use std::path::Path;

use tree_diagram_renderer::config::{Config, merge_init_config};
use tree_diagram_renderer::layout::{DiagramLayout, Rect, Size, compute_layout};
use tree_diagram_renderer::layout_dump::LayoutDump;
use tree_diagram_renderer::parser::parse_tree;
use tree_diagram_renderer::render::render_svg;
use tree_diagram_renderer::{Theme, render_tree};

const FIXTURES: [&str; 7] = [
    "deep_chain.tree",
    "forest.tree",
    "init_directive.tree",
    "org_chart.tree",
    "taxonomy.json",
    "unicode.tree",
    "wide_parent.tree",
];

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.contains("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.contains("</svg>"), "{fixture}: missing </svg tag");
}

fn layout_fixture(name: &str) -> (DiagramLayout, Config) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    let parsed = parse_tree(&input).expect("parse failed");
    let mut config = Config::default();
    config.layout.fast_text_metrics = true;
    if let Some(init) = parsed.init_config {
        config = merge_init_config(config, init);
    }
    let viewport = Size::new(config.render.width, config.render.height);
    let layout = compute_layout(&parsed.diagram, &config.theme, &config.layout, viewport)
        .expect("layout failed");
    (layout, config)
}

fn all_rects(layout: &DiagramLayout) -> Vec<(usize, Rect)> {
    layout
        .tree
        .ids()
        .map(|id| (layout.tree.level(id), layout.tree.bounds(id)))
        .collect()
}

#[test]
fn render_all_fixtures() {
    for name in FIXTURES {
        let (layout, config) = layout_fixture(name);
        let svg = render_svg(&layout, &config.theme);
        assert_valid_svg(&svg, name);

        let nodes = layout.tree.len();
        let edges = nodes - layout.roots.len();
        assert_eq!(svg.matches("<rect").count(), nodes + 1, "{name}: node boxes");
        assert_eq!(svg.matches("<line").count(), edges * 3, "{name}: connector segments");
    }
}

#[test]
fn fixtures_stay_inside_the_canvas_without_overlap() {
    for name in FIXTURES {
        let (layout, _) = layout_fixture(name);
        let rects = all_rects(&layout);
        for (_, rect) in &rects {
            assert!(rect.left >= 0.0 && rect.top >= 0.0, "{name}: {rect:?} off canvas");
            assert!(rect.right <= layout.width && rect.bottom <= layout.height, "{name}: {rect:?}");
        }
        for (idx, (level, a)) in rects.iter().enumerate() {
            for (other_level, b) in &rects[idx + 1..] {
                if level != other_level {
                    continue;
                }
                let disjoint = a.right <= b.left + 1e-3 || b.right <= a.left + 1e-3;
                assert!(disjoint, "{name}: {a:?} overlaps {b:?}");
            }
        }
    }
}

#[test]
fn init_directive_changes_theme_and_spacing() {
    let (layout, config) = layout_fixture("init_directive.tree");
    assert_eq!(config.theme, Theme::modern());
    assert_eq!(layout.engine.horizontal_spacing(), 24.0);
    assert_eq!(layout.engine.vertical_spacing(), 30.0);

    let release = layout
        .tree
        .ids()
        .find(|&id| layout.tree.element(id).id == "release")
        .expect("release node");
    assert_eq!(layout.tree.element(release).block.lines, vec!["Release", "Train"]);
}

#[test]
fn wide_parent_does_not_overlap_its_sibling() {
    let (layout, _) = layout_fixture("wide_parent.tree");
    let find = |id: &str| {
        layout
            .tree
            .ids()
            .find(|&node| layout.tree.element(node).id == id)
            .map(|node| layout.tree.bounds(node))
            .expect("node present")
    };
    let root = find("root");
    let sibling = find("sibling");
    assert!(root.right <= sibling.left);
    let (a, b) = (find("a"), find("b"));
    assert!(((a.left + b.right) / 2.0 - root.mid_x()).abs() < 1e-2);
}

#[test]
fn dump_matches_rendered_layout() {
    let (layout, _) = layout_fixture("taxonomy.json");
    let dump = LayoutDump::from_layout(&layout);
    assert_eq!(dump.nodes.len(), 8);
    assert_eq!(dump.connectors.len(), 7);
    assert_eq!(dump.level_heights.len(), 4);
    let json = serde_json::to_string(&dump).expect("serialize");
    assert!(json.contains("\"Carnivora\""));
}

#[test]
fn render_tree_uses_defaults() {
    let svg = render_tree("tree\n  a[Alpha]\n    b[Beta]").expect("render failed");
    assert_valid_svg(&svg, "inline");
    assert!(svg.contains("Alpha") && svg.contains("Beta"));
    assert!(render_tree("tree\n").is_err());
}
