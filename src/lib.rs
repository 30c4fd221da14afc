#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RenderConfig};
pub use layout::{
    Element, HierarchicalLayout, HierarchicalTree, LayoutError, LayoutTree, LevelHeightTable,
    NodeId, Rect, Size, compute_layout,
};
pub use theme::Theme;

/// Parses `input` and renders it to an SVG string with the default configuration.
pub fn render_tree(input: &str) -> anyhow::Result<String> {
    render_with_options(input, &Config::default())
}

pub fn render_with_options(input: &str, config: &Config) -> anyhow::Result<String> {
    let parsed = parser::parse_tree(input)?;
    let config = match parsed.init_config {
        Some(init) => config::merge_init_config(config.clone(), init),
        None => config.clone(),
    };
    let viewport = Size::new(config.render.width, config.render.height);
    let layout = compute_layout(&parsed.diagram, &config.theme, &config.layout, viewport)?;
    Ok(render::render_svg(&layout, &config.theme))
}
