use crate::config::RenderConfig;
use crate::layout::{
    BoxStyle, Canvas, DiagramLayout, HierarchicalLayout, Point, Rect, Stroke, TextStyle,
};
use crate::theme::Theme;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

/// Accumulates SVG elements in drawing order.
#[derive(Debug, Default)]
pub struct SvgCanvas {
    body: String,
}

impl SvgCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

impl Canvas for SvgCanvas {
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        let _ = write!(
            self.body,
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\" stroke-linecap=\"square\"/>",
            from.x,
            from.y,
            to.x,
            to.y,
            escape_xml(&stroke.color),
            stroke.width
        );
    }

    fn draw_rect(&mut self, rect: Rect, style: &BoxStyle) {
        let radius = style.corner_radius.max(0.0);
        let _ = write!(
            self.body,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{radius}\" ry=\"{radius}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            rect.left,
            rect.top,
            rect.width().max(0.0),
            rect.height().max(0.0),
            escape_xml(&style.fill),
            escape_xml(&style.stroke.color),
            style.stroke.width
        );
    }

    fn draw_text(&mut self, center: Point, lines: &[String], style: &TextStyle) {
        let line_step = style.font_size * style.line_height;
        let total_height = lines.len() as f32 * line_step;
        // First baseline sits one font size below the top of the centred block.
        let start_y = center.y - total_height / 2.0 + style.font_size;
        let x = center.x;
        let _ = write!(
            self.body,
            "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
            escape_xml(&style.font_family),
            style.font_size,
            escape_xml(&style.color)
        );
        for (idx, line) in lines.iter().enumerate() {
            let dy = if idx == 0 { 0.0 } else { line_step };
            let _ = write!(
                self.body,
                "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
                escape_xml(line)
            );
        }
        self.body.push_str("</text>");
    }
}

pub fn render_svg(layout: &DiagramLayout, theme: &Theme) -> String {
    let width = layout.width;
    let height = layout.height;
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&theme.background)
    );

    let mut canvas = SvgCanvas::new();
    layout
        .engine
        .render(&layout.tree, &layout.roots, layout.bounds, &mut canvas);
    svg.push_str(canvas.body());
    svg.push_str("</svg>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .map(|name| name.trim().trim_matches('"').trim_matches('\''))
        .find(|name| !name.is_empty())
        .unwrap_or("sans-serif")
        .to_string();
    opt.fontdb_mut().load_system_fonts();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("failed to allocate a {}x{} pixmap", size.width(), size.height()))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(
    _svg: &str,
    _output: &Path,
    _render_cfg: &RenderConfig,
    _theme: &Theme,
) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
