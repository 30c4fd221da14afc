use crate::config::LayoutConfig;
use crate::text_metrics;
use crate::theme::Theme;

use super::connectors::{BoxStyle, Canvas, Stroke, TextStyle};
use super::{Element, Point, Rect, Size};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct LabelMetrics {
    font_size: f32,
    font_family: String,
    line_height: f32,
    max_width_chars: usize,
    fast_metrics: bool,
    padding_x: f32,
    padding_y: f32,
}

/// A boxed, possibly multi-line text label: the node type diagrams are built from.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelElement {
    pub id: String,
    pub text: String,
    pub block: TextBlock,
    pub bounds: Rect,
    metrics: LabelMetrics,
    box_style: BoxStyle,
    text_style: TextStyle,
}

impl LabelElement {
    pub fn new(id: &str, text: &str, theme: &Theme, config: &LayoutConfig) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            block: TextBlock::default(),
            bounds: Rect::default(),
            metrics: LabelMetrics {
                font_size: theme.font_size,
                font_family: theme.font_family.clone(),
                line_height: config.label_line_height,
                max_width_chars: config.max_label_width_chars,
                fast_metrics: config.fast_text_metrics,
                padding_x: config.node_padding_x.max(0.0),
                padding_y: config.node_padding_y.max(0.0),
            },
            box_style: BoxStyle {
                fill: theme.node_fill.clone(),
                stroke: Stroke::new(theme.node_border_color.clone(), theme.node_border_width),
                corner_radius: theme.node_corner_radius,
            },
            text_style: TextStyle {
                font_family: theme.font_family.clone(),
                font_size: theme.font_size,
                color: theme.node_text_color.clone(),
                line_height: config.label_line_height,
            },
        }
    }
}

impl Element for LabelElement {
    fn measure(&mut self, available: Size) -> Size {
        let metrics = &self.metrics;
        let mut max_width = max_label_width_px(
            metrics.max_width_chars,
            metrics.font_size,
            &metrics.font_family,
            metrics.fast_metrics,
        );
        // The host's available width caps wrapping too, but never below one glyph.
        let room = available.width - metrics.padding_x * 2.0;
        if room.is_finite() {
            max_width = max_width.min(room.max(metrics.font_size));
        }
        self.block = measure_block(
            &self.text,
            metrics.font_size,
            &metrics.font_family,
            metrics.line_height,
            max_width,
            metrics.fast_metrics,
        );
        Size::new(
            self.block.width + metrics.padding_x * 2.0,
            self.block.height + metrics.padding_y * 2.0,
        )
    }

    fn arrange(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn render(&self, bounds: Rect, canvas: &mut dyn Canvas) {
        canvas.draw_rect(bounds, &self.box_style);
        canvas.draw_text(
            Point::new(bounds.mid_x(), bounds.mid_y()),
            &self.block.lines,
            &self.text_style,
        );
    }
}

fn measure_block(
    text: &str,
    font_size: f32,
    font_family: &str,
    line_height: f32,
    max_width_px: f32,
    fast_metrics: bool,
) -> TextBlock {
    let mut lines = Vec::new();
    for line in split_lines(text) {
        lines.extend(wrap_line(&line, max_width_px, font_size, font_family, fast_metrics));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    let width = lines
        .iter()
        .map(|line| text_width(line, font_size, font_family, fast_metrics))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * font_size * line_height;

    TextBlock {
        lines,
        width,
        height,
    }
}

fn char_width_factor(ch: char) -> f32 {
    // Per-character advances of a typical sans-serif face at 1px.
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'I' | 'i' | 'j' | 'l' => 0.24,
        'f' | 't' | 'r' => 0.34,
        'M' | 'W' | 'm' | 'w' => 0.86,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '0'..='9' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        _ => 0.568,
    }
}

fn split_lines(text: &str) -> Vec<String> {
    let normalized = text
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("\\n", "\n");
    normalized
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

fn wrap_line(
    line: &str,
    max_width: f32,
    font_size: f32,
    font_family: &str,
    fast_metrics: bool,
) -> Vec<String> {
    if text_width(line, font_size, font_family, fast_metrics) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font_size, font_family, fast_metrics) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn text_width(text: &str, font_size: f32, font_family: &str, fast_metrics: bool) -> f32 {
    if fast_metrics && text.is_ascii() {
        return fallback_text_width(text, font_size);
    }
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

fn max_label_width_px(max_chars: usize, font_size: f32, font_family: &str, fast_metrics: bool) -> f32 {
    let avg_char = if fast_metrics {
        font_size * 0.56
    } else {
        text_metrics::average_char_width(font_family, font_size).unwrap_or(font_size * 0.56)
    };
    (max_chars.max(1) as f32) * avg_char
}
