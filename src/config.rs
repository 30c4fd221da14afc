use crate::theme::Theme;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between neighbouring subtrees on every level.
    pub horizontal_spacing: f32,
    /// Gap between rows; connectors turn halfway through it.
    pub vertical_spacing: f32,
    pub node_padding_x: f32,
    pub node_padding_y: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    pub fast_text_metrics: bool,
    /// Shrink the tree into the viewport instead of using its natural size.
    pub fit_to_viewport: bool,
    pub diagram_padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: 6.0,
            vertical_spacing: 6.0,
            node_padding_x: 10.0,
            node_padding_y: 6.0,
            label_line_height: 1.5,
            max_label_width_chars: 22,
            fast_text_metrics: false,
            fit_to_viewport: true,
            diagram_padding: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::classic(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    primary_color: Option<String>,
    primary_text_color: Option<String>,
    primary_border_color: Option<String>,
    line_color: Option<String>,
    line_width: Option<f32>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TreeConfigFile {
    horizontal_spacing: Option<f32>,
    vertical_spacing: Option<f32>,
    node_padding_x: Option<f32>,
    node_padding_y: Option<f32>,
    fit_to_viewport: Option<bool>,
    padding: Option<f32>,
    fast_text_metrics: Option<bool>,
    max_label_width_chars: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    tree: Option<TreeConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let parsed: ConfigFile = serde_json::from_str(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    apply_config_file(&mut config, parsed);
    Ok(config)
}

/// Merges an inline `%%{init: ...}%%` directive into `config`; same keys as the file.
pub fn merge_init_config(mut config: Config, init: serde_json::Value) -> Config {
    match serde_json::from_value::<ConfigFile>(init) {
        Ok(parsed) => apply_config_file(&mut config, parsed),
        Err(err) => warn!(%err, "ignoring malformed init directive"),
    }
    config
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme_name) = parsed.theme.as_deref() {
        match Theme::by_name(theme_name) {
            Some(theme) => config.theme = theme,
            None => warn!(theme = theme_name, "unknown theme, keeping current one"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.primary_color {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.primary_text_color {
            config.theme.node_text_color = v;
        }
        if let Some(v) = vars.primary_border_color {
            config.theme.node_border_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.line_width {
            config.theme.line_width = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(tree) = parsed.tree {
        if let Some(v) = tree.horizontal_spacing {
            config.layout.horizontal_spacing = v;
        }
        if let Some(v) = tree.vertical_spacing {
            config.layout.vertical_spacing = v;
        }
        if let Some(v) = tree.node_padding_x {
            config.layout.node_padding_x = v;
        }
        if let Some(v) = tree.node_padding_y {
            config.layout.node_padding_y = v;
        }
        if let Some(v) = tree.fit_to_viewport {
            config.layout.fit_to_viewport = v;
        }
        if let Some(v) = tree.padding {
            config.layout.diagram_padding = v;
        }
        if let Some(v) = tree.fast_text_metrics {
            config.layout.fast_text_metrics = v;
        }
        if let Some(v) = tree.max_label_width_chars {
            config.layout.max_label_width_chars = v;
        }
    }
}
