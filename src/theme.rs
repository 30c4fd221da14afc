use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_text_color: String,
    pub node_border_color: String,
    pub node_border_width: f32,
    pub node_corner_radius: f32,
    pub line_color: String,
    pub line_width: f32,
    pub background: String,
}

impl Theme {
    /// Plain boxes joined by thin black connectors.
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            node_fill: "#ECECFF".to_string(),
            node_text_color: "#333333".to_string(),
            node_border_color: "#9370DB".to_string(),
            node_border_width: 1.0,
            node_corner_radius: 0.0,
            line_color: "#000000".to_string(),
            line_width: 1.0,
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#F8FAFF".to_string(),
            node_text_color: "#1C2430".to_string(),
            node_border_color: "#C7D2E5".to_string(),
            node_border_width: 1.2,
            node_corner_radius: 6.0,
            line_color: "#7A8AA6".to_string(),
            line_width: 1.4,
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "classic" | "default" | "base" => Some(Self::classic()),
            "modern" => Some(Self::modern()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
