use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f64,
    pub text_color: String,
    pub background: String,
    pub node_stroke: String,
    pub link_opacity: f64,
    pub dummy_fill: String,
    pub dummy_stroke: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 12.0,
            text_color: "#111111".to_string(),
            background: "#FFFFFF".to_string(),
            node_stroke: "#222222".to_string(),
            link_opacity: 0.95,
            dummy_fill: "#EFEFEF".to_string(),
            dummy_stroke: "#BBBBBB".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            text_color: "#1C2430".to_string(),
            background: "#FFFFFF".to_string(),
            node_stroke: "#C7D2E5".to_string(),
            link_opacity: 0.6,
            dummy_fill: "#F7FAFF".to_string(),
            dummy_stroke: "#D7E0F0".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

/// Colors handed to the renderer. Dummy nodes never draw from `colors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<String>,
    pub dummy: String,
}

impl Palette {
    pub fn category10() -> Self {
        Self::from_slice(&[
            "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
            "#7f7f7f", "#bcbd22", "#17becf",
        ])
    }

    pub fn tableau10() -> Self {
        Self::from_slice(&[
            "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1",
            "#ff9da7", "#9c755f", "#bab0ab",
        ])
    }

    fn from_slice(colors: &[&str]) -> Self {
        Self {
            colors: colors.iter().map(|c| c.to_string()).collect(),
            dummy: "#cccccc".to_string(),
        }
    }

    /// Color at `index`, cycling when the palette is shorter than the
    /// number of requests. An empty palette falls back to the dummy color.
    pub fn color(&self, index: usize) -> &str {
        if self.colors.is_empty() {
            return &self.dummy;
        }
        &self.colors[index % self.colors.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::category10()
    }
}
