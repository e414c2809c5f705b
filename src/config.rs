use crate::layout::LayoutError;
use crate::theme::{Palette, Theme};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum OrderingStrategy {
    #[default]
    Barycenter,
    Median,
    Preserve,
}

impl OrderingStrategy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "barycenter" => Some(Self::Barycenter),
            "median" => Some(Self::Median),
            "preserve" | "none" => Some(Self::Preserve),
            _ => None,
        }
    }
}

/// How nodes without an explicit segment get one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum InferenceStrategy {
    #[default]
    TwoColumn,
    Topological,
}

impl InferenceStrategy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "two-column" | "two_column" | "twocolumn" => Some(Self::TwoColumn),
            "topological" | "topo" => Some(Self::Topological),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    #[default]
    PerSegment,
    PerItem,
}

impl ColorMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "per-segment" | "per_segment" | "segment" => Some(Self::PerSegment),
            "per-item" | "per_item" | "item" => Some(Self::PerItem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Node field holding the segment.
    pub segment_key: String,
    pub ordering: OrderingStrategy,
    pub inference: InferenceStrategy,
    pub iterations: usize,
    pub link_width_factor: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub node_width: f64,
    /// Vertical gap between stacked nodes of one segment.
    pub node_padding: f64,
    /// Center each node's ribbon stack vertically instead of top-aligning it.
    pub center_link_stacks: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            segment_key: "segment".to_string(),
            ordering: OrderingStrategy::Barycenter,
            inference: InferenceStrategy::TwoColumn,
            iterations: 4,
            link_width_factor: 1.0,
            canvas_width: 1000.0,
            canvas_height: 600.0,
            margin_top: 20.0,
            margin_right: 20.0,
            margin_bottom: 20.0,
            margin_left: 20.0,
            node_width: 20.0,
            node_padding: 8.0,
            center_link_stacks: true,
        }
    }
}

impl LayoutConfig {
    pub fn inner_width(&self) -> f64 {
        (self.canvas_width - self.margin_left - self.margin_right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.canvas_height - self.margin_top - self.margin_bottom).max(0.0)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.segment_key.trim().is_empty() {
            return Err(LayoutError::config("segmentKey must not be empty"));
        }
        if self.iterations == 0 {
            return Err(LayoutError::config("iterations must be a positive integer"));
        }
        if !(0.0..=1.0).contains(&self.link_width_factor) {
            return Err(LayoutError::config(format!(
                "link_width_factor must be within [0, 1], got {}",
                self.link_width_factor
            )));
        }
        let canvas_ok = self.canvas_width.is_finite()
            && self.canvas_height.is_finite()
            && self.canvas_width > 0.0
            && self.canvas_height > 0.0;
        if !canvas_ok {
            return Err(LayoutError::config(format!(
                "canvas must have a positive size, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        let spacing = [
            ("marginTop", self.margin_top),
            ("marginRight", self.margin_right),
            ("marginBottom", self.margin_bottom),
            ("marginLeft", self.margin_left),
            ("nodeWidth", self.node_width),
            ("nodePadding", self.node_padding),
        ];
        for (name, value) in spacing {
            if value < 0.0 || !value.is_finite() {
                return Err(LayoutError::config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub color_mode: ColorMode,
    pub palette: Palette,
    pub show_labels: bool,
    /// Drawn centered above the diagram when set.
    pub title: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::PerSegment,
            palette: Palette::category10(),
            show_labels: true,
            title: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f64>,
    text_color: Option<String>,
    background: Option<String>,
    node_stroke: Option<String>,
    link_opacity: Option<f64>,
    dummy_fill: Option<String>,
    dummy_stroke: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SankeyConfigFile {
    #[serde(alias = "segment_key")]
    segment_key: Option<String>,
    ordering: Option<String>,
    inference: Option<String>,
    iterations: Option<usize>,
    #[serde(alias = "link_width_factor")]
    link_width_factor: Option<f64>,
    #[serde(alias = "width")]
    canvas_width: Option<f64>,
    #[serde(alias = "height")]
    canvas_height: Option<f64>,
    margin: Option<f64>,
    margin_top: Option<f64>,
    margin_right: Option<f64>,
    margin_bottom: Option<f64>,
    margin_left: Option<f64>,
    node_width: Option<f64>,
    node_padding: Option<f64>,
    center_link_stacks: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaletteChoice {
    Named(String),
    Colors(Vec<String>),
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    color_mode: Option<String>,
    palette: Option<PaletteChoice>,
    dummy_color: Option<String>,
    show_labels: Option<bool>,
    title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    sankey: Option<SankeyConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("loading config file {}", path.display()))
}

/// Layers a JSON (or JSON5) config document over the defaults and checks
/// the result.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(err) => json5::from_str(contents).map_err(|_| err)?,
    };

    let mut config = Config::default();

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "classic" | "default" => config.theme = Theme::classic(),
            other => return Err(LayoutError::config(format!("unknown theme `{other}`")).into()),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.node_stroke {
            config.theme.node_stroke = v;
        }
        if let Some(v) = vars.link_opacity {
            config.theme.link_opacity = v;
        }
        if let Some(v) = vars.dummy_fill {
            config.theme.dummy_fill = v;
        }
        if let Some(v) = vars.dummy_stroke {
            config.theme.dummy_stroke = v;
        }
    }

    if let Some(sankey) = parsed.sankey {
        if let Some(v) = sankey.segment_key {
            config.layout.segment_key = v;
        }
        if let Some(v) = sankey.ordering {
            config.layout.ordering = OrderingStrategy::from_token(&v).ok_or_else(|| {
                LayoutError::config(format!(
                    "ordering must be one of barycenter, median, preserve; got `{v}`"
                ))
            })?;
        }
        if let Some(v) = sankey.inference {
            config.layout.inference = InferenceStrategy::from_token(&v).ok_or_else(|| {
                LayoutError::config(format!(
                    "inference must be one of two-column, topological; got `{v}`"
                ))
            })?;
        }
        if let Some(v) = sankey.iterations {
            config.layout.iterations = v;
        }
        if let Some(v) = sankey.link_width_factor {
            config.layout.link_width_factor = v;
        }
        if let Some(v) = sankey.canvas_width {
            config.layout.canvas_width = v;
        }
        if let Some(v) = sankey.canvas_height {
            config.layout.canvas_height = v;
        }
        if let Some(v) = sankey.margin {
            config.layout.margin_top = v;
            config.layout.margin_right = v;
            config.layout.margin_bottom = v;
            config.layout.margin_left = v;
        }
        if let Some(v) = sankey.margin_top {
            config.layout.margin_top = v;
        }
        if let Some(v) = sankey.margin_right {
            config.layout.margin_right = v;
        }
        if let Some(v) = sankey.margin_bottom {
            config.layout.margin_bottom = v;
        }
        if let Some(v) = sankey.margin_left {
            config.layout.margin_left = v;
        }
        if let Some(v) = sankey.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = sankey.node_padding {
            config.layout.node_padding = v;
        }
        if let Some(v) = sankey.center_link_stacks {
            config.layout.center_link_stacks = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.color_mode {
            config.render.color_mode = ColorMode::from_token(&v).ok_or_else(|| {
                LayoutError::config(format!(
                    "colorMode must be one of per-segment, per-item; got `{v}`"
                ))
            })?;
        }
        match render.palette {
            Some(PaletteChoice::Named(name)) => {
                config.render.palette = match name.as_str() {
                    "category10" => Palette::category10(),
                    "tableau10" => Palette::tableau10(),
                    other => {
                        return Err(
                            LayoutError::config(format!("unknown palette `{other}`")).into()
                        );
                    }
                };
            }
            Some(PaletteChoice::Colors(colors)) => {
                if colors.is_empty() {
                    return Err(LayoutError::config("palette must not be empty").into());
                }
                config.render.palette.colors = colors;
            }
            None => {}
        }
        if let Some(v) = render.dummy_color {
            config.render.palette.dummy = v;
        }
        if let Some(v) = render.show_labels {
            config.render.show_labels = v;
        }
        if let Some(v) = render.title {
            config.render.title = Some(v);
        }
    }

    config.layout.validate()?;

    Ok(config)
}
