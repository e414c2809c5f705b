use crate::config::{ColorMode, Config, InferenceStrategy, OrderingStrategy, load_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::{ParsedInput, parse_input, validate_flows};
use crate::render::{render_svg, write_output_svg};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "sankey",
    version,
    about = "Layered Sankey layout and SVG renderer"
)]
pub struct Args {
    /// Input file (JSON or Left/Right text) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output SVG file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write the computed layout as JSON
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    #[arg(long = "ordering", value_enum)]
    pub ordering: Option<OrderingStrategy>,

    #[arg(long = "inference", value_enum)]
    pub inference: Option<InferenceStrategy>,

    /// Ordering sweep rounds
    #[arg(long = "iterations")]
    pub iterations: Option<usize>,

    /// Fraction of node height the ribbons of a node add up to (0..1)
    #[arg(long = "link-width-factor")]
    pub link_width_factor: Option<f64>,

    #[arg(long = "color-mode", value_enum)]
    pub color_mode: Option<ColorMode>,

    /// Skip the left-node flow total check
    #[arg(long = "no-validate")]
    pub no_validate: bool,

    /// Canvas width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Canvas height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let base_config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let parsed = parse_input(&input)?;
    let config = apply_overrides(base_config, &args, &parsed);

    if !args.no_validate {
        if let Some(flows) = &parsed.flows {
            for mismatch in validate_flows(flows) {
                warn!("{mismatch}");
            }
        }
    }

    let layout = compute_layout(&parsed.graph, &config.layout)?;
    info!(
        nodes = layout.nodes.len(),
        links = layout.links.len(),
        "layout computed"
    );

    if let Some(path) = args.dump.as_deref() {
        write_layout_dump(path, &layout, parsed.title.as_deref())
            .with_context(|| format!("failed to write layout dump {}", path.display()))?;
    }

    let svg = render_svg(&layout, &config.theme, &config.render);
    write_output_svg(&svg, args.output.as_deref())?;
    Ok(())
}

/// Layers input metadata and then command line flags over the loaded
/// config.
fn apply_overrides(mut config: Config, args: &Args, parsed: &ParsedInput) -> Config {
    if let Some(height) = parsed.height.filter(|h| *h > 0.0) {
        config.layout.canvas_height = height;
    }
    if let Some(size) = parsed.font_size.filter(|s| *s > 0.0) {
        config.theme.font_size = size;
    }
    if let Some(title) = &parsed.title {
        config.render.title = Some(title.clone());
    }
    if let Some(ordering) = args.ordering {
        config.layout.ordering = ordering;
    }
    if let Some(inference) = args.inference {
        config.layout.inference = inference;
    }
    if let Some(iterations) = args.iterations {
        config.layout.iterations = iterations;
    }
    if let Some(factor) = args.link_width_factor {
        config.layout.link_width_factor = factor;
    }
    if let Some(mode) = args.color_mode {
        config.render.color_mode = mode;
    }
    if let Some(width) = args.width {
        config.layout.canvas_width = width;
    }
    if let Some(height) = args.height {
        config.layout.canvas_height = height;
    }
    config
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read input {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
