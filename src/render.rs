use crate::config::{ColorMode, RenderConfig};
use crate::layout::{LinkLayout, NodeLayout, SankeyLayout};
use crate::theme::{Palette, Theme};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Horizontal pull of the ribbon control points, as a fraction of the gap.
const RIBBON_CURVATURE: f64 = 0.3;
const LABEL_GAP: f64 = 8.0;
const TITLE_SCALE: f64 = 1.5;

/// Draws the layout. A title, when set, gets a band above the diagram and
/// the canvas grows by that band.
pub fn render_svg(layout: &SankeyLayout, theme: &Theme, options: &RenderConfig) -> String {
    let mut svg = String::new();
    let palette = &options.palette;
    let title_band = match options.title {
        Some(_) => theme.font_size * TITLE_SCALE * 2.0,
        None => 0.0,
    };
    let width = layout.width;
    let height = layout.height + title_band;
    let colors = node_colors(layout, palette, options.color_mode);
    let color_of = |id: &str| fill_for(&colors, palette, id).to_string();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));

    svg.push_str("<defs>");
    for (idx, link) in layout.links.iter().enumerate() {
        svg.push_str(&format!(
            "<linearGradient id=\"sankey-grad-{idx}\" gradientUnits=\"userSpaceOnUse\" x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\"><stop offset=\"0%\" stop-color=\"{}\" stop-opacity=\"{}\"/><stop offset=\"100%\" stop-color=\"{}\" stop-opacity=\"{}\"/></linearGradient>",
            link.source_x,
            link.source_y,
            link.target_x,
            link.target_y,
            color_of(&link.source),
            theme.link_opacity,
            color_of(&link.target),
            theme.link_opacity,
        ));
    }
    svg.push_str("</defs>");

    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    if let Some(title) = options.title.as_deref() {
        svg.push_str(&title_svg(title, width, title_band, theme));
        svg.push_str(&format!("<g transform=\"translate(0,{title_band})\">"));
    }

    for (idx, link) in layout.links.iter().enumerate() {
        if link.width <= 0.0 {
            continue;
        }
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"url(#sankey-grad-{idx})\" stroke=\"none\"/>",
            ribbon_path(link)
        ));
    }

    let segment_count = layout.segments.len().max(layout.order.layers.len());
    for node in &layout.nodes {
        if node.dummy {
            svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-dasharray=\"2,2\"/>",
                node.x, node.y, node.width, node.height, theme.dummy_fill, theme.dummy_stroke
            ));
            continue;
        }
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"3\" fill=\"{}\" stroke=\"{}\" stroke-opacity=\"0.15\"/>",
            node.x,
            node.y,
            node.width,
            node.height,
            color_of(&node.id),
            theme.node_stroke
        ));
        if options.show_labels {
            // Labels of the last column face left, into the diagram.
            let on_left = segment_count > 1 && node.segment + 1 == segment_count;
            svg.push_str(&label_svg(node, theme, on_left));
        }
    }

    if options.title.is_some() {
        svg.push_str("</g>");
    }
    svg.push_str("</svg>");
    svg
}

/// Fill color per non-dummy node. Dummies are left out so they fall back to
/// the palette's dummy color and never consume a palette slot.
fn node_colors(
    layout: &SankeyLayout,
    palette: &Palette,
    color_mode: ColorMode,
) -> HashMap<String, String> {
    let real = layout.nodes.iter().filter(|node| !node.dummy);
    match color_mode {
        ColorMode::PerItem => real
            .enumerate()
            .map(|(idx, node)| {
                let color = palette.color(idx);
                (node.id.clone(), color.to_string())
            })
            .collect(),
        ColorMode::PerSegment => {
            let used: BTreeSet<usize> = layout.nodes.iter().map(|node| node.segment).collect();
            let slot: HashMap<usize, usize> = used
                .into_iter()
                .enumerate()
                .map(|(idx, segment)| (segment, idx))
                .collect();
            real.map(|node| {
                let idx = slot.get(&node.segment).copied().unwrap_or(0);
                (node.id.clone(), palette.color(idx).to_string())
            })
            .collect()
        }
    }
}

fn fill_for<'a>(colors: &'a HashMap<String, String>, palette: &'a Palette, id: &str) -> &'a str {
    colors
        .get(id)
        .map(String::as_str)
        .unwrap_or(palette.dummy.as_str())
}

/// Closed band: the top edge as a cubic from source to target, then the
/// bottom edge back.
fn ribbon_path(link: &LinkLayout) -> String {
    let start_x = link.source_x;
    let end_x = link.target_x;
    let s_top = link.source_y;
    let s_bot = link.source_y + link.width;
    let t_top = link.target_y;
    let t_bot = link.target_y + link.width;
    let dx = (end_x - start_x) * RIBBON_CURVATURE;
    let c1x = start_x + dx;
    let c2x = end_x - dx;
    format!(
        "M {start_x:.2},{s_top:.2} C {c1x:.2},{s_top:.2} {c2x:.2},{t_top:.2} {end_x:.2},{t_top:.2} L {end_x:.2},{t_bot:.2} C {c2x:.2},{t_bot:.2} {c1x:.2},{s_bot:.2} {start_x:.2},{s_bot:.2} Z"
    )
}

fn title_svg(title: &str, width: f64, band: f64, theme: &Theme) -> String {
    let size = theme.font_size * TITLE_SCALE;
    let x = width / 2.0;
    let y = band / 2.0 + size / 3.0;
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{size}\" font-weight=\"bold\" fill=\"{}\">{}</text>",
        theme.font_family,
        theme.text_color,
        escape_xml(title)
    )
}

fn label_svg(node: &NodeLayout, theme: &Theme, on_left: bool) -> String {
    let y = node.y + node.height / 2.0 + theme.font_size / 3.0;
    let (x, anchor) = if on_left {
        (node.x - LABEL_GAP, "end")
    } else {
        (node.x + node.width + LABEL_GAP, "start")
    };
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        theme.font_family,
        theme.font_size,
        theme.text_color,
        escape_xml(&node.label)
    )
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

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
