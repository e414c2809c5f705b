use std::collections::HashMap;

use tracing::debug;

use crate::config::LayoutConfig;

use super::{LinkLayout, NodeLayout, NodeOrder, NodeValues, SankeyGraph, SankeyLayout};

/// Places nodes column by column and sizes every ribbon.
///
/// Heights are scaled per segment, so each column fills the inner canvas
/// height on its own. A link's width is the mean of the width its source
/// would give it and the width its target would give it, which keeps
/// ribbons close to, but not exactly at, the node heights on both ends.
pub fn compute_positions(
    graph: &SankeyGraph,
    values: &NodeValues,
    order: &NodeOrder,
    config: &LayoutConfig,
) -> SankeyLayout {
    let segment_count = order.layers.len().max(graph.segment_count());
    let inner_width = config.inner_width();
    let inner_height = config.inner_height();
    let node_width = config.node_width;

    let segment_x = |segment: usize| -> f64 {
        if segment_count <= 1 {
            config.margin_left + (inner_width - node_width) / 2.0
        } else {
            config.margin_left
                + segment as f64 * (inner_width - node_width) / (segment_count - 1) as f64
        }
    };

    // node id -> (y, height, position in segment)
    let mut placed: HashMap<&str, (f64, f64, usize)> = HashMap::new();
    for layer in &order.layers {
        let total: f64 = layer
            .iter()
            .map(|id| values.get(id).copied().unwrap_or(0.0))
            .sum();
        let gaps = layer.len().saturating_sub(1) as f64 * config.node_padding;
        let available = (inner_height - gaps).max(0.0);
        let scale = if total > 0.0 { available / total } else { 0.0 };

        let mut cursor = config.margin_top;
        for (idx, id) in layer.iter().enumerate() {
            let height = values.get(id).copied().unwrap_or(0.0) * scale;
            placed.insert(id.as_str(), (cursor, height, idx));
            cursor += height + config.node_padding;
        }
    }

    let mut nodes = Vec::with_capacity(graph.nodes.len());
    let mut node_index: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        let (y, height, position) = placed
            .get(node.id.as_str())
            .copied()
            .unwrap_or((config.margin_top, 0.0, 0));
        node_index.insert(node.id.as_str(), nodes.len());
        nodes.push(NodeLayout {
            id: node.id.clone(),
            label: node.display_label().to_string(),
            segment: node.segment,
            order: position,
            value: values.get(&node.id).copied().unwrap_or(0.0),
            dummy: node.dummy,
            x: segment_x(node.segment),
            y,
            width: node_width,
            height,
        });
    }

    let link_width: Vec<f64> = graph
        .links
        .iter()
        .map(|link| {
            let side = |id: &str| -> f64 {
                let Some(node) = node_index.get(id).map(|idx| &nodes[*idx]) else {
                    return 0.0;
                };
                if node.value > 0.0 {
                    link.value * config.link_width_factor * node.height / node.value
                } else {
                    0.0
                }
            };
            (side(&link.source) + side(&link.target)) / 2.0
        })
        .collect();

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (link_idx, link) in graph.links.iter().enumerate() {
        if let Some(&from) = node_index.get(link.source.as_str()) {
            outgoing[from].push(link_idx);
        }
        if let Some(&to) = node_index.get(link.target.as_str()) {
            incoming[to].push(link_idx);
        }
    }

    let position_of = |id: &str| {
        node_index
            .get(id)
            .map(|idx| nodes[*idx].order)
            .unwrap_or(usize::MAX)
    };
    for links in &mut outgoing {
        links.sort_by(|a, b| {
            position_of(&graph.links[*a].target)
                .cmp(&position_of(&graph.links[*b].target))
                .then_with(|| a.cmp(b))
        });
    }
    for links in &mut incoming {
        links.sort_by(|a, b| {
            position_of(&graph.links[*a].source)
                .cmp(&position_of(&graph.links[*b].source))
                .then_with(|| a.cmp(b))
        });
    }

    let source_tops = stack_offsets(&nodes, &outgoing, &link_width, config.center_link_stacks);
    let target_tops = stack_offsets(&nodes, &incoming, &link_width, config.center_link_stacks);

    let mut links = Vec::with_capacity(graph.links.len());
    for (link_idx, link) in graph.links.iter().enumerate() {
        let (Some(&from), Some(&to)) = (
            node_index.get(link.source.as_str()),
            node_index.get(link.target.as_str()),
        ) else {
            continue;
        };
        links.push(LinkLayout {
            source: link.source.clone(),
            target: link.target.clone(),
            value: link.value,
            origin: link.origin,
            width: link_width[link_idx],
            source_x: nodes[from].x + nodes[from].width,
            source_y: source_tops[link_idx],
            target_x: nodes[to].x,
            target_y: target_tops[link_idx],
            metadata: link.metadata.clone(),
        });
    }

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        segments = segment_count,
        "computed positions"
    );

    SankeyLayout {
        width: config.canvas_width,
        height: config.canvas_height,
        node_width,
        segments: graph.segments.clone(),
        order: order.clone(),
        nodes,
        links,
    }
}

/// Top edge of every link where it touches the node owning `stacks`.
/// Each node's links are laid edge to edge in the given order.
fn stack_offsets(
    nodes: &[NodeLayout],
    stacks: &[Vec<usize>],
    link_width: &[f64],
    centered: bool,
) -> Vec<f64> {
    let mut tops = vec![0.0; link_width.len()];
    for (node, links) in nodes.iter().zip(stacks) {
        let total: f64 = links.iter().map(|idx| link_width[*idx]).sum();
        let mut acc = if centered {
            node.y + (node.height - total) / 2.0
        } else {
            node.y
        };
        for &link_idx in links {
            tops[link_idx] = acc;
            acc += link_width[link_idx];
        }
    }
    tops
}
