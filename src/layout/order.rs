use std::collections::HashMap;

use tracing::debug;

use crate::config::OrderingStrategy;

use super::{LayerGroups, Link, NodeOrder};

/// Sweeps left-to-right then right-to-left `iterations` times, re-sorting
/// each segment by where its neighbors sit in the segment just visited.
///
/// Sorting is stable, so equal scores keep their previous relative order.
/// Nodes with no neighbor in the reference segment keep their slot. The
/// first backward sweep stops before segment 0 so the seed order of the
/// leftmost column survives at least one full round.
pub fn order_nodes(
    groups: &LayerGroups,
    links: &[Link],
    strategy: OrderingStrategy,
    iterations: usize,
) -> NodeOrder {
    let mut layers = groups.layers.clone();
    if strategy == OrderingStrategy::Preserve || layers.len() <= 1 {
        return NodeOrder { layers };
    }

    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for link in links {
        outgoing
            .entry(link.source.as_str())
            .or_default()
            .push(link.target.as_str());
        incoming
            .entry(link.target.as_str())
            .or_default()
            .push(link.source.as_str());
    }

    // node id -> (segment, position)
    let mut positions: HashMap<String, (usize, usize)> = HashMap::new();
    let update_positions =
        |layers: &[Vec<String>], positions: &mut HashMap<String, (usize, usize)>| {
            positions.clear();
            for (segment, bucket) in layers.iter().enumerate() {
                for (idx, node_id) in bucket.iter().enumerate() {
                    positions.insert(node_id.clone(), (segment, idx));
                }
            }
        };
    update_positions(&layers, &mut positions);

    let last = layers.len() - 1;
    for pass in 0..iterations.max(1) {
        for segment in 1..=last {
            if layers[segment].len() <= 1 {
                continue;
            }
            sort_layer(
                &mut layers[segment],
                segment - 1,
                &incoming,
                &positions,
                strategy,
            );
            update_positions(&layers, &mut positions);
        }
        let lowest = if pass == 0 { 1 } else { 0 };
        for segment in (lowest..last).rev() {
            if layers[segment].len() <= 1 {
                continue;
            }
            sort_layer(
                &mut layers[segment],
                segment + 1,
                &outgoing,
                &positions,
                strategy,
            );
            update_positions(&layers, &mut positions);
        }
    }

    debug!(
        segments = layers.len(),
        iterations,
        ?strategy,
        "ordered segments"
    );
    NodeOrder { layers }
}

fn sort_layer(
    layer: &mut Vec<String>,
    reference: usize,
    neighbors: &HashMap<&str, Vec<&str>>,
    positions: &HashMap<String, (usize, usize)>,
    strategy: OrderingStrategy,
) {
    let mut slots = Vec::new();
    let mut scored: Vec<(usize, f64)> = Vec::new();
    for (idx, id) in layer.iter().enumerate() {
        if let Some(score) = neighbor_score(id, reference, neighbors, positions, strategy) {
            slots.push(idx);
            scored.push((idx, score));
        }
    }
    if scored.len() <= 1 {
        return;
    }
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut next = layer.clone();
    for (slot, (from, _)) in slots.iter().zip(&scored) {
        next[*slot] = layer[*from].clone();
    }
    *layer = next;
}

/// Barycenter or median of the node's neighbor positions in `reference`,
/// one entry per link. `None` when the node has no such neighbor.
pub(super) fn neighbor_score(
    node_id: &str,
    reference: usize,
    neighbors: &HashMap<&str, Vec<&str>>,
    positions: &HashMap<String, (usize, usize)>,
    strategy: OrderingStrategy,
) -> Option<f64> {
    let list = neighbors.get(node_id)?;
    let mut values: Vec<f64> = list
        .iter()
        .filter_map(|neighbor| positions.get(*neighbor))
        .filter(|(segment, _)| *segment == reference)
        .map(|(_, pos)| *pos as f64)
        .collect();
    if values.is_empty() {
        return None;
    }
    match strategy {
        OrderingStrategy::Median => {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = values.len() / 2;
            if values.len() % 2 == 1 {
                Some(values[mid])
            } else {
                Some((values[mid - 1] + values[mid]) * 0.5)
            }
        }
        _ => Some(values.iter().sum::<f64>() / values.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn link(source: &str, target: &str) -> Link {
        Link {
            source: source.to_string(),
            target: target.to_string(),
            value: 1.0,
            origin: 0,
            metadata: Map::new(),
        }
    }

    fn groups(layers: &[&[&str]]) -> LayerGroups {
        LayerGroups {
            layers: layers
                .iter()
                .map(|layer| layer.iter().map(|id| id.to_string()).collect())
                .collect(),
        }
    }

    fn ids(order: &NodeOrder, segment: usize) -> Vec<&str> {
        order.layers[segment].iter().map(String::as_str).collect()
    }

    #[test]
    fn uncrosses_a_simple_swap() {
        let g = groups(&[&["A", "B"], &["Y", "X"]]);
        let links = vec![link("A", "X"), link("B", "Y")];
        let order = order_nodes(&g, &links, OrderingStrategy::Barycenter, 1);
        assert_eq!(ids(&order, 0), vec!["A", "B"]);
        assert_eq!(ids(&order, 1), vec!["X", "Y"]);
    }

    #[test]
    fn ties_keep_prior_order() {
        let g = groups(&[&["A"], &["P", "Q", "R"]]);
        let links = vec![link("A", "P"), link("A", "Q"), link("A", "R")];
        let order = order_nodes(&g, &links, OrderingStrategy::Barycenter, 4);
        assert_eq!(ids(&order, 1), vec!["P", "Q", "R"]);
    }

    #[test]
    fn unconnected_nodes_keep_their_slot() {
        let g = groups(&[&["A", "B"], &["Y", "lonely", "X"]]);
        let links = vec![link("A", "X"), link("B", "Y")];
        let order = order_nodes(&g, &links, OrderingStrategy::Barycenter, 2);
        assert_eq!(ids(&order, 1), vec!["X", "lonely", "Y"]);
    }

    #[test]
    fn first_round_adapts_later_segments_to_segment_zero() {
        let g = groups(&[&["B", "A"], &["X", "Y"], &["P", "Q"]]);
        let links = vec![
            link("A", "X"),
            link("B", "Y"),
            link("X", "P"),
            link("Y", "Q"),
        ];
        let order = order_nodes(&g, &links, OrderingStrategy::Barycenter, 1);
        assert_eq!(ids(&order, 0), vec!["B", "A"]);
        assert_eq!(ids(&order, 1), vec!["Y", "X"]);
        assert_eq!(ids(&order, 2), vec!["Q", "P"]);
    }

    #[test]
    fn segment_zero_moves_from_the_second_round_on() {
        let g = groups(&[&["A", "B", "C"], &["X", "Y"]]);
        let links = vec![link("A", "Y"), link("B", "X"), link("C", "Y")];

        let one = order_nodes(&g, &links, OrderingStrategy::Barycenter, 1);
        assert_eq!(ids(&one, 0), vec!["A", "B", "C"]);
        assert_eq!(ids(&one, 1), vec!["X", "Y"]);

        // B feeds X at slot 0, A and C feed Y at slot 1.
        let two = order_nodes(&g, &links, OrderingStrategy::Barycenter, 2);
        assert_eq!(ids(&two, 0), vec!["B", "A", "C"]);
        assert_eq!(ids(&two, 1), vec!["X", "Y"]);
    }

    #[test]
    fn preserve_returns_seed_order() {
        let g = groups(&[&["A", "B"], &["Y", "X"]]);
        let links = vec![link("A", "X"), link("B", "Y")];
        let order = order_nodes(&g, &links, OrderingStrategy::Preserve, 4);
        assert_eq!(order.layers, g.layers);
    }

    #[test]
    fn median_ignores_outlier_neighbors() {
        let g = groups(&[&["A", "B", "C", "D"], &["M", "N"]]);
        // M: neighbors at 0, 3, 3 -> mean 2.0, median 3.0
        // N: neighbors at 1, 2 -> mean 1.5, median 1.5
        let links = vec![
            link("A", "M"),
            link("D", "M"),
            link("D", "M"),
            link("B", "N"),
            link("C", "N"),
        ];
        let bary = order_nodes(&g, &links, OrderingStrategy::Barycenter, 1);
        let median = order_nodes(&g, &links, OrderingStrategy::Median, 1);
        assert_eq!(ids(&bary, 1), vec!["N", "M"]);
        assert_eq!(ids(&median, 1), vec!["N", "M"]);

        let mut positions = HashMap::new();
        for (idx, id) in ["A", "B", "C", "D"].iter().enumerate() {
            positions.insert(id.to_string(), (0usize, idx));
        }
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        incoming.insert("M", vec!["A", "D", "D"]);
        assert_eq!(
            neighbor_score("M", 0, &incoming, &positions, OrderingStrategy::Barycenter),
            Some(2.0)
        );
        assert_eq!(
            neighbor_score("M", 0, &incoming, &positions, OrderingStrategy::Median),
            Some(3.0)
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let g = groups(&[&["A", "B", "C"], &["X", "Y", "Z"], &["P", "Q"]]);
        let links = vec![
            link("A", "Z"),
            link("B", "X"),
            link("C", "Y"),
            link("C", "X"),
            link("X", "Q"),
            link("Z", "P"),
            link("Y", "P"),
        ];
        let first = order_nodes(&g, &links, OrderingStrategy::Barycenter, 4);
        for _ in 0..5 {
            assert_eq!(
                order_nodes(&g, &links, OrderingStrategy::Barycenter, 4),
                first
            );
        }
    }
}
