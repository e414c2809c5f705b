use std::collections::BTreeMap;

use tracing::debug;

use super::{NodeValues, SankeyGraph};

/// A node is as large as the biggest of its explicit value, its inflow and
/// its outflow. Unconnected nodes without a value come out as 0.
pub fn compute_node_values(graph: &SankeyGraph) -> NodeValues {
    let mut inflow: BTreeMap<&str, f64> = BTreeMap::new();
    let mut outflow: BTreeMap<&str, f64> = BTreeMap::new();
    for link in &graph.links {
        *outflow.entry(link.source.as_str()).or_default() += link.value;
        *inflow.entry(link.target.as_str()).or_default() += link.value;
    }

    let values: NodeValues = graph
        .nodes
        .iter()
        .map(|node| {
            let id = node.id.as_str();
            let through = inflow
                .get(id)
                .copied()
                .unwrap_or(0.0)
                .max(outflow.get(id).copied().unwrap_or(0.0));
            (node.id.clone(), through.max(node.value.unwrap_or(0.0)))
        })
        .collect();

    debug!(
        nodes = values.len(),
        total = values.values().sum::<f64>(),
        "computed node values"
    );
    values
}
