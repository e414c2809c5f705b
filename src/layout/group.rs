use super::{LayerGroups, SankeyGraph};

/// Buckets node ids by segment, keeping input order inside each bucket.
pub fn group_by_segment(graph: &SankeyGraph) -> LayerGroups {
    let count = graph
        .nodes
        .iter()
        .map(|node| node.segment + 1)
        .max()
        .unwrap_or(0)
        .max(graph.segment_count());
    let mut layers: Vec<Vec<String>> = vec![Vec::new(); count];
    for node in &graph.nodes {
        layers[node.segment].push(node.id.clone());
    }
    LayerGroups { layers }
}
