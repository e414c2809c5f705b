use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{LayoutError, Link, Node, Result, SankeyGraph};

/// Id of the dummy node standing in for the link `source -> target` at
/// `segment`. `parallel` counts earlier links with the same endpoints, so
/// duplicate links get their own chains. Both ids are length-prefixed, which
/// keeps distinct inputs from ever formatting to the same string.
pub fn dummy_id(source: &str, target: &str, segment: usize, parallel: usize) -> String {
    let mut id = format!(
        "__dummy:{}:{source}->{}:{target}@{segment}",
        source.len(),
        target.len()
    );
    if parallel > 0 {
        id.push('#');
        id.push_str(&parallel.to_string());
    }
    id
}

/// Replaces every link that skips segments with a chain of adjacent hops
/// through dummy nodes. Shorter links are copied through untouched.
pub fn split_long_links(graph: &SankeyGraph) -> Result<SankeyGraph> {
    let layers = graph.layer_map();
    let mut taken: HashSet<String> = graph.nodes.iter().map(|node| node.id.clone()).collect();
    let mut nodes = graph.nodes.clone();
    let mut links = Vec::with_capacity(graph.links.len());
    let mut parallel_seen: HashMap<(&str, &str), usize> = HashMap::new();
    let mut split_count = 0usize;

    for link in &graph.links {
        let endpoint_segment = |id: &str| {
            layers.get(id).copied().ok_or_else(|| {
                LayoutError::validation(format!(
                    "link {} -> {} references unknown node `{id}`",
                    link.source, link.target
                ))
            })
        };
        let from = endpoint_segment(&link.source)?;
        let to = endpoint_segment(&link.target)?;

        let parallel = {
            let seen = parallel_seen
                .entry((link.source.as_str(), link.target.as_str()))
                .or_insert(0);
            let ordinal = *seen;
            *seen += 1;
            ordinal
        };

        if to <= from + 1 {
            links.push(link.clone());
            continue;
        }

        split_count += 1;
        let mut prev = link.source.clone();
        for segment in (from + 1)..to {
            let id = dummy_id(&link.source, &link.target, segment, parallel);
            if !taken.insert(id.clone()) {
                return Err(LayoutError::SplitCollision { id });
            }
            nodes.push(Node {
                id: id.clone(),
                label: None,
                segment,
                value: Some(link.value),
                dummy: true,
            });
            links.push(Link {
                source: prev,
                target: id.clone(),
                value: link.value,
                origin: link.origin,
                metadata: link.metadata.clone(),
            });
            prev = id;
        }
        links.push(Link {
            source: prev,
            target: link.target.clone(),
            value: link.value,
            origin: link.origin,
            metadata: link.metadata.clone(),
        });
    }

    debug!(
        split = split_count,
        dummies = nodes.len() - graph.nodes.len(),
        links = links.len(),
        "split long links"
    );

    Ok(SankeyGraph {
        segments: graph.segments.clone(),
        nodes,
        links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use std::collections::BTreeSet;

    fn node(id: &str, segment: usize) -> Node {
        Node {
            id: id.to_string(),
            label: None,
            segment,
            value: None,
            dummy: false,
        }
    }

    fn link(source: &str, target: &str, value: f64, origin: usize) -> Link {
        Link {
            source: source.to_string(),
            target: target.to_string(),
            value,
            origin,
            metadata: Map::new(),
        }
    }

    fn graph(segments: usize, nodes: Vec<Node>, links: Vec<Link>) -> SankeyGraph {
        SankeyGraph {
            segments: (0..segments).map(|idx| idx.to_string()).collect(),
            nodes,
            links,
        }
    }

    #[test]
    fn adjacent_links_pass_through() {
        let input = graph(
            2,
            vec![node("A", 0), node("B", 1)],
            vec![link("A", "B", 5.0, 0)],
        );
        let out = split_long_links(&input).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn splits_one_intermediate_segment_and_keeps_metadata() {
        let mut long = link("A", "B", 7.0, 0);
        long.metadata.insert("label".into(), Value::from("long"));
        let input = graph(3, vec![node("A", 0), node("B", 2)], vec![long]);
        let out = split_long_links(&input).unwrap();

        let dummies: Vec<&Node> = out.nodes.iter().filter(|n| n.dummy).collect();
        assert_eq!(dummies.len(), 1);
        assert_eq!(dummies[0].segment, 1);
        assert_eq!(dummies[0].value, Some(7.0));
        assert_eq!(out.links.len(), 2);
        assert!(out.links.iter().all(|l| l.value == 7.0 && l.origin == 0));
        assert!(
            out.links
                .iter()
                .all(|l| l.metadata.get("label") == Some(&Value::from("long")))
        );
        assert_eq!(out.links[0].source, "A");
        assert_eq!(out.links[0].target, dummies[0].id);
        assert_eq!(out.links[1].target, "B");
    }

    #[test]
    fn every_split_link_is_adjacent() {
        let input = graph(
            5,
            vec![node("A", 0), node("B", 1), node("C", 4), node("D", 3)],
            vec![
                link("A", "C", 2.0, 0),
                link("B", "D", 3.0, 1),
                link("A", "B", 1.0, 2),
            ],
        );
        let out = split_long_links(&input).unwrap();
        let layers = out.layer_map();
        for l in &out.links {
            assert_eq!(layers[&l.target], layers[&l.source] + 1, "{l:?}");
        }
        assert_eq!(out.dummy_count(), 3 + 1);
    }

    #[test]
    fn parallel_links_get_distinct_chains() {
        let input = graph(
            4,
            vec![node("L1", 0), node("FR1", 3)],
            vec![link("L1", "FR1", 8.0, 0), link("L1", "FR1", 2.0, 1)],
        );
        let out = split_long_links(&input).unwrap();
        let dummy_ids: BTreeSet<&str> = out
            .nodes
            .iter()
            .filter(|n| n.dummy)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(dummy_ids.len(), 4);
        assert_eq!(out.links.len(), 6);
    }

    #[test]
    fn splitting_is_repeatable() {
        let input = graph(
            4,
            vec![node("A", 0), node("B", 0), node("Z", 3)],
            vec![link("A", "Z", 1.0, 0), link("B", "Z", 2.0, 1)],
        );
        let first = split_long_links(&input).unwrap();
        let second = split_long_links(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ids_do_not_depend_on_link_order() {
        let forward = graph(
            3,
            vec![node("A", 0), node("B", 0), node("Z", 2)],
            vec![link("A", "Z", 1.0, 0), link("B", "Z", 2.0, 1)],
        );
        let mut reversed = forward.clone();
        reversed.links.reverse();
        let ids = |g: &SankeyGraph| -> BTreeSet<String> {
            split_long_links(g)
                .unwrap()
                .nodes
                .into_iter()
                .filter(|n| n.dummy)
                .map(|n| n.id)
                .collect()
        };
        assert_eq!(ids(&forward), ids(&reversed));
    }

    #[test]
    fn ids_are_unambiguous() {
        assert_ne!(dummy_id("a->b", "c", 1, 0), dummy_id("a", "b->c", 1, 0));
        assert_ne!(dummy_id("a", "b", 1, 1), dummy_id("a", "b", 1, 0));
        assert_eq!(dummy_id("a", "b", 2, 0), dummy_id("a", "b", 2, 0));
    }

    #[test]
    fn collision_with_user_node_is_reported() {
        let clash = dummy_id("A", "B", 1, 0);
        let input = graph(
            3,
            vec![node("A", 0), node("B", 2), node(&clash, 1)],
            vec![link("A", "B", 1.0, 0)],
        );
        let err = split_long_links(&input).unwrap_err();
        assert_eq!(err, LayoutError::SplitCollision { id: clash });
    }
}
