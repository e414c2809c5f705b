use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use tracing::debug;

use crate::config::{InferenceStrategy, LayoutConfig};
use crate::ir::{LegacyColumn, LegacyInput, RawGraph, RawNode, SankeyInput, SegmentRef};

use super::{LayoutError, Link, Node, Result, SankeyGraph};

const LEGACY_SEGMENTS: [&str; 2] = ["left", "right"];

/// What a segment resolver sees: node ids in input order, links as node
/// index pairs, and the segments already known.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProblem<'a> {
    pub ids: &'a [String],
    pub links: &'a [(usize, usize)],
    pub explicit: &'a [Option<usize>],
    /// Length of the declared segment list, if one was given.
    pub declared_segments: Option<usize>,
}

impl SegmentProblem<'_> {
    fn missing_ids(&self) -> Vec<String> {
        self.ids
            .iter()
            .zip(self.explicit)
            .filter(|(_, seg)| seg.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Fills in segments for nodes that have none. Implementations return one
/// segment per node and must keep every explicit segment as given.
pub trait SegmentResolver {
    fn resolve(&self, problem: &SegmentProblem<'_>) -> Result<Vec<usize>>;

    /// Names for the inferred segments when the input declared none and no
    /// node carried a segment of its own.
    fn segment_names(&self, _count: usize) -> Option<Vec<String>> {
        None
    }
}

/// Source-only nodes go left, target-only nodes go right. Anything else is
/// left to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoColumnResolver;

impl SegmentResolver for TwoColumnResolver {
    fn resolve(&self, problem: &SegmentProblem<'_>) -> Result<Vec<usize>> {
        let explicit_max = problem.explicit.iter().flatten().copied().max();
        if problem.declared_segments.is_some_and(|count| count > 2)
            || explicit_max.is_some_and(|max| max > 1)
        {
            let missing = problem.missing_ids();
            return Err(LayoutError::inference(
                format!(
                    "two-column inference cannot place {} in a graph with more than two segments",
                    missing.join(", ")
                ),
                missing,
            ));
        }

        let mut has_out = vec![false; problem.ids.len()];
        let mut has_in = vec![false; problem.ids.len()];
        for &(from, to) in problem.links {
            has_out[from] = true;
            has_in[to] = true;
        }

        let mut resolved = Vec::with_capacity(problem.ids.len());
        let mut ambiguous = Vec::new();
        for (idx, explicit) in problem.explicit.iter().enumerate() {
            let segment = match (explicit, has_out[idx], has_in[idx]) {
                (Some(seg), _, _) => *seg,
                (None, true, false) => 0,
                (None, false, true) => 1,
                (None, _, _) => {
                    ambiguous.push(problem.ids[idx].clone());
                    0
                }
            };
            resolved.push(segment);
        }

        if !ambiguous.is_empty() {
            return Err(LayoutError::inference(
                format!(
                    "{} {} not only a link source or only a link target; give explicit segments",
                    ambiguous.join(", "),
                    if ambiguous.len() == 1 { "is" } else { "are" }
                ),
                ambiguous,
            ));
        }
        Ok(resolved)
    }

    fn segment_names(&self, count: usize) -> Option<Vec<String>> {
        (count <= LEGACY_SEGMENTS.len()).then(legacy_segment_names)
    }
}

/// Longest-path layering: a node sits one segment right of its furthest
/// predecessor. Explicit segments are kept and push their successors right.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalResolver;

impl SegmentResolver for TopologicalResolver {
    fn resolve(&self, problem: &SegmentProblem<'_>) -> Result<Vec<usize>> {
        let count = problem.ids.len();
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut indegree = vec![0usize; count];
        for &(from, to) in problem.links {
            outgoing[from].push(to);
            indegree[to] += 1;
        }

        let mut layers: Vec<usize> = problem
            .explicit
            .iter()
            .map(|seg| seg.unwrap_or(0))
            .collect();
        let mut queue: VecDeque<usize> = (0..count).filter(|idx| indegree[*idx] == 0).collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &outgoing[node] {
                if problem.explicit[next].is_none() {
                    layers[next] = layers[next].max(layers[node] + 1);
                }
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if visited < count {
            let cyclic: Vec<String> = (0..count)
                .filter(|idx| indegree[*idx] > 0)
                .map(|idx| problem.ids[idx].clone())
                .collect();
            return Err(LayoutError::inference(
                format!("links form a cycle through {}", cyclic.join(", ")),
                cyclic,
            ));
        }

        for &(from, to) in problem.links {
            if problem.explicit[from].is_none()
                && problem.explicit[to].is_some()
                && layers[from] >= layers[to]
            {
                return Err(LayoutError::inference(
                    format!(
                        "{} would land at segment {} but must sit left of {} (segment {})",
                        problem.ids[from], layers[from], problem.ids[to], layers[to]
                    ),
                    vec![problem.ids[from].clone()],
                ));
            }
        }

        Ok(layers)
    }
}

pub fn resolver_for(strategy: InferenceStrategy) -> Box<dyn SegmentResolver> {
    match strategy {
        InferenceStrategy::TwoColumn => Box::new(TwoColumnResolver),
        InferenceStrategy::Topological => Box::new(TopologicalResolver),
    }
}

pub fn normalize(raw: &RawGraph, config: &LayoutConfig) -> Result<SankeyGraph> {
    let resolver = resolver_for(config.inference);
    normalize_with(raw, config, resolver.as_ref())
}

pub fn normalize_with(
    raw: &RawGraph,
    config: &LayoutConfig,
    resolver: &dyn SegmentResolver,
) -> Result<SankeyGraph> {
    match raw {
        RawGraph::Segmented(input) => normalize_input(input, config, resolver),
        RawGraph::Legacy(legacy) => {
            let input = legacy_to_segmented(legacy, &config.segment_key);
            normalize_input(&input, config, resolver)
        }
    }
}

/// Rewrites legacy `sources`/`targets` input as a two-segment graph. A
/// target that reuses a source id becomes its own right-hand node and the
/// links pointing at it are rewired.
pub fn legacy_to_segmented(legacy: &LegacyInput, segment_key: &str) -> SankeyInput {
    let sources = column_nodes(&legacy.sources);
    let targets = column_nodes(&legacy.targets);

    let source_ids: HashSet<String> = sources.iter().map(|node| node.id.clone()).collect();
    let mut taken: HashSet<String> = source_ids.clone();
    taken.extend(targets.iter().map(|node| node.id.clone()));

    let mut nodes = Vec::with_capacity(sources.len() + targets.len());
    for node in sources {
        nodes.push(with_default_segment(node, segment_key, 0));
    }

    let mut renamed: HashMap<String, String> = HashMap::new();
    for node in targets {
        let mut node = with_default_segment(node, segment_key, 1);
        if source_ids.contains(&node.id) {
            let original = node.id.clone();
            let mut candidate = format!("{original}:right");
            while taken.contains(&candidate) {
                candidate.push('\'');
            }
            taken.insert(candidate.clone());
            node.label.get_or_insert_with(|| original.clone());
            node.id = candidate.clone();
            renamed.insert(original, candidate);
        }
        nodes.push(node);
    }

    let links = legacy
        .links
        .iter()
        .map(|link| {
            let mut link = link.clone();
            if let Some(renamed_target) = renamed.get(&link.target) {
                link.target = renamed_target.clone();
            }
            link
        })
        .collect();

    SankeyInput {
        segments: Some(legacy_segment_names()),
        nodes,
        links,
    }
}

fn legacy_segment_names() -> Vec<String> {
    LEGACY_SEGMENTS.map(String::from).to_vec()
}

fn column_nodes(column: &LegacyColumn) -> Vec<RawNode> {
    match column {
        LegacyColumn::Records(records) => records.clone(),
        LegacyColumn::Values(values) => values
            .iter()
            .map(|(id, value)| RawNode::new(id.clone()).with_value(*value))
            .collect(),
    }
}

fn with_default_segment(mut node: RawNode, segment_key: &str, segment: usize) -> RawNode {
    if segment_key == "segment" {
        node.segment.get_or_insert(SegmentRef::Index(segment));
    } else if node.extra.get(segment_key).is_none_or(Value::is_null) {
        node.extra
            .insert(segment_key.to_string(), Value::from(segment as u64));
    }
    node
}

fn normalize_input(
    input: &SankeyInput,
    config: &LayoutConfig,
    resolver: &dyn SegmentResolver,
) -> Result<SankeyGraph> {
    let ids: Vec<String> = input.nodes.iter().map(|node| node.id.clone()).collect();
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
    for (idx, node) in input.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            return Err(LayoutError::validation(format!(
                "node #{idx} has an empty id"
            )));
        }
        if index_of.insert(node.id.as_str(), idx).is_some() {
            return Err(LayoutError::validation(format!(
                "duplicate node id `{}`",
                node.id
            )));
        }
        if let Some(value) = node.value {
            check_value(value, || format!("node `{}`", node.id))?;
        }
    }

    let mut link_pairs = Vec::with_capacity(input.links.len());
    for (idx, link) in input.links.iter().enumerate() {
        let from = *index_of.get(link.source.as_str()).ok_or_else(|| {
            LayoutError::validation(format!(
                "link #{idx} references unknown source node `{}`",
                link.source
            ))
        })?;
        let to = *index_of.get(link.target.as_str()).ok_or_else(|| {
            LayoutError::validation(format!(
                "link #{idx} references unknown target node `{}`",
                link.target
            ))
        })?;
        check_value(link.value, || {
            format!("link #{idx} ({} -> {})", link.source, link.target)
        })?;
        link_pairs.push((from, to));
    }

    let declared = input.segments.as_deref();
    if let Some(names) = declared {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(LayoutError::config(format!(
                    "segment name `{name}` is listed twice"
                )));
            }
        }
    }

    let mut explicit = Vec::with_capacity(input.nodes.len());
    for node in &input.nodes {
        explicit.push(explicit_segment(node, &config.segment_key, declared)?);
    }

    let any_explicit = explicit.iter().any(Option::is_some);
    let inferred = explicit.iter().any(Option::is_none);
    let segments_of_nodes = if inferred {
        let problem = SegmentProblem {
            ids: &ids,
            links: &link_pairs,
            explicit: &explicit,
            declared_segments: declared.map(<[String]>::len),
        };
        let resolved = resolver.resolve(&problem)?;
        check_resolved(&problem, &resolved)?;
        resolved
    } else {
        explicit.iter().map(|seg| seg.unwrap_or(0)).collect()
    };

    let segments: Vec<String> = match declared {
        Some(names) => {
            for (idx, segment) in segments_of_nodes.iter().enumerate() {
                if *segment >= names.len() {
                    return Err(LayoutError::inference(
                        format!(
                            "node `{}` was placed in segment {} but only {} segments are declared",
                            ids[idx],
                            segment,
                            names.len()
                        ),
                        vec![ids[idx].clone()],
                    ));
                }
            }
            names.to_vec()
        }
        None => {
            let count = segments_of_nodes.iter().max().map_or(0, |max| max + 1);
            let named = if inferred && !any_explicit {
                resolver.segment_names(count)
            } else {
                None
            };
            named.unwrap_or_else(|| (0..count).map(|idx| idx.to_string()).collect())
        }
    };

    for (idx, &(from, to)) in link_pairs.iter().enumerate() {
        if segments_of_nodes[to] <= segments_of_nodes[from] {
            return Err(LayoutError::validation(format!(
                "link #{idx} ({} -> {}) must flow left to right, but goes from segment {} to {}",
                ids[from], ids[to], segments_of_nodes[from], segments_of_nodes[to]
            )));
        }
    }

    let nodes: Vec<Node> = input
        .nodes
        .iter()
        .zip(&segments_of_nodes)
        .map(|(node, &segment)| Node {
            id: node.id.clone(),
            label: node.label.clone(),
            segment,
            value: node.value,
            dummy: false,
        })
        .collect();

    let links: Vec<Link> = input
        .links
        .iter()
        .enumerate()
        .map(|(origin, link)| Link {
            source: link.source.clone(),
            target: link.target.clone(),
            value: link.value,
            origin,
            metadata: link.metadata.clone(),
        })
        .collect();

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        segments = segments.len(),
        inferred,
        "normalized sankey graph"
    );

    Ok(SankeyGraph {
        segments,
        nodes,
        links,
    })
}

fn explicit_segment(
    node: &RawNode,
    segment_key: &str,
    declared: Option<&[String]>,
) -> Result<Option<usize>> {
    let reference = if segment_key == "segment" {
        node.segment.clone()
    } else {
        match node.extra.get(segment_key) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let segment = SegmentRef::from_json(value).ok_or_else(|| {
                    LayoutError::config(format!(
                        "node `{}` has an unusable `{segment_key}` value: {value}",
                        node.id
                    ))
                })?;
                Some(segment)
            }
        }
    };

    match reference {
        None => Ok(None),
        Some(SegmentRef::Index(idx)) => match declared {
            Some(names) if idx >= names.len() => Err(LayoutError::config(format!(
                "node `{}` uses segment index {idx} but only {} segments are declared",
                node.id,
                names.len()
            ))),
            _ => Ok(Some(idx)),
        },
        Some(SegmentRef::Name(name)) => {
            let Some(names) = declared else {
                return Err(LayoutError::config(format!(
                    "node `{}` names segment `{name}` but no segment list was given",
                    node.id
                )));
            };
            names
                .iter()
                .position(|candidate| *candidate == name)
                .map(Some)
                .ok_or_else(|| {
                    LayoutError::config(format!(
                        "node `{}` names unknown segment `{name}`",
                        node.id
                    ))
                })
        }
    }
}

/// A resolver must answer for every node and leave explicit segments alone.
fn check_resolved(problem: &SegmentProblem<'_>, resolved: &[usize]) -> Result<()> {
    if resolved.len() != problem.ids.len() {
        return Err(LayoutError::config(format!(
            "segment resolver returned {} segments for {} nodes",
            resolved.len(),
            problem.ids.len()
        )));
    }
    for (idx, explicit) in problem.explicit.iter().enumerate() {
        if let Some(segment) = *explicit
            && resolved[idx] != segment
        {
            return Err(LayoutError::config(format!(
                "segment resolver moved `{}` from segment {segment} to {}",
                problem.ids[idx], resolved[idx]
            )));
        }
    }
    Ok(())
}

fn check_value(value: f64, what: impl FnOnce() -> String) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(LayoutError::validation(format!(
        "{} has invalid value {value}; values must be finite and non-negative",
        what()
    )))
}
