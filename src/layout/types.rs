use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Node id -> segment index.
pub type LayerMap = BTreeMap<String, usize>;

/// Node id -> throughput value.
pub type NodeValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: Option<String>,
    pub segment: usize,
    /// Explicit value from the input (or the chain value for dummies).
    pub value: Option<f64>,
    pub dummy: bool,
}

impl Node {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub value: f64,
    /// Index of the input link this one came from. Every hop of a split
    /// chain shares the index of the long link it replaced.
    pub origin: usize,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Nodes, links and segment names with every segment resolved to an index.
/// Produced by the normalizer and again, with dummies, by the splitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SankeyGraph {
    pub segments: Vec<String>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl SankeyGraph {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn layer_map(&self) -> LayerMap {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.segment))
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn dummy_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.dummy).count()
    }
}

/// Node ids bucketed by segment, indexed by segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerGroups {
    pub layers: Vec<Vec<String>>,
}

/// Final intra-segment order, indexed by segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeOrder {
    pub layers: Vec<Vec<String>>,
}

impl NodeOrder {
    /// Node id -> position within its segment.
    pub fn positions(&self) -> BTreeMap<String, usize> {
        let mut positions = BTreeMap::new();
        for layer in &self.layers {
            for (idx, id) in layer.iter().enumerate() {
                positions.insert(id.clone(), idx);
            }
        }
        positions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLayout {
    pub id: String,
    pub label: String,
    pub segment: usize,
    /// Position inside the segment's ordering.
    pub order: usize,
    pub value: f64,
    pub dummy: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkLayout {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub origin: usize,
    /// Averaged ribbon width.
    pub width: f64,
    /// Right edge of the source node.
    pub source_x: f64,
    /// Top of the ribbon where it leaves the source.
    pub source_y: f64,
    /// Left edge of the target node.
    pub target_x: f64,
    /// Top of the ribbon where it enters the target.
    pub target_y: f64,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLayout {
    pub width: f64,
    pub height: f64,
    pub node_width: f64,
    pub segments: Vec<String>,
    pub order: NodeOrder,
    pub nodes: Vec<NodeLayout>,
    pub links: Vec<LinkLayout>,
}

impl SankeyLayout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|node| node.id == id)
    }
}
