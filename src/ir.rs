//! Raw input records, as decoded from JSON or the text formats, before any
//! layout stage has touched them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A segment reference as written on a node: a 0-based index or a name
/// looked up in the segment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentRef {
    Index(usize),
    Name(String),
}

impl SegmentRef {
    /// Reads a segment out of an arbitrary JSON field. Only non-negative
    /// integers and strings are segments.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(|idx| Self::Index(idx as usize)),
            Value::String(name) => Some(Self::Name(name.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<SegmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Any other fields; an alternate segment key is looked up here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_segment(mut self, segment: SegmentRef) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub value: f64,
    /// Extra link fields (labels, colors, ...) carried through splitting.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RawLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
            metadata: Map::new(),
        }
    }
}

/// Canonical multi-segment input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SankeyInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

/// One side of the legacy two-column input: node records, or a plain
/// `id -> value` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyColumn {
    Records(Vec<RawNode>),
    Values(IndexMap<String, f64>),
}

impl Default for LegacyColumn {
    fn default() -> Self {
        Self::Records(Vec::new())
    }
}

/// Legacy `sources` / `targets` / `links` input with no explicit segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyInput {
    pub sources: LegacyColumn,
    pub targets: LegacyColumn,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawGraph {
    Segmented(SankeyInput),
    Legacy(LegacyInput),
}

impl From<SankeyInput> for RawGraph {
    fn from(input: SankeyInput) -> Self {
        Self::Segmented(input)
    }
}

impl From<LegacyInput> for RawGraph {
    fn from(input: LegacyInput) -> Self {
        Self::Legacy(input)
    }
}
