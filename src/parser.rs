//! Input decoding: the JSON graph form, the legacy `sources`/`targets`
//! form, the `left`/`right` JSON form and the `Left`/`Right` text form.

use std::fmt;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::ir::{LegacyColumn, LegacyInput, RawGraph, RawLink, RawNode, SankeyInput};

static LEFT_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*=\s*(\d+(?:\.\d+)?)").unwrap());
static RIGHT_ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s*=\s*(.+)$").unwrap());
static FLOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s+from\s+(\w+)").unwrap());

/// Allowed gap between a left node's declared value and its outgoing flows.
pub const FLOW_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub graph: RawGraph,
    pub title: Option<String>,
    pub height: Option<f64>,
    pub font_size: Option<f64>,
    /// Declared left values and flows, for inputs that have them.
    pub flows: Option<FlowTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub source: String,
    pub value: f64,
}

/// Two-column input as written: left node values and, per right node, the
/// flows feeding it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowTable {
    pub left: IndexMap<String, f64>,
    pub right: IndexMap<String, Vec<Flow>>,
}

impl FlowTable {
    fn from_legacy(legacy: &LegacyInput) -> Self {
        let left = match &legacy.sources {
            LegacyColumn::Values(values) => values.clone(),
            LegacyColumn::Records(records) => records
                .iter()
                .filter_map(|node| node.value.map(|value| (node.id.clone(), value)))
                .collect(),
        };
        // Only sources with a declared value take part in the check; unknown
        // endpoints are the normalizer's to report.
        let mut right: IndexMap<String, Vec<Flow>> = IndexMap::new();
        for link in &legacy.links {
            if !left.contains_key(&link.source) {
                continue;
            }
            right.entry(link.target.clone()).or_default().push(Flow {
                source: link.source.clone(),
                value: link.value,
            });
        }
        Self { left, right }
    }

    /// Legacy input with left nodes as `id -> value` and right nodes as
    /// plain records. Ids shared by both sides are split apart during
    /// normalization.
    pub fn to_legacy(&self) -> LegacyInput {
        let links = self
            .right
            .iter()
            .flat_map(|(target, flows)| {
                flows
                    .iter()
                    .map(move |flow| RawLink::new(flow.source.clone(), target.clone(), flow.value))
            })
            .collect();
        LegacyInput {
            sources: LegacyColumn::Values(self.left.clone()),
            targets: LegacyColumn::Records(self.right.keys().map(RawNode::new).collect()),
            links,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowMismatch {
    UnknownSource {
        source: String,
        target: String,
    },
    Total {
        node: String,
        declared: f64,
        actual: f64,
    },
}

impl fmt::Display for FlowMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSource { source, target } => {
                write!(f, "unknown left node `{source}` flows into `{target}`")
            }
            Self::Total {
                node,
                declared,
                actual,
            } => write!(f, "`{node}` has flow {actual} but declares {declared}"),
        }
    }
}

/// Compares every left node's declared value with the sum of the flows
/// leaving it.
pub fn validate_flows(table: &FlowTable) -> Vec<FlowMismatch> {
    let mut totals: IndexMap<&str, f64> = table.left.keys().map(|id| (id.as_str(), 0.0)).collect();
    let mut mismatches = Vec::new();
    for (target, flows) in &table.right {
        for flow in flows {
            match totals.get_mut(flow.source.as_str()) {
                Some(total) => *total += flow.value,
                None => mismatches.push(FlowMismatch::UnknownSource {
                    source: flow.source.clone(),
                    target: target.clone(),
                }),
            }
        }
    }
    for (node, actual) in totals {
        let declared = table.left[node];
        if (actual - declared).abs() > FLOW_TOLERANCE {
            mismatches.push(FlowMismatch::Total {
                node: node.to_string(),
                declared,
                actual,
            });
        }
    }
    mismatches
}

pub fn parse_input(input: &str) -> Result<ParsedInput> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') {
        let value = parse_json(trimmed)?;
        return parse_json_value(value);
    }
    parse_text(input)
}

fn parse_json(text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(json_err) => json5::from_str::<Value>(text)
            .with_context(|| format!("input is neither JSON ({json_err}) nor JSON5")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LeftColumn {
    Values(IndexMap<String, f64>),
    Records(Vec<LeftRecord>),
}

#[derive(Debug, Deserialize)]
struct LeftRecord {
    name: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct FlowRecord {
    #[serde(default, alias = "source")]
    from: Option<String>,
    #[serde(default, alias = "amount")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TwoColumnJson {
    #[serde(default)]
    left: Option<LeftColumn>,
    #[serde(default)]
    right: IndexMap<String, Vec<FlowRecord>>,
}

fn parse_json_value(value: Value) -> Result<ParsedInput> {
    let Some(object) = value.as_object() else {
        bail!("input JSON must be an object");
    };
    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);
    let height = object.get("height").and_then(Value::as_f64);
    let font_size = object
        .get("font_size")
        .or_else(|| object.get("fontSize"))
        .and_then(Value::as_f64);
    let legacy_form = object.contains_key("sources") && object.contains_key("targets");
    let two_column_form = object.contains_key("left") || object.contains_key("right");

    if legacy_form {
        let legacy: LegacyInput =
            serde_json::from_value(value).context("invalid legacy sources/targets input")?;
        let flows = FlowTable::from_legacy(&legacy);
        return Ok(ParsedInput {
            graph: legacy.into(),
            title,
            height,
            font_size,
            flows: Some(flows),
        });
    }

    if two_column_form {
        let raw: TwoColumnJson = serde_json::from_value(value).context("invalid left/right input")?;
        let left = match raw.left {
            Some(LeftColumn::Values(values)) => values,
            Some(LeftColumn::Records(records)) => records
                .into_iter()
                .map(|record| (record.name, record.value))
                .collect(),
            None => IndexMap::new(),
        };
        let mut right = IndexMap::new();
        for (target, records) in raw.right {
            let flows: Vec<Flow> = records
                .into_iter()
                .filter_map(|record| {
                    Some(Flow {
                        source: record.from.filter(|source| !source.is_empty())?,
                        value: record.value?,
                    })
                })
                .collect();
            if !flows.is_empty() {
                right.insert(target, flows);
            }
        }
        let table = FlowTable { left, right };
        return Ok(ParsedInput {
            graph: table.to_legacy().into(),
            title,
            height,
            font_size,
            flows: Some(table),
        });
    }

    let input: SankeyInput = serde_json::from_value(value).context("invalid graph input")?;
    Ok(ParsedInput {
        graph: input.into(),
        title,
        height,
        font_size,
        flows: None,
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Left,
    Right,
}

fn parse_text(input: &str) -> Result<ParsedInput> {
    let mut table = FlowTable::default();
    let mut section: Option<Section> = None;

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("%%") || line.starts_with('#') {
            continue;
        }
        if line.eq_ignore_ascii_case("left") {
            section = Some(Section::Left);
            continue;
        }
        if line.eq_ignore_ascii_case("right") {
            section = Some(Section::Right);
            continue;
        }
        match section {
            Some(Section::Left) => {
                if let Some(caps) = LEFT_ENTRY_RE.captures(line) {
                    let value: f64 = caps[2]
                        .parse()
                        .with_context(|| format!("invalid value in `{line}`"))?;
                    table.left.insert(caps[1].to_string(), value);
                }
            }
            Some(Section::Right) => {
                let Some(caps) = RIGHT_ENTRY_RE.captures(line) else {
                    continue;
                };
                let mut flows = Vec::new();
                for flow in FLOW_RE.captures_iter(&caps[2]) {
                    let value: f64 = flow[1]
                        .parse()
                        .with_context(|| format!("invalid flow value in `{line}`"))?;
                    flows.push(Flow {
                        source: flow[2].to_string(),
                        value,
                    });
                }
                if flows.is_empty() {
                    continue;
                }
                let target = caps[1].to_string();
                if let Some(existing) = table.right.get_mut(&target) {
                    warn!(node = %target, "repeated right entry, appending its flows");
                    existing.extend(flows);
                } else {
                    table.right.insert(target, flows);
                }
            }
            None => {}
        }
    }

    if table.left.is_empty() && table.right.is_empty() {
        bail!("unrecognized input: expected JSON or Left/Right sections");
    }
    Ok(ParsedInput {
        graph: table.to_legacy().into(),
        title: None,
        height: None,
        font_size: None,
        flows: Some(table),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SegmentRef;

    const TEXT: &str = include_str!("../tests/fixtures/text.txt");

    #[test]
    fn parses_graph_json() {
        let parsed = parse_input(
            r#"{
                "segments": ["in", "out"],
                "nodes": [
                    {"id": "a", "segment": "in"},
                    {"id": "b", "segment": 1, "color": "red"}
                ],
                "links": [{"source": "a", "target": "b", "value": 3}]
            }"#,
        )
        .unwrap();
        let RawGraph::Segmented(input) = parsed.graph else {
            panic!("expected segmented input");
        };
        assert_eq!(
            input.segments,
            Some(vec!["in".to_string(), "out".to_string()])
        );
        assert_eq!(input.nodes[0].segment, Some(SegmentRef::Name("in".into())));
        assert_eq!(input.nodes[1].extra["color"], Value::from("red"));
        assert_eq!(input.links[0].value, 3.0);
        assert!(parsed.flows.is_none());
    }

    #[test]
    fn detects_legacy_form() {
        let parsed = parse_input(
            r#"{
                "sources": {"A": 10, "B": 20},
                "targets": {"X": 30},
                "links": [
                    {"source": "A", "target": "X", "value": 10},
                    {"source": "B", "target": "X", "value": 20}
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(parsed.graph, RawGraph::Legacy(_)));
        assert!(validate_flows(&parsed.flows.unwrap()).is_empty());
    }

    #[test]
    fn parses_left_right_json_with_metadata() {
        let parsed = parse_input(
            r#"{
                "title": "Budget",
                "height": 400,
                "fontSize": 14,
                "left": [{"name": "A", "value": 10}],
                "right": {
                    "M": [{"source": "A", "amount": 4}, {"from": "A", "value": 6}],
                    "N": []
                }
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Budget"));
        assert_eq!(parsed.height, Some(400.0));
        assert_eq!(parsed.font_size, Some(14.0));
        let flows = parsed.flows.unwrap();
        assert_eq!(flows.left["A"], 10.0);
        assert_eq!(flows.right.len(), 1);
        assert_eq!(flows.right["M"].len(), 2);
        assert!(validate_flows(&flows).is_empty());
    }

    #[test]
    fn falls_back_to_json5() {
        let parsed = parse_input("{left: {A: 1,}, right: {B: [{from: 'A', value: 1}]},}").unwrap();
        assert_eq!(parsed.flows.unwrap().left["A"], 1.0);
    }

    #[test]
    fn parses_text_sections() {
        let parsed = parse_input(TEXT).unwrap();
        let flows = parsed.flows.as_ref().unwrap();
        assert_eq!(flows.left.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(
            flows.right["N"],
            vec![
                Flow {
                    source: "A".into(),
                    value: 5.0,
                },
                Flow {
                    source: "B".into(),
                    value: 10.0,
                },
                Flow {
                    source: "C".into(),
                    value: 20.0,
                },
            ]
        );
        let RawGraph::Legacy(legacy) = &parsed.graph else {
            panic!("expected legacy input");
        };
        assert_eq!(legacy.links.len(), 7);
        assert!(validate_flows(flows).is_empty());
    }

    #[test]
    fn reports_flow_mismatches() {
        let text = "Left\nA=10\nB=5\nRight\nM= 4 from A, 5 from B, 1 from Z\n";
        let parsed = parse_input(text).unwrap();
        let mismatches = validate_flows(&parsed.flows.unwrap());
        assert_eq!(
            mismatches,
            vec![
                FlowMismatch::UnknownSource {
                    source: "Z".into(),
                    target: "M".into(),
                },
                FlowMismatch::Total {
                    node: "A".into(),
                    declared: 10.0,
                    actual: 4.0,
                },
            ]
        );
        assert_eq!(
            mismatches[1].to_string(),
            "`A` has flow 4 but declares 10"
        );
    }

    #[test]
    fn repeated_right_entries_append() {
        let parsed = parse_input("Left\nA=10\nRight\nM= 4 from A\nM= 6 from A\n").unwrap();
        let flows = parsed.flows.unwrap();
        assert_eq!(flows.right.len(), 1);
        assert_eq!(flows.right["M"].len(), 2);
        assert!(validate_flows(&flows).is_empty());
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let parsed = parse_input("Left\nA=10\nRight\nM= 9.995 from A\n").unwrap();
        assert!(validate_flows(&parsed.flows.unwrap()).is_empty());
    }

    #[test]
    fn rejects_unrecognized_text() {
        assert!(parse_input("sankey-beta\nA,B,10").is_err());
        assert!(parse_input("{not json at all").is_err());
    }
}
