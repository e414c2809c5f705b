use crate::layout::SankeyLayout;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub width: f64,
    pub height: f64,
    pub segments: Vec<SegmentDump>,
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
}

#[derive(Debug, Serialize)]
pub struct SegmentDump {
    pub index: usize,
    pub name: String,
    /// Node ids top to bottom.
    pub order: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub segment: usize,
    pub value: f64,
    pub dummy: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub origin: usize,
    pub width: f64,
    /// Top of the ribbon at the source and at the target.
    pub points: [[f64; 2]; 2],
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl LayoutDump {
    pub fn from_layout(layout: &SankeyLayout, title: Option<&str>) -> Self {
        let segments = (0..layout.segments.len().max(layout.order.layers.len()))
            .map(|index| SegmentDump {
                index,
                name: layout
                    .segments
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| index.to_string()),
                order: layout.order.layers.get(index).cloned().unwrap_or_default(),
            })
            .collect();

        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                label: node.label.clone(),
                segment: node.segment,
                value: node.value,
                dummy: node.dummy,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        let links = layout
            .links
            .iter()
            .map(|link| LinkDump {
                source: link.source.clone(),
                target: link.target.clone(),
                value: link.value,
                origin: link.origin,
                width: link.width,
                points: [
                    [link.source_x, link.source_y],
                    [link.target_x, link.target_y],
                ],
                metadata: link.metadata.clone(),
            })
            .collect();

        Self {
            title: title.map(str::to_string),
            width: layout.width,
            height: layout.height,
            segments,
            nodes,
            links,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    layout: &SankeyLayout,
    title: Option<&str>,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, title);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{RawLink, RawNode, SankeyInput, SegmentRef};
    use crate::layout::compute_layout;

    #[test]
    fn dump_lists_segments_with_their_order() {
        let input = SankeyInput {
            segments: Some(vec!["a".into(), "b".into(), "c".into()]),
            nodes: vec![
                RawNode::new("A").with_segment(SegmentRef::Index(0)),
                RawNode::new("C").with_segment(SegmentRef::Index(2)),
            ],
            links: vec![RawLink::new("A", "C", 2.0)],
        };
        let layout = compute_layout(&input.into(), &LayoutConfig::default()).unwrap();
        let dump = LayoutDump::from_layout(&layout, Some("demo"));
        let json = serde_json::to_value(&dump).unwrap();

        assert_eq!(json["title"], "demo");
        assert_eq!(json["segments"][1]["name"], "b");
        assert_eq!(json["segments"][1]["order"].as_array().unwrap().len(), 1);
        assert_eq!(json["links"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["nodes"]
                .as_array()
                .unwrap()
                .iter()
                .filter(|node| node["dummy"] == true)
                .count(),
            1
        );
    }
}
