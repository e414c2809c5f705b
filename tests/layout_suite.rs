use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use sankey_rs_layout::config::RenderConfig;
use sankey_rs_layout::layout::SankeyLayout;
use sankey_rs_layout::parser::validate_flows;
use sankey_rs_layout::render::render_svg;
use sankey_rs_layout::theme::Theme;
use sankey_rs_layout::{LayoutConfig, compute_layout, parse_input};

fn fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    std::fs::read_to_string(&path).expect("fixture read failed")
}

fn layout_fixture(rel: &str) -> SankeyLayout {
    let parsed = parse_input(&fixture(rel)).expect("parse failed");
    compute_layout(&parsed.graph, &LayoutConfig::default()).expect("layout failed")
}

fn assert_adjacent(layout: &SankeyLayout, fixture: &str) {
    let segment: HashMap<&str, usize> = layout
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node.segment))
        .collect();
    for link in &layout.links {
        assert_eq!(
            segment[link.target.as_str()],
            segment[link.source.as_str()] + 1,
            "{fixture}: {} -> {} is not adjacent",
            link.source,
            link.target
        );
    }
}

#[test]
fn layout_all_fixtures() {
    // Keep this list explicit so new input forms must be added intentionally.
    let candidates = [
        "basic.json",
        "legacy.json",
        "left_right.json",
        "multi_segment.json",
        "text.txt",
    ];

    for rel in candidates {
        let layout = layout_fixture(rel);
        assert_adjacent(&layout, rel);
        for node in &layout.nodes {
            assert!(node.height >= 0.0, "{rel}: negative height for {}", node.id);
            let on_canvas = node.x >= 0.0 && node.x + node.width <= layout.width;
            assert!(on_canvas, "{rel}: {} off canvas", node.id);
        }
        let svg = render_svg(&layout, &Theme::modern(), &RenderConfig::default());
        assert!(svg.contains("<svg"), "{rel}: missing <svg tag");
        assert!(svg.contains("</svg>"), "{rel}: missing </svg tag");
    }
}

#[test]
fn basic_fixture_is_two_nodes_one_link() {
    let layout = layout_fixture("basic.json");
    assert_eq!(layout.segments, vec!["L", "R"]);
    assert_eq!(layout.nodes.len(), 2);
    assert_eq!(layout.links.len(), 1);
    let a = layout.node("A").unwrap();
    assert!((layout.links[0].width - a.height).abs() < 1e-9);
}

#[test]
fn legacy_fixture_keeps_link_values() {
    let layout = layout_fixture("legacy.json");
    assert_eq!(layout.segments, vec!["left", "right"]);
    assert_eq!(layout.order.layers.len(), 2);
    let values: Vec<f64> = layout.links.iter().map(|link| link.value).collect();
    assert_eq!(values, vec![10.0, 5.0, 15.0]);
}

#[test]
fn multi_segment_fixture_splits_long_links() {
    let layout = layout_fixture("multi_segment.json");
    assert_eq!(layout.nodes.iter().filter(|node| node.dummy).count(), 5);
    assert_eq!(layout.links.len(), 14);

    let long_note = Value::from("long");
    let long: Vec<_> = layout
        .links
        .iter()
        .filter(|link| link.metadata.get("note") == Some(&long_note))
        .collect();
    assert_eq!(long.len(), 3);
    assert!(long.iter().all(|link| link.value == 20.0));
}

#[test]
fn left_right_fixture_separates_shared_ids() {
    let parsed = parse_input(&fixture("left_right.json")).unwrap();
    assert_eq!(parsed.title.as_deref(), Some("Allocation"));
    assert!(validate_flows(parsed.flows.as_ref().unwrap()).is_empty());

    let layout = compute_layout(&parsed.graph, &LayoutConfig::default()).unwrap();
    let right = layout.node("A:right").unwrap();
    assert_eq!(right.label, "A");
    assert_eq!(right.segment, 1);
    assert_eq!(layout.node("A").unwrap().segment, 0);
}

#[test]
fn text_fixture_matches_declared_totals() {
    let parsed = parse_input(&fixture("text.txt")).unwrap();
    assert!(validate_flows(parsed.flows.as_ref().unwrap()).is_empty());
    let layout = compute_layout(&parsed.graph, &LayoutConfig::default()).unwrap();
    assert_eq!(layout.node("C").unwrap().value, 30.0);
    assert_eq!(layout.node("N").unwrap().value, 35.0);
}

#[test]
fn fixtures_lay_out_identically_twice() {
    let first = layout_fixture("multi_segment.json");
    let second = layout_fixture("multi_segment.json");
    assert_eq!(first, second);
}
