//! The layout pipeline. Each stage is a pure function from one snapshot to
//! the next; [`compute_layout`] runs them in order.

mod error;
mod group;
mod normalize;
mod order;
mod position;
mod split;
pub(crate) mod types;
mod value;

pub use error::{LayoutError, Result};
pub use group::group_by_segment;
pub use normalize::{
    SegmentProblem, SegmentResolver, TopologicalResolver, TwoColumnResolver, legacy_to_segmented,
    normalize, normalize_with, resolver_for,
};
pub use order::order_nodes;
pub use position::compute_positions;
pub use split::{dummy_id, split_long_links};
pub use types::*;
pub use value::compute_node_values;

use tracing::debug;

use crate::config::LayoutConfig;
use crate::ir::RawGraph;

pub fn compute_layout(raw: &RawGraph, config: &LayoutConfig) -> Result<SankeyLayout> {
    config.validate()?;
    let graph = normalize(raw, config)?;
    let split = split_long_links(&graph)?;
    let values = compute_node_values(&split);
    let groups = group_by_segment(&split);
    let order = order_nodes(&groups, &split.links, config.ordering, config.iterations);
    let layout = compute_positions(&split, &values, &order, config);
    debug!(
        segments = layout.segments.len(),
        nodes = layout.nodes.len(),
        dummies = split.dummy_count(),
        links = layout.links.len(),
        "layout complete"
    );
    Ok(layout)
}
