//! Degree-based orderings shared by the heuristic strategies

use meshsched_core::{Application, Component, ResourceState};

/// Components by descending dependency count, then descending total
/// bandwidth. Ties keep component-id order.
pub fn component_order(app: &Application) -> Vec<&Component> {
    let mut components: Vec<&Component> = app.components.values().collect();
    components.sort_by(|a, b| {
        b.degree()
            .cmp(&a.degree())
            .then_with(|| b.total_bandwidth().total_cmp(&a.total_bandwidth()))
    });
    components
}

/// Node ids by descending link count, then descending aggregate outgoing
/// link capacity. Ties keep enumeration order.
pub fn node_order(state: &ResourceState) -> Vec<String> {
    let mut nodes: Vec<(String, usize, f64)> = state
        .node_ids()
        .map(|id| (id.to_string(), state.link_degree(id), state.outgoing_capacity(id)))
        .collect();
    nodes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.total_cmp(&a.2)));
    nodes.into_iter().map(|(id, _, _)| id).collect()
}
