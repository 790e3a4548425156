//! Degree-ordered greedy backtracking

use meshsched_core::{Application, Assignment, Component, ResourceState};
use tracing::{debug, info};

use crate::feasibility::fits;
use crate::ordering::{component_order, node_order};
use crate::strategy::{backtrack, mapping_of, PlacementStrategy, SearchOutcome};

/// Places the most connected, most bandwidth-hungry components first, onto
/// the best connected nodes first. Admission uses the local [`fits`] check
/// only; route bandwidth is enforced when the placement is applied.
#[derive(Debug, Default)]
pub struct MaxBwStrategy;

impl MaxBwStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementStrategy for MaxBwStrategy {
    fn name(&self) -> &'static str {
        "max-bw"
    }

    fn schedule(&mut self, app: &Application, state: &ResourceState) -> SearchOutcome {
        let components = component_order(app);
        let nodes = node_order(state);
        let mut assignment = Assignment::new();

        debug!(
            app = %app.id,
            first_component = components.first().map(|c| c.id.as_str()).unwrap_or(""),
            first_node = nodes.first().map(String::as_str).unwrap_or(""),
            "Starting max-bw search"
        );

        let admit = |_: &Assignment, component: &Component, node: &str, current: &ResourceState| {
            fits(component, node, current)
        };
        match backtrack(app, &components, &nodes, &mut assignment, state, &admit) {
            Some(result) => {
                info!(app = %app.id, "Max-bw search found a placement");
                SearchOutcome::Complete {
                    mapping: mapping_of(&assignment, app),
                    state: result,
                }
            }
            None => SearchOutcome::Exhausted { best_cost: None },
        }
    }
}
