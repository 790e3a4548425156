//! Exhaustive backtracking search

use meshsched_core::{Application, Assignment, Component, ResourceState};
use tracing::{debug, info};

use crate::feasibility::verify;
use crate::strategy::{backtrack, mapping_of, PlacementStrategy, SearchOutcome};

/// Tries every node for every component, in component-id order and node
/// enumeration order, and re-verifies the whole partial assignment before
/// each tentative placement. Finds a placement whenever one exists that the
/// verifier accepts; running time is exponential in the component count.
#[derive(Debug, Default)]
pub struct OptimalStrategy;

impl OptimalStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementStrategy for OptimalStrategy {
    fn name(&self) -> &'static str {
        "optimal"
    }

    fn schedule(&mut self, app: &Application, state: &ResourceState) -> SearchOutcome {
        let components: Vec<&Component> = app.components.values().collect();
        let nodes: Vec<String> = state.node_ids().map(str::to_string).collect();
        let mut assignment = Assignment::new();

        debug!(app = %app.id, components = components.len(), nodes = nodes.len(), "Starting exhaustive search");

        let admit = |assignment: &Assignment, _: &Component, _: &str, _: &ResourceState| {
            verify(assignment, app, state)
        };
        match backtrack(app, &components, &nodes, &mut assignment, state, &admit) {
            Some(result) => {
                info!(app = %app.id, "Exhaustive search found a placement");
                SearchOutcome::Complete {
                    mapping: mapping_of(&assignment, app),
                    state: result,
                }
            }
            None => SearchOutcome::Exhausted { best_cost: None },
        }
    }
}
