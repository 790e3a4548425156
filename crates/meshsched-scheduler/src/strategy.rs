//! Placement strategy interface

use meshsched_core::{
    Application, Assignment, Component, ComponentMapping, ResourceError, ResourceState,
    SchedulerConfig, StrategyKind,
};
use tracing::debug;

use crate::annealing::AnnealingStrategy;
use crate::applier::apply;
use crate::exhaustive::OptimalStrategy;
use crate::greedy::MaxBwStrategy;
use crate::tabu::TabuStrategy;

/// Result of one strategy run
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Every component has a node; `state` carries all reservations
    Complete {
        mapping: ComponentMapping,
        state: ResourceState,
    },
    /// No complete placement was found. Cost-driven strategies report the
    /// best cost they saw; it is informational only.
    Exhausted { best_cost: Option<f64> },
}

impl SearchOutcome {
    /// Whether a complete placement was found
    pub fn is_complete(&self) -> bool {
        matches!(self, SearchOutcome::Complete { .. })
    }
}

/// Strategy for placing every component of an application
pub trait PlacementStrategy: Send + Sync {
    /// Short strategy name for logs and reports
    fn name(&self) -> &'static str;

    /// Per-cycle reset run before searching
    fn initialize(&mut self, state: &mut ResourceState) {
        state.initialize_routes();
    }

    /// Search for a complete placement of `app` starting from `state`.
    ///
    /// `state` is never modified; a successful outcome carries its own
    /// mutated copy.
    fn schedule(&mut self, app: &Application, state: &ResourceState) -> SearchOutcome;
}

/// Build the strategy selected in `config`
pub fn build_strategy(config: &SchedulerConfig) -> Box<dyn PlacementStrategy> {
    strategy_for(config.strategy, config)
}

/// Build a specific strategy with the parameters from `config`
pub fn strategy_for(kind: StrategyKind, config: &SchedulerConfig) -> Box<dyn PlacementStrategy> {
    match kind {
        StrategyKind::Optimal => Box::new(OptimalStrategy::new()),
        StrategyKind::MaxBw => Box::new(MaxBwStrategy::new()),
        StrategyKind::SimulatedAnnealing => Box::new(AnnealingStrategy::new(config.annealing.clone())),
        StrategyKind::TabuSearch => Box::new(TabuStrategy::new(config.tabu.clone())),
    }
}

/// Depth-first placement over `components` in the given order.
///
/// For the next unplaced component every node in `nodes` is tried: the
/// component is tentatively recorded in `assignment`, `admit` decides whether
/// the node is acceptable, and [`apply`] reserves the resources. A failed
/// subtree leaves the caller's `state` as it was, so the next node starts
/// from the pre-apply state. Returns `None` once every node was tried for the
/// first component that cannot be placed.
pub(crate) fn backtrack<F>(
    app: &Application,
    components: &[&Component],
    nodes: &[String],
    assignment: &mut Assignment,
    state: &ResourceState,
    admit: &F,
) -> Option<ResourceState>
where
    F: Fn(&Assignment, &Component, &str, &ResourceState) -> Result<(), ResourceError>,
{
    let component = match components
        .iter()
        .find(|c| assignment.node_of(&app.id, &c.id).is_none())
    {
        Some(component) => *component,
        None => return Some(state.snapshot()),
    };

    for node in nodes {
        assignment.insert(&app.id, &component.id, node);

        let placed = admit(assignment, component, node, state)
            .and_then(|_| apply(node, &component.id, app, state, assignment));
        match placed {
            Ok(next) => {
                debug!(component = %component.id, node = %node, "Tentative placement");
                if let Some(done) = backtrack(app, components, nodes, assignment, &next, admit) {
                    return Some(done);
                }
                debug!(component = %component.id, node = %node, "Backtracking");
            }
            Err(e) => {
                debug!(component = %component.id, node = %node, error = %e, "Placement rejected");
            }
        }

        assignment.remove(&app.id, &component.id);
    }
    None
}

/// Mapping of `app` in `assignment`, empty when nothing is placed
pub(crate) fn mapping_of(assignment: &Assignment, app: &Application) -> ComponentMapping {
    assignment.app(&app.id).cloned().unwrap_or_default()
}
