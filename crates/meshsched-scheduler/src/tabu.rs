//! Tabu search over complete assignments
//!
//! Candidates are scored by how far they overconsume cpu, memory and
//! bandwidth, in percent of the resources involved. Recently visited
//! assignments are kept in a bounded tabu list and never become the running
//! best again.

use std::collections::VecDeque;

use meshsched_core::{Application, Assignment, ComponentMapping, ResourceState, TabuConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::applier::apply;
use crate::feasibility::fits;
use crate::ordering::{component_order, node_order};
use crate::strategy::{PlacementStrategy, SearchOutcome};

/// Smallest penalty charged for a placement the applier rejects
const MIN_ROUTE_PENALTY: f64 = 1.0;

/// Bounded FIFO of visited assignments
#[derive(Debug, Clone)]
pub struct TabuList {
    entries: VecDeque<ComponentMapping>,
    capacity: usize,
}

impl TabuList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Remember an assignment, evicting the oldest one when full
    pub fn push(&mut self, mapping: ComponentMapping) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(mapping);
    }

    /// Whether an identical assignment is remembered
    pub fn contains(&self, mapping: &ComponentMapping) -> bool {
        self.entries.iter().any(|m| m == mapping)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A candidate becomes the running best only if it is strictly cheaper and
/// not tabu
pub fn should_promote(
    candidate_cost: f64,
    best_cost: f64,
    candidate: &ComponentMapping,
    tabu: &TabuList,
) -> bool {
    candidate_cost < best_cost && !tabu.contains(candidate)
}

/// Tabu search strategy
pub struct TabuStrategy {
    config: TabuConfig,
    rng: StdRng,
}

/// Scored assignment together with the state it produced
struct Scored {
    mapping: ComponentMapping,
    cost: f64,
    state: ResourceState,
}

impl TabuStrategy {
    pub fn new(config: TabuConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// One relocation per component: the first node of a shuffled order that
    /// differs from the component's current node and whose aggregate link
    /// capacity covers the component's total demand
    fn neighbors(
        &mut self,
        current: &ComponentMapping,
        app: &Application,
        nodes: &[String],
        state: &ResourceState,
    ) -> Vec<ComponentMapping> {
        let mut neighbors = Vec::new();
        let mut shuffled = nodes.to_vec();

        for (component_id, node_id) in current {
            let demand = app
                .component(component_id)
                .map_or(0.0, |c| c.total_bandwidth());
            shuffled.shuffle(&mut self.rng);

            let target = shuffled
                .iter()
                .find(|n| *n != node_id && state.outgoing_capacity(n) >= demand);
            if let Some(target) = target {
                let mut next = current.clone();
                next.insert(component_id.clone(), target.clone());
                neighbors.push(next);
            }
        }
        neighbors
    }

    fn score(&self, app: &Application, mapping: ComponentMapping, state: &ResourceState) -> Scored {
        let (cost, state) = overconsumption(app, &mapping, state);
        Scored {
            mapping,
            cost,
            state,
        }
    }
}

/// Initial assignment: components in degree order go to nodes in degree
/// order; each node's aggregate link capacity is a budget that every placed
/// component's total demand draws down, and the next node is used once the
/// budget is spent. Wraps around so every component gets a node.
pub fn initial_assignment(app: &Application, state: &ResourceState) -> ComponentMapping {
    let nodes = node_order(state);
    let mut mapping = ComponentMapping::new();
    if nodes.is_empty() {
        return mapping;
    }

    let mut budgets: Vec<f64> = nodes.iter().map(|n| state.outgoing_capacity(n)).collect();
    let mut idx = 0;
    for component in component_order(app) {
        mapping.insert(component.id.clone(), nodes[idx].clone());
        budgets[idx] -= component.total_bandwidth();
        if budgets[idx] <= 0.0 {
            idx = (idx + 1) % nodes.len();
        }
    }
    mapping
}

/// Percentage of `capacity` that `used + demand` goes over it, never negative
fn percent_over(used: f64, demand: f64, capacity: f64) -> f64 {
    let over = used + demand - capacity;
    if over <= 0.0 {
        0.0
    } else if capacity <= 0.0 {
        100.0
    } else {
        100.0 * over / capacity
    }
}

/// Replay `mapping` in component order and score the overconsumption.
///
/// A component the local check rejects is charged its cpu, memory and
/// aggregate bandwidth overshoot on its node. A component the applier
/// rejects is charged the average overshoot of the routes it needs, at
/// least [`MIN_ROUTE_PENALTY`]. The cost is the mean of the three resource
/// classes and is zero only when every component was applied.
pub fn overconsumption(
    app: &Application,
    mapping: &ComponentMapping,
    state: &ResourceState,
) -> (f64, ResourceState) {
    let mut current = state.snapshot();
    let mut placed = Assignment::new();
    let (mut cpu, mut memory, mut bandwidth) = (0.0, 0.0, 0.0);

    for (component_id, node_id) in mapping {
        let Some(component) = app.component(component_id) else {
            continue;
        };

        if fits(component, node_id, &current).is_err() {
            match current.node(node_id) {
                Some(node) => {
                    cpu += percent_over(
                        node.cpu_in_use as f64,
                        component.cpu as f64,
                        node.cpu_capacity as f64,
                    );
                    memory += percent_over(
                        node.memory_in_use as f64,
                        component.memory as f64,
                        node.memory_capacity as f64,
                    );
                    let capacity = current.outgoing_capacity(node_id);
                    let used = capacity - current.outgoing_remaining(node_id);
                    bandwidth += percent_over(used, component.total_bandwidth(), capacity);
                }
                None => bandwidth += 100.0,
            }
            continue;
        }

        match apply(node_id, component_id, app, &current, &placed) {
            Ok(next) => {
                current = next;
                placed.insert(&app.id, component_id, node_id);
            }
            Err(_) => {
                let mut pairs: Vec<(&str, &str, f64)> = Vec::new();
                for (dependency, demand) in &component.bandwidth {
                    if let Some(dep_node) = placed.node_of(&app.id, dependency) {
                        pairs.push((node_id.as_str(), dep_node, *demand));
                    }
                }
                for (dependent, demand) in app.dependents_of(component_id) {
                    if let Some(dep_node) = placed.node_of(&app.id, &dependent.id) {
                        pairs.push((dep_node, node_id.as_str(), demand));
                    }
                }

                let total: f64 = pairs
                    .iter()
                    .map(|(src, dst, demand)| match current.route(src, dst) {
                        Some(route) => {
                            let (remaining, _) = route.bottleneck(current.links());
                            percent_over(route.capacity - remaining, *demand, route.capacity)
                        }
                        None => 100.0,
                    })
                    .sum();
                let average = if pairs.is_empty() {
                    0.0
                } else {
                    total / pairs.len() as f64
                };
                bandwidth += average.max(MIN_ROUTE_PENALTY);
            }
        }
    }

    ((cpu + memory + bandwidth) / 3.0, current)
}

impl PlacementStrategy for TabuStrategy {
    fn name(&self) -> &'static str {
        "tabu-search"
    }

    fn schedule(&mut self, app: &Application, state: &ResourceState) -> SearchOutcome {
        let nodes = node_order(state);
        if nodes.is_empty() {
            return SearchOutcome::Exhausted { best_cost: None };
        }

        let mut tabu = TabuList::new(self.config.tabu_list_size);
        let initial = initial_assignment(app, state);
        let mut best = self.score(app, initial, state);
        let mut current = best.mapping.clone();
        tabu.push(current.clone());

        let mut steps = 0;
        while steps < self.config.max_steps && best.cost > 0.0 {
            steps += 1;

            let neighbors = self.neighbors(&current, app, &nodes, state);
            let mut iteration_best: Option<Scored> = None;
            for neighbor in neighbors {
                let scored = self.score(app, neighbor, state);
                if iteration_best.as_ref().map_or(true, |b| scored.cost < b.cost) {
                    iteration_best = Some(scored);
                }
            }
            let Some(candidate) = iteration_best else {
                debug!(step = steps, "No neighbors left");
                break;
            };

            let next = candidate.mapping.clone();
            if should_promote(candidate.cost, best.cost, &candidate.mapping, &tabu) {
                debug!(step = steps, cost = candidate.cost, "New best assignment");
                best = candidate;
            }
            tabu.push(next.clone());
            current = next;
        }

        info!(
            app = %app.id,
            steps = steps,
            cost = best.cost,
            tabu_size = tabu.len(),
            "Tabu search finished"
        );

        if best.cost == 0.0 {
            SearchOutcome::Complete {
                mapping: best.mapping,
                state: best.state,
            }
        } else {
            SearchOutcome::Exhausted {
                best_cost: Some(best.cost),
            }
        }
    }
}
