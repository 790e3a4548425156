//! Simulated annealing over complete assignments
//!
//! The search state is always a complete mapping. Its cost is the number of
//! components that cannot be placed when the mapping is replayed in order,
//! so a zero-cost mapping is directly committable.

use meshsched_core::{AnnealingConfig, Application, ComponentMapping, ResourceState};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::applier::replay;
use crate::ordering::{component_order, node_order};
use crate::strategy::{PlacementStrategy, SearchOutcome};

/// Metropolis acceptance rule.
///
/// A neighbor that lowers the cost is always accepted. Otherwise it is
/// accepted when `draw`, uniform in `[0, 1)`, falls below
/// `exp(-delta / temperature)`.
pub fn accepts(delta: f64, temperature: f64, draw: f64) -> bool {
    if delta < 0.0 {
        return true;
    }
    draw < (-delta / temperature).exp()
}

/// Simulated annealing strategy
pub struct AnnealingStrategy {
    config: AnnealingConfig,
    rng: StdRng,
}

impl AnnealingStrategy {
    pub fn new(config: AnnealingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Swap the nodes of two distinct random components. A lone component,
    /// or a pair that already shares a node, is moved to a random node
    /// instead.
    fn neighbor(
        &mut self,
        current: &ComponentMapping,
        components: &[String],
        nodes: &[String],
    ) -> ComponentMapping {
        let mut next = current.clone();
        let picked: Vec<&String> = components.choose_multiple(&mut self.rng, 2).collect();

        match picked.as_slice() {
            [first, second] if next.get(*first) != next.get(*second) => {
                let first_node = next.get(*first).cloned().unwrap_or_default();
                let second_node = next.get(*second).cloned().unwrap_or_default();
                next.insert((*first).clone(), second_node);
                next.insert((*second).clone(), first_node);
            }
            [first, ..] => {
                if let Some(node) = nodes.choose(&mut self.rng) {
                    next.insert((*first).clone(), node.clone());
                }
            }
            [] => {}
        }
        next
    }
}

impl PlacementStrategy for AnnealingStrategy {
    fn name(&self) -> &'static str {
        "simulated-annealing"
    }

    fn schedule(&mut self, app: &Application, state: &ResourceState) -> SearchOutcome {
        let ordered = component_order(app);
        let nodes = node_order(state);
        if nodes.is_empty() {
            return SearchOutcome::Exhausted { best_cost: None };
        }

        let mut current: ComponentMapping = ordered
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), nodes[i % nodes.len()].clone()))
            .collect();
        let components: Vec<String> = ordered.iter().map(|c| c.id.clone()).collect();

        let initial = replay(app, &current, state);
        let mut current_cost = initial.violations;
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut best_state = initial.state;

        let mut temperature = self.config.initial_temperature;
        let mut iterations = 0usize;
        while best_cost > 0 && temperature >= self.config.final_temperature {
            let candidate = self.neighbor(&current, &components, &nodes);
            let result = replay(app, &candidate, state);
            let delta = result.violations as f64 - current_cost as f64;
            let draw: f64 = self.rng.gen();

            if accepts(delta, temperature, draw) {
                current_cost = result.violations;
                current = candidate;
                if current_cost < best_cost {
                    debug!(cost = current_cost, temperature = temperature, "New best assignment");
                    best_cost = current_cost;
                    best = current.clone();
                    best_state = result.state;
                }
            }

            temperature *= self.config.cooling_factor;
            iterations += 1;
        }

        info!(
            app = %app.id,
            iterations = iterations,
            violations = best_cost,
            "Simulated annealing finished"
        );

        if best_cost == 0 {
            SearchOutcome::Complete {
                mapping: best,
                state: best_state,
            }
        } else {
            SearchOutcome::Exhausted {
                best_cost: Some(best_cost as f64),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsched_core::{Component, LinkBandwidth, Node};

    fn seeded() -> AnnealingStrategy {
        AnnealingStrategy::new(AnnealingConfig {
            seed: Some(42),
            ..AnnealingConfig::default()
        })
    }

    #[test]
    fn test_improving_neighbor_always_accepted() {
        for temperature in [1.0e-9, 0.1, 1.0, 5.0e4] {
            for draw in [0.0, 0.5, 0.999_999] {
                assert!(accepts(-1.0, temperature, draw));
                assert!(accepts(-0.001, temperature, draw));
            }
        }
    }

    #[test]
    fn test_worse_neighbor_depends_on_temperature() {
        assert!(accepts(1.0, 5.0e4, 0.99));
        assert!(!accepts(1.0, 0.1, 0.01));
        assert!(accepts(0.0, 0.1, 0.5));
    }

    #[test]
    fn test_neighbor_swaps_two_components() {
        let mut strategy = seeded();
        let mut current = ComponentMapping::new();
        current.insert("c1".to_string(), "n1".to_string());
        current.insert("c2".to_string(), "n2".to_string());
        let components = vec!["c1".to_string(), "c2".to_string()];
        let nodes = vec!["n1".to_string(), "n2".to_string()];

        let next = strategy.neighbor(&current, &components, &nodes);
        assert_eq!(next["c1"], "n2");
        assert_eq!(next["c2"], "n1");
    }

    #[test]
    fn test_neighbor_relocates_single_component() {
        let mut strategy = seeded();
        let mut current = ComponentMapping::new();
        current.insert("c1".to_string(), "n1".to_string());
        let nodes = vec!["n1".to_string(), "n2".to_string(), "n3".to_string()];

        let next = strategy.neighbor(&current, &["c1".to_string()], &nodes);
        assert_eq!(next.len(), 1);
        assert!(nodes.contains(&next["c1"]));
    }

    #[test]
    fn test_moves_away_from_unrouted_start() {
        // round-robin starts c3 on n3, which has no route to c1
        let mut state = ResourceState::new();
        for id in ["n1", "n2", "n3"] {
            state.add_node(Node::new(id, 4, 4)).unwrap();
        }
        state.add_link(LinkBandwidth::new("n1", "n2", 10.0)).unwrap();
        state.add_link(LinkBandwidth::new("n2", "n1", 10.0)).unwrap();
        state.add_direct_routes().unwrap();
        let app = Application::new("app")
            .with_component(Component::new("c1", 1, 1).with_dependency("c3", 3.0))
            .with_component(Component::new("c2", 1, 1))
            .with_component(Component::new("c3", 1, 1));

        let mut strategy = seeded();
        strategy.initialize(&mut state);
        match strategy.schedule(&app, &state) {
            SearchOutcome::Complete { mapping, state: result } => {
                assert_ne!(mapping["c1"], "n3");
                assert_ne!(mapping["c3"], "n3");
                assert_ne!(mapping["c1"], mapping["c3"]);
                assert!(result.check_node_conservation().is_ok());
                assert_eq!(result.route("n1", "n2").unwrap().in_use, 3.0);
            }
            other => panic!("expected a placement, got {:?}", other),
        }
    }

    #[test]
    fn test_reports_best_violation_count() {
        let mut state = ResourceState::new();
        state.add_node(Node::new("n1", 1, 1)).unwrap();
        let app = Application::new("app")
            .with_component(Component::new("c1", 1, 1))
            .with_component(Component::new("c2", 1, 1));

        let mut strategy = AnnealingStrategy::new(AnnealingConfig {
            initial_temperature: 10.0,
            seed: Some(1),
            ..AnnealingConfig::default()
        });
        strategy.initialize(&mut state);
        match strategy.schedule(&app, &state) {
            SearchOutcome::Exhausted { best_cost } => assert_eq!(best_cost, Some(1.0)),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
