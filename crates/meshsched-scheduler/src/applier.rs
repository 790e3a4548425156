//! Assignment applier
//!
//! The only code path that reserves node capacity and bandwidth. Every call
//! works on a fresh snapshot and hands it back only when the whole placement
//! succeeded, so callers keep their own state untouched on error.

use meshsched_core::{Application, Assignment, ComponentMapping, ResourceError, ResourceState};
use tracing::trace;

use crate::feasibility::fits;

/// Place `component_id` on `node_id` and reserve its bandwidth towards every
/// placed sibling it talks to.
///
/// Demands are reserved between the component's node and the node of each
/// already placed dependency, and between the node of each already placed
/// dependent and the component's node. Each reservation covers the route and
/// the reverse route. The component's own entry in `assignment`, if any, is
/// ignored.
pub fn apply(
    node_id: &str,
    component_id: &str,
    app: &Application,
    state: &ResourceState,
    assignment: &Assignment,
) -> Result<ResourceState, ResourceError> {
    let component = app
        .component(component_id)
        .ok_or_else(|| ResourceError::NotFound(format!("component {}", component_id)))?;

    let mut next = state.snapshot();
    let node = next
        .node_mut(node_id)
        .ok_or_else(|| ResourceError::NotFound(format!("node {}", node_id)))?;
    node.cpu_in_use = node.cpu_in_use.saturating_add(component.cpu);
    node.memory_in_use = node.memory_in_use.saturating_add(component.memory);

    for (dependency, demand) in &component.bandwidth {
        if dependency == component_id {
            continue;
        }
        if let Some(dep_node) = assignment.node_of(&app.id, dependency) {
            reserve_pair(&mut next, node_id, dep_node, *demand)?;
        }
    }

    for (dependent, demand) in app.dependents_of(component_id) {
        if dependent.id == component_id {
            continue;
        }
        if let Some(placed) = assignment.node_of(&app.id, &dependent.id) {
            reserve_pair(&mut next, placed, node_id, demand)?;
        }
    }

    Ok(next)
}

/// Reserve `demand` on `src -> dst` and on `dst -> src`, both or neither.
/// A loopback route is its own reverse and carries the demand once.
fn reserve_pair(
    state: &mut ResourceState,
    src: &str,
    dst: &str,
    demand: f64,
) -> Result<(), ResourceError> {
    if src == dst {
        check_route(state, src, dst, demand)?;
        return reserve(state, src, dst, demand);
    }
    check_route(state, src, dst, demand)?;
    check_route(state, dst, src, demand)?;
    reserve(state, src, dst, demand)?;
    reserve(state, dst, src, demand)
}

fn check_route(state: &ResourceState, src: &str, dst: &str, demand: f64) -> Result<(), ResourceError> {
    let route = state
        .route(src, dst)
        .ok_or_else(|| ResourceError::path(src, dst))?;
    let (remaining, _) = route.bottleneck(state.links());
    if remaining < demand {
        return Err(ResourceError::path(src, dst));
    }
    Ok(())
}

fn reserve(state: &mut ResourceState, src: &str, dst: &str, demand: f64) -> Result<(), ResourceError> {
    let (route, links) = state
        .route_with_links_mut(src, dst)
        .ok_or_else(|| ResourceError::path(src, dst))?;
    let (_, hop) = route.bottleneck(links);
    let reserved = links[hop.0].in_use + demand;
    route.set_bandwidth(reserved, links);
    let hops = route.hops().to_vec();

    trace!(src = %src, dst = %dst, reserved = reserved, "Reserved route bandwidth");

    for link in hops {
        state.resync_routes(link);
    }
    Ok(())
}

/// Result of replaying a complete mapping component by component
#[derive(Debug, Clone)]
pub struct Replay {
    /// State after every component that could be applied was applied
    pub state: ResourceState,
    /// Components that were applied
    pub placed: Assignment,
    /// Components rejected by the local check or by the applier
    pub violations: usize,
}

/// Apply a complete mapping in component order, skipping every component
/// whose placement fails. Later components only see reservations made by
/// earlier components that were applied.
pub fn replay(app: &Application, mapping: &ComponentMapping, state: &ResourceState) -> Replay {
    let mut current = state.snapshot();
    let mut placed = Assignment::new();
    let mut violations = 0;

    for (component_id, node_id) in mapping {
        let Some(component) = app.component(component_id) else {
            violations += 1;
            continue;
        };
        let result = fits(component, node_id, &current)
            .and_then(|_| apply(node_id, component_id, app, &current, &placed));
        match result {
            Ok(next) => {
                current = next;
                placed.insert(&app.id, component_id, node_id);
            }
            Err(e) => {
                trace!(component = %component_id, node = %node_id, error = %e, "Replay violation");
                violations += 1;
            }
        }
    }

    Replay {
        state: current,
        placed,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsched_core::{Component, LinkBandwidth, Node};

    fn line_state(ab: f64, bc: f64) -> ResourceState {
        let mut state = ResourceState::new();
        for id in ["a", "b", "c"] {
            state.add_node(Node::new(id, 4, 4)).unwrap();
        }
        state.add_link(LinkBandwidth::new("a", "b", ab)).unwrap();
        state.add_link(LinkBandwidth::new("b", "a", ab)).unwrap();
        state.add_link(LinkBandwidth::new("b", "c", bc)).unwrap();
        state.add_link(LinkBandwidth::new("c", "b", bc)).unwrap();
        state.add_direct_routes().unwrap();
        state.add_route(&["a", "b", "c"]).unwrap();
        state.add_route(&["c", "b", "a"]).unwrap();
        state.initialize_routes();
        state
    }

    fn pair_app(bw: f64) -> Application {
        Application::new("app")
            .with_component(Component::new("c1", 1, 2).with_dependency("c2", bw))
            .with_component(Component::new("c2", 1, 1))
    }

    #[test]
    fn test_apply_reserves_node_capacity() {
        let state = line_state(10.0, 10.0);
        let next = apply("a", "c1", &pair_app(3.0), &state, &Assignment::new()).unwrap();

        let node = next.node("a").unwrap();
        assert_eq!(node.cpu_in_use, 1);
        assert_eq!(node.memory_in_use, 2);
        assert!(next.links().iter().all(|l| l.in_use == 0.0));
        assert_eq!(state.node("a").unwrap().cpu_in_use, 0);
    }

    #[test]
    fn test_apply_reserves_forward_and_reverse_route() {
        let state = line_state(10.0, 5.0);
        let app = pair_app(3.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c2", "c");

        let next = apply("a", "c1", &app, &state, &assignment).unwrap();

        let forward = next.route("a", "c").unwrap();
        let reverse = next.route("c", "a").unwrap();
        assert_eq!(forward.in_use, 3.0);
        assert_eq!(reverse.in_use, 3.0);
        assert_eq!(forward.bottleneck(next.links()).0, 2.0);
        assert_eq!(reverse.bottleneck(next.links()).0, 2.0);
        // routes sharing a hop follow the reservation
        assert_eq!(next.route("a", "b").unwrap().in_use, 3.0);
        assert_eq!(next.route("b", "a").unwrap().in_use, 3.0);
    }

    #[test]
    fn test_apply_reserves_for_placed_dependents() {
        let state = line_state(10.0, 10.0);
        let app = pair_app(4.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "a");

        let next = apply("b", "c2", &app, &state, &assignment).unwrap();
        assert_eq!(next.route("a", "b").unwrap().in_use, 4.0);
        assert_eq!(next.route("b", "a").unwrap().in_use, 4.0);
        assert_eq!(next.node("b").unwrap().cpu_in_use, 1);
    }

    #[test]
    fn test_apply_rejects_short_bottleneck() {
        let state = line_state(10.0, 4.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c2", "c");

        let result = apply("a", "c1", &pair_app(5.0), &state, &assignment);
        assert_eq!(result, Err(ResourceError::path("a", "c")));
    }

    #[test]
    fn test_apply_requires_a_route_between_nodes() {
        let state = line_state(10.0, 10.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c2", "a");

        let result = apply("a", "c1", &pair_app(1.0), &state, &assignment);
        assert_eq!(result, Err(ResourceError::path("a", "a")));
    }

    #[test]
    fn test_apply_reserves_loopback_once() {
        let mut state = ResourceState::new();
        state.add_node(Node::new("solo", 4, 4)).unwrap();
        state.add_link(LinkBandwidth::new("solo", "solo", 5.0)).unwrap();
        state.add_direct_routes().unwrap();
        state.initialize_routes();
        let mut assignment = Assignment::new();
        assignment.insert("app", "c2", "solo");

        let next = apply("solo", "c1", &pair_app(4.0), &state, &assignment).unwrap();

        let route = next.route("solo", "solo").unwrap();
        assert_eq!(route.in_use, 4.0);
        assert_eq!(route.bottleneck(next.links()).0, 1.0);
        assert!(apply("solo", "c1", &pair_app(6.0), &state, &assignment).is_err());
    }

    #[test]
    fn test_apply_saturates_node_usage() {
        let mut state = line_state(10.0, 10.0);
        state.node_mut("a").unwrap().cpu_in_use = 1;
        let app = Application::new("app").with_component(Component::new("huge", u64::MAX, u64::MAX));

        let next = apply("a", "huge", &app, &state, &Assignment::new()).unwrap();
        let node = next.node("a").unwrap();
        assert_eq!(node.cpu_in_use, u64::MAX);
        assert_eq!(node.memory_in_use, u64::MAX);
        assert!(next.check_node_conservation().is_err());
    }

    #[test]
    fn test_apply_ignores_own_entry() {
        let state = line_state(10.0, 10.0);
        let app = Application::new("app")
            .with_component(Component::new("c1", 1, 1).with_dependency("c1", 2.0));
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "a");

        assert!(apply("a", "c1", &app, &state, &assignment).is_ok());
    }

    #[test]
    fn test_replay_counts_violations() {
        let state = line_state(10.0, 10.0);
        let app = pair_app(3.0);

        let mut mapping = ComponentMapping::new();
        mapping.insert("c1".to_string(), "a".to_string());
        mapping.insert("c2".to_string(), "b".to_string());
        let replay_ok = replay(&app, &mapping, &state);
        assert_eq!(replay_ok.violations, 0);
        assert_eq!(replay_ok.placed.placed_count("app"), 2);
        assert_eq!(replay_ok.state.route("a", "b").unwrap().in_use, 3.0);

        mapping.insert("c2".to_string(), "a".to_string());
        let replay_bad = replay(&app, &mapping, &state);
        assert_eq!(replay_bad.violations, 1);
        assert_eq!(replay_bad.placed.node_of("app", "c2"), None);
    }
}
