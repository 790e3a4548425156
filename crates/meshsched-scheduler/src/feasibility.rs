//! Local and global feasibility checks
//!
//! [`fits`] is the cheap admission filter used by the heuristic strategies:
//! it looks at one node only and treats bandwidth as the sum over the node's
//! outgoing links. [`verify`] re-checks a whole (partial) assignment against
//! a baseline state, including the route between every pair of dependent
//! components. The two are not equivalent; a placement admitted by `fits`
//! can still be rejected by `verify`.

use std::collections::{BTreeMap, HashMap};

use meshsched_core::{Application, Assignment, Component, ResourceError, ResourceState};

/// Check that `node_id` has room for `component` right now
pub fn fits(component: &Component, node_id: &str, state: &ResourceState) -> Result<(), ResourceError> {
    let node = state
        .node(node_id)
        .ok_or_else(|| ResourceError::NotFound(format!("node {}", node_id)))?;

    if component.cpu > node.cpu_available() {
        return Err(ResourceError::InsufficientCpu {
            node: node_id.to_string(),
        });
    }
    if component.memory > node.memory_available() {
        return Err(ResourceError::InsufficientMemory {
            node: node_id.to_string(),
        });
    }
    if component.total_bandwidth() > state.outgoing_remaining(node_id) {
        return Err(ResourceError::InsufficientBandwidth {
            node: node_id.to_string(),
        });
    }
    Ok(())
}

/// Check every placed component of `app` against `baseline`.
///
/// Node usage is projected as the baseline usage plus the demand of every
/// component assigned to the node. Route usage is projected as the cached
/// route usage plus, for every dependency whose both ends are placed, the
/// demand on the forward route and the same demand on the reverse route. A
/// loopback route carries the demand once.
pub fn verify(
    assignment: &Assignment,
    app: &Application,
    baseline: &ResourceState,
) -> Result<(), ResourceError> {
    let mapping = assignment
        .app(&app.id)
        .ok_or_else(|| ResourceError::NotFound(format!("application {}", app.id)))?;

    let mut cpu: HashMap<&str, u64> = HashMap::new();
    let mut memory: HashMap<&str, u64> = HashMap::new();
    let mut routes: BTreeMap<(&str, &str), f64> = BTreeMap::new();

    for (component_id, node_id) in mapping {
        let component = app
            .component(component_id)
            .ok_or_else(|| ResourceError::NotFound(format!("component {}", component_id)))?;
        let node = baseline
            .node(node_id)
            .ok_or_else(|| ResourceError::NotFound(format!("node {}", node_id)))?;

        let used_cpu = cpu.entry(node_id.as_str()).or_insert(node.cpu_in_use);
        *used_cpu = used_cpu.saturating_add(component.cpu);
        if *used_cpu > node.cpu_capacity {
            return Err(ResourceError::InsufficientCpu {
                node: node_id.clone(),
            });
        }

        let used_memory = memory.entry(node_id.as_str()).or_insert(node.memory_in_use);
        *used_memory = used_memory.saturating_add(component.memory);
        if *used_memory > node.memory_capacity {
            return Err(ResourceError::InsufficientMemory {
                node: node_id.clone(),
            });
        }

        for (dependency, demand) in &component.bandwidth {
            if dependency == component_id {
                continue;
            }
            if let Some(dep_node) = mapping.get(dependency) {
                *routes.entry((node_id.as_str(), dep_node.as_str())).or_insert(0.0) += demand;
                if dep_node != node_id {
                    *routes.entry((dep_node.as_str(), node_id.as_str())).or_insert(0.0) += demand;
                }
            }
        }
    }

    for ((src, dst), demand) in routes {
        let route = baseline
            .route(src, dst)
            .ok_or_else(|| ResourceError::path(src, dst))?;
        if route.in_use + demand > route.capacity {
            return Err(ResourceError::path(src, dst));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsched_core::{LinkBandwidth, Node};

    fn pair_state(bw: f64) -> ResourceState {
        let mut state = ResourceState::new();
        state.add_node(Node::new("n1", 2, 2)).unwrap();
        state.add_node(Node::new("n2", 2, 2)).unwrap();
        state.add_link(LinkBandwidth::new("n1", "n2", bw)).unwrap();
        state.add_link(LinkBandwidth::new("n2", "n1", bw)).unwrap();
        state.add_direct_routes().unwrap();
        state.initialize_routes();
        state
    }

    fn pair_app(bw: f64) -> Application {
        Application::new("app")
            .with_component(Component::new("c1", 1, 1).with_dependency("c2", bw))
            .with_component(Component::new("c2", 1, 1))
    }

    #[test]
    fn test_fits_checks_cpu_then_memory_then_bandwidth() {
        let state = pair_state(5.0);

        assert!(fits(&Component::new("c", 2, 2), "n1", &state).is_ok());
        assert_eq!(
            fits(&Component::new("c", 3, 9), "n1", &state),
            Err(ResourceError::InsufficientCpu {
                node: "n1".to_string()
            })
        );
        assert_eq!(
            fits(&Component::new("c", 1, 3), "n1", &state),
            Err(ResourceError::InsufficientMemory {
                node: "n1".to_string()
            })
        );
        let heavy = Component::new("c", 1, 1).with_dependency("d", 6.0);
        assert_eq!(
            fits(&heavy, "n1", &state),
            Err(ResourceError::InsufficientBandwidth {
                node: "n1".to_string()
            })
        );
    }

    #[test]
    fn test_fits_unknown_node() {
        let state = pair_state(5.0);
        assert!(matches!(
            fits(&Component::new("c", 1, 1), "n9", &state),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_verify_route_capacity() {
        let state = pair_state(5.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "n1");
        assignment.insert("app", "c2", "n2");

        assert!(verify(&assignment, &pair_app(5.0), &state).is_ok());
        assert_eq!(
            verify(&assignment, &pair_app(5.5), &state),
            Err(ResourceError::path("n1", "n2"))
        );
    }

    #[test]
    fn test_verify_projects_node_usage() {
        let state = pair_state(5.0);
        let app = Application::new("app")
            .with_component(Component::new("c1", 1, 1))
            .with_component(Component::new("c2", 1, 1))
            .with_component(Component::new("c3", 1, 1));
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "n1");
        assignment.insert("app", "c2", "n1");
        assert!(verify(&assignment, &app, &state).is_ok());

        assignment.insert("app", "c3", "n1");
        assert_eq!(
            verify(&assignment, &app, &state),
            Err(ResourceError::InsufficientCpu {
                node: "n1".to_string()
            })
        );
    }

    #[test]
    fn test_verify_colocated_dependency_has_no_route() {
        let state = pair_state(5.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "n1");
        assignment.insert("app", "c2", "n1");

        assert_eq!(
            verify(&assignment, &pair_app(1.0), &state),
            Err(ResourceError::path("n1", "n1"))
        );
    }

    #[test]
    fn test_verify_colocated_dependency_over_loopback() {
        let mut state = ResourceState::new();
        state.add_node(Node::new("solo", 4, 4)).unwrap();
        state.add_link(LinkBandwidth::new("solo", "solo", 5.0)).unwrap();
        state.add_direct_routes().unwrap();
        state.initialize_routes();
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "solo");
        assignment.insert("app", "c2", "solo");

        assert!(verify(&assignment, &pair_app(4.0), &state).is_ok());
        assert_eq!(
            verify(&assignment, &pair_app(6.0), &state),
            Err(ResourceError::path("solo", "solo"))
        );
        assert!(fits(&Component::new("c", 1, 1).with_dependency("d", 5.0), "solo", &state).is_ok());
    }

    #[test]
    fn test_verify_rejects_huge_demands_without_overflow() {
        let state = pair_state(5.0);
        let app = Application::new("app")
            .with_component(Component::new("c1", 1, 1))
            .with_component(Component::new("c2", u64::MAX, 1));
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "n1");
        assignment.insert("app", "c2", "n1");

        assert_eq!(
            verify(&assignment, &app, &state),
            Err(ResourceError::InsufficientCpu {
                node: "n1".to_string()
            })
        );
    }

    #[test]
    fn test_verify_ignores_unplaced_dependencies() {
        let state = pair_state(1.0);
        let mut assignment = Assignment::new();
        assignment.insert("app", "c1", "n1");

        assert!(verify(&assignment, &pair_app(9.0), &state).is_ok());
    }
}
