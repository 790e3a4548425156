//! Integration tests for meshsched-scheduler

use std::fs;

use meshsched_core::loader::{load_application, load_topology};
use meshsched_core::{
    Application, Assignment, Component, LinkBandwidth, MeshError, Node, ResourceState,
    SchedulerConfig, StrategyKind,
};
use meshsched_scheduler::{apply, strategy_for, DeploymentState, Scheduler, SearchOutcome};
use tempfile::TempDir;

fn full_mesh(bw: f64) -> ResourceState {
    let ids = ["n1", "n2", "n3"];
    let mut state = ResourceState::new();
    for id in ids {
        state.add_node(Node::new(id, 4, 4)).unwrap();
    }
    for src in ids {
        for dst in ids {
            if src != dst {
                state.add_link(LinkBandwidth::new(src, dst, bw)).unwrap();
            }
        }
    }
    state.add_direct_routes().unwrap();
    state
}

fn chain_app() -> Application {
    Application::new("chain")
        .with_component(Component::new("c1", 1, 1).with_dependency("c2", 3.0))
        .with_component(Component::new("c2", 1, 1).with_dependency("c3", 3.0))
        .with_component(Component::new("c3", 1, 1))
}

fn seeded_config(kind: StrategyKind) -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.strategy = kind;
    config.annealing.seed = Some(7);
    config.tabu.seed = Some(7);
    config
}

fn assert_conserved(state: &ResourceState) {
    assert!(state.check_node_conservation().is_ok());
    for link in state.links() {
        assert!(
            link.in_use <= link.capacity,
            "link {} -> {} over capacity",
            link.src,
            link.dst
        );
    }
}

#[test]
fn test_chain_placed_by_backtracking_strategies() {
    for kind in [StrategyKind::Optimal, StrategyKind::MaxBw] {
        let mut scheduler = Scheduler::with_config(full_mesh(10.0), &seeded_config(kind));
        let mapping = scheduler.schedule(&chain_app()).unwrap();

        assert_eq!(mapping.len(), 3, "{} left components unplaced", kind);
        assert_ne!(mapping["c1"], mapping["c2"]);
        assert_ne!(mapping["c2"], mapping["c3"]);
        assert_eq!(scheduler.deployment_state("chain"), Some(DeploymentState::Deployed));
        assert_conserved(scheduler.state());

        let cpu: u64 = scheduler.state().nodes().map(|n| n.cpu_in_use).sum();
        assert_eq!(cpu, 3);
    }
}

#[test]
fn test_chain_rejected_by_every_strategy_when_links_too_thin() {
    for kind in StrategyKind::ALL {
        let mut scheduler = Scheduler::with_config(full_mesh(2.0), &seeded_config(kind));
        let before = scheduler.state().clone();

        let result = scheduler.schedule(&chain_app());

        assert!(
            matches!(result, Err(MeshError::Unschedulable { .. })),
            "{} placed an infeasible chain",
            kind
        );
        assert_eq!(scheduler.state(), &before);
        assert_eq!(scheduler.deployment_state("chain"), Some(DeploymentState::Waiting));
        assert!(scheduler.assignment_for("chain").is_none());
    }
}

#[test]
fn test_strategies_never_touch_their_input() {
    let config = seeded_config(StrategyKind::MaxBw);
    for kind in StrategyKind::ALL {
        let mut state = full_mesh(2.0);
        let mut strategy = strategy_for(kind, &config);
        strategy.initialize(&mut state);
        let before = state.snapshot();

        let outcome = strategy.schedule(&chain_app(), &state);

        assert!(!outcome.is_complete());
        assert_eq!(state, before);
    }
}

#[test]
fn test_successful_outcome_carries_reservations() {
    let config = seeded_config(StrategyKind::Optimal);
    let mut state = full_mesh(10.0);
    let mut strategy = strategy_for(StrategyKind::Optimal, &config);
    strategy.initialize(&mut state);

    match strategy.schedule(&chain_app(), &state) {
        SearchOutcome::Complete {
            mapping,
            state: result,
        } => {
            let forward = result.route(&mapping["c1"], &mapping["c2"]).unwrap();
            assert!(forward.in_use >= 3.0);
            assert!(state.links().iter().all(|l| l.in_use == 0.0));
        }
        other => panic!("expected a placement, got {:?}", other),
    }
}

#[test]
fn test_reservation_is_symmetric() {
    let mut state = full_mesh(10.0);
    state.initialize_routes();
    let app = Application::new("pair")
        .with_component(Component::new("a", 1, 1).with_dependency("b", 4.0))
        .with_component(Component::new("b", 1, 1));
    let mut assignment = Assignment::new();
    assignment.insert("pair", "b", "n3");

    let next = apply("n1", "a", &app, &state, &assignment).unwrap();

    let forward = next.route("n1", "n3").unwrap();
    let reverse = next.route("n3", "n1").unwrap();
    assert_eq!(forward.in_use - state.route("n1", "n3").unwrap().in_use, 4.0);
    assert_eq!(reverse.in_use - state.route("n3", "n1").unwrap().in_use, 4.0);
    assert_eq!(forward.bottleneck(next.links()).0, 6.0);
    assert_eq!(reverse.bottleneck(next.links()).0, 6.0);
}

#[test]
fn test_schedule_from_csv_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(
        dir.join("nodes.csv"),
        "nodeId,cpu,memory_mb\nedge,2,2048\ncore,8,8192\nstore,4,4096\n",
    )
    .unwrap();
    fs::write(
        dir.join("links.csv"),
        "src,dst,bw_mbps\nedge,core,100\ncore,edge,100\ncore,store,40\nstore,core,40\n",
    )
    .unwrap();
    fs::write(
        dir.join("paths.csv"),
        "src,dst,next_hop\nedge,store,core\nstore,edge,core\n",
    )
    .unwrap();
    fs::write(
        dir.join("app.csv"),
        "name,cpu,memory\nfrontend,2,512\napi,4,1024\ndb,4,2048\n",
    )
    .unwrap();
    fs::write(
        dir.join("deps.csv"),
        "src,dst,bw_mbps\nfrontend,api,20\napi,db,30\n",
    )
    .unwrap();
    fs::write(dir.join("scheduler.toml"), "strategy = \"optimal\"\n").unwrap();

    let config = SchedulerConfig::from_file(&dir.join("scheduler.toml")).unwrap();
    let state = load_topology(dir).unwrap();
    let app = load_application(dir).unwrap();

    let mut scheduler = Scheduler::with_config(state, &config);
    let mapping = scheduler.schedule(&app).unwrap();

    assert_eq!(mapping["frontend"], "edge");
    assert_eq!(mapping["api"], "core");
    assert_eq!(mapping["db"], "store");
    assert_eq!(scheduler.placement(&app.id).unwrap().strategy, "optimal");
    assert_conserved(scheduler.state());
}

#[test]
fn test_dependent_components_share_node_over_loopback() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("nodes.csv"), "nodeId,cpu,memory_mb\nsolo,4,4096\n").unwrap();
    fs::write(dir.join("links.csv"), "src,dst,bw_mbps\nsolo,solo,100\n").unwrap();
    fs::write(dir.join("paths.csv"), "src,dst,next_hop\nsolo,solo,solo\n").unwrap();
    fs::write(dir.join("app.csv"), "name,cpu,memory\nc1,1,512\nc2,1,512\n").unwrap();
    fs::write(dir.join("deps.csv"), "src,dst,bw_mbps\nc1,c2,3\n").unwrap();

    let app = load_application(dir).unwrap();
    for kind in StrategyKind::ALL {
        let state = load_topology(dir).unwrap();
        let mut scheduler = Scheduler::with_config(state, &seeded_config(kind));

        let mapping = scheduler.schedule(&app).unwrap();

        assert_eq!(mapping["c1"], "solo", "{} misplaced c1", kind);
        assert_eq!(mapping["c2"], "solo", "{} misplaced c2", kind);
        let route = scheduler.state().route("solo", "solo").unwrap();
        assert_eq!(route.in_use, 3.0, "{} reserved the loopback wrongly", kind);
        assert_conserved(scheduler.state());
    }
}
