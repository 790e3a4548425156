//! CLI commands implementation

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use meshsched_core::loader::{load_application, load_topology};
use meshsched_core::{
    ComponentMapping, LinkBandwidth, MeshError, Node, ResourceState, Route, SchedulerConfig,
    StrategyKind,
};
use meshsched_scheduler::{PlacementRecord, Scheduler};
use serde::Serialize;
use tracing::info;

/// JSON report of a `schedule` run
#[derive(Debug, Serialize)]
pub struct ScheduleReport<'a> {
    pub app_id: &'a str,
    pub strategy: &'a str,
    pub elapsed_ms: f64,
    pub placement: Option<&'a PlacementRecord>,
    pub nodes: Vec<&'a Node>,
    pub links: &'a [LinkBandwidth],
    pub routes: &'a [Route],
}

/// Load the config file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(SchedulerConfig::default()),
    }
}

/// Apply command-line overrides on top of the loaded config
pub fn with_overrides(
    mut config: SchedulerConfig,
    strategy: Option<StrategyKind>,
    seed: Option<u64>,
) -> SchedulerConfig {
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(seed) = seed {
        config.annealing.seed = Some(seed);
        config.tabu.seed = Some(seed);
    }
    config
}

/// Node usage table
pub fn render_state(state: &ResourceState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:>10} {:>10} {:>12} {:>12}",
        "NODE", "CPU", "CPU USED", "MEMORY", "MEM USED"
    );
    let _ = writeln!(out, "{}", "-".repeat(64));
    for node in state.nodes() {
        let _ = writeln!(
            out,
            "{:<16} {:>10} {:>10} {:>12} {:>12}",
            node.id, node.cpu_capacity, node.cpu_in_use, node.memory_capacity, node.memory_in_use
        );
    }
    out
}

/// Link usage table
pub fn render_links(state: &ResourceState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {:<16} {:>12} {:>12}", "SRC", "DST", "CAPACITY", "IN USE");
    let _ = writeln!(out, "{}", "-".repeat(60));
    for link in state.links() {
        let _ = writeln!(
            out,
            "{:<16} {:<16} {:>12.3} {:>12.3}",
            link.src, link.dst, link.capacity, link.in_use
        );
    }
    out
}

/// Route usage table
pub fn render_routes(state: &ResourceState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<16} {:>6} {:>12} {:>12}",
        "ROUTE SRC", "ROUTE DST", "HOPS", "CAPACITY", "IN USE"
    );
    let _ = writeln!(out, "{}", "-".repeat(66));
    for route in state.routes() {
        let _ = writeln!(
            out,
            "{:<16} {:<16} {:>6} {:>12.3} {:>12.3}",
            route.src,
            route.dst,
            route.hops().len(),
            route.capacity,
            route.in_use
        );
    }
    out
}

/// Node, link and route tables separated by blank lines
pub fn render_usage(state: &ResourceState) -> String {
    format!(
        "{}\n{}\n{}",
        render_state(state),
        render_links(state),
        render_routes(state)
    )
}

fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// `AppId,ComponentId,NodeId` rows
pub fn render_mapping(app_id: &str, mapping: &ComponentMapping) -> String {
    let mut out = String::from("AppId,ComponentId,NodeId\n");
    for (component, node) in mapping {
        let _ = writeln!(out, "{},{},{}", app_id, component, node);
    }
    out
}

/// Place the application of `input` with the configured strategy
pub fn schedule(input: &Path, config: &SchedulerConfig, json: bool) -> Result<()> {
    let state = load_topology(input)?;
    let app = load_application(input)?;

    let mut scheduler = Scheduler::with_config(state, config);
    let start = Instant::now();
    let result = scheduler.schedule(&app);
    let elapsed_ms = millis_since(start);

    if json {
        let report = ScheduleReport {
            app_id: &app.id,
            strategy: scheduler.strategy_name(),
            elapsed_ms,
            placement: scheduler.placement(&app.id),
            nodes: scheduler.state().nodes().collect(),
            links: scheduler.state().links(),
            routes: scheduler.state().routes(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_usage(scheduler.state()));
        println!();
        if let Ok(mapping) = &result {
            print!("{}", render_mapping(&app.id, mapping));
        }
        println!("Elapsed: {:.3} ms", elapsed_ms);
    }

    result?;
    Ok(())
}

/// Run every strategy on independent copies of the same input
pub fn compare(input: &Path, config: &SchedulerConfig) -> Result<()> {
    let state = load_topology(input)?;
    let app = load_application(input)?;

    println!("{:<22} {:<14} {:>12}", "STRATEGY", "RESULT", "ELAPSED (ms)");
    println!("{}", "-".repeat(50));

    for kind in StrategyKind::ALL {
        let mut run_config = config.clone();
        run_config.strategy = kind;
        let mut scheduler = Scheduler::with_config(state.snapshot(), &run_config);

        let start = Instant::now();
        let result = scheduler.schedule(&app);
        let elapsed_ms = millis_since(start);

        let outcome = match &result {
            Ok(_) => "placed",
            Err(MeshError::Unschedulable { .. }) => "unschedulable",
            Err(_) => "error",
        };
        info!(strategy = %kind, outcome = outcome, elapsed_ms = elapsed_ms, "Strategy finished");
        println!("{:<22} {:<14} {:>12.3}", kind, outcome, elapsed_ms);
    }

    Ok(())
}

/// Print nodes, links and routes of `input`
pub fn inspect(input: &Path) -> Result<()> {
    let state = load_topology(input)?;
    print!("{}", render_usage(&state));
    Ok(())
}
