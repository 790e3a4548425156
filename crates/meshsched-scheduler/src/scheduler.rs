//! Main scheduler logic

use chrono::{DateTime, Utc};
use meshsched_core::{
    Application, Assignment, ComponentMapping, MeshError, MeshResult, ResourceState,
    SchedulerConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::strategy::{build_strategy, PlacementStrategy, SearchOutcome};

/// Deployment state of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Every component is placed and its resources are reserved
    Deployed,
    /// The last scheduling attempt found no placement
    Waiting,
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentState::Deployed => write!(f, "deployed"),
            DeploymentState::Waiting => write!(f, "waiting"),
        }
    }
}

/// A committed placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub app_id: String,
    /// Strategy that produced the placement
    pub strategy: String,
    pub mapping: ComponentMapping,
    pub placed_at: DateTime<Utc>,
}

/// Scheduler owns the committed resource state and places applications on it
pub struct Scheduler {
    /// Committed nodes, links and routes
    state: ResourceState,
    /// Search strategy
    strategy: Box<dyn PlacementStrategy>,
    /// Committed component placements of every deployed application
    assignments: Assignment,
    /// Deployment state indexed by application id
    deployments: BTreeMap<String, DeploymentState>,
    /// Placement details indexed by application id
    placements: BTreeMap<String, PlacementRecord>,
}

impl Scheduler {
    /// Create a scheduler over `state` using `strategy`
    pub fn new(mut state: ResourceState, mut strategy: Box<dyn PlacementStrategy>) -> Self {
        strategy.initialize(&mut state);

        info!(
            strategy = strategy.name(),
            nodes = state.node_count(),
            links = state.links().len(),
            routes = state.routes().len(),
            "Scheduler initialized"
        );

        Self {
            state,
            strategy,
            assignments: Assignment::new(),
            deployments: BTreeMap::new(),
            placements: BTreeMap::new(),
        }
    }

    /// Create a scheduler with the strategy selected in `config`
    pub fn with_config(state: ResourceState, config: &SchedulerConfig) -> Self {
        Self::new(state, build_strategy(config))
    }

    /// Place every component of `app`.
    ///
    /// On success the new reservations are committed and the mapping is
    /// returned. On failure the resource state is left exactly as it was and
    /// the application is marked [`DeploymentState::Waiting`].
    pub fn schedule(&mut self, app: &Application) -> MeshResult<ComponentMapping> {
        app.validate()?;
        if self.deployments.get(&app.id) == Some(&DeploymentState::Deployed) {
            return Err(MeshError::InvalidApplication(format!(
                "application {} is already deployed",
                app.id
            )));
        }

        info!(
            app = %app.id,
            components = app.components.len(),
            strategy = self.strategy.name(),
            "Scheduling application"
        );

        let snapshot = self.state.snapshot();
        self.strategy.initialize(&mut self.state);

        let outcome = self.strategy.schedule(app, &self.state);
        let (mapping, state) = match outcome {
            SearchOutcome::Complete { mapping, state } => (mapping, state),
            SearchOutcome::Exhausted { best_cost } => {
                self.state.restore(snapshot);
                self.deployments.insert(app.id.clone(), DeploymentState::Waiting);
                warn!(
                    app = %app.id,
                    strategy = self.strategy.name(),
                    best_cost = ?best_cost,
                    "No placement found"
                );
                return Err(MeshError::Unschedulable {
                    app: app.id.clone(),
                    reason: format!("{} strategy found no feasible placement", self.strategy.name()),
                });
            }
        };

        if let Err(e) = state.check_node_conservation() {
            self.state.restore(snapshot);
            self.deployments.insert(app.id.clone(), DeploymentState::Waiting);
            warn!(app = %app.id, error = %e, "Placement over-commits a node");
            return Err(MeshError::Unschedulable {
                app: app.id.clone(),
                reason: e.to_string(),
            });
        }

        self.state.restore(state);
        self.assignments.set_app(&app.id, mapping.clone());
        self.deployments.insert(app.id.clone(), DeploymentState::Deployed);
        self.placements.insert(
            app.id.clone(),
            PlacementRecord {
                app_id: app.id.clone(),
                strategy: self.strategy.name().to_string(),
                mapping: mapping.clone(),
                placed_at: Utc::now(),
            },
        );

        for (component, node) in &mapping {
            debug!(app = %app.id, component = %component, node = %node, "Component placed");
        }
        info!(app = %app.id, "Application deployed");

        Ok(mapping)
    }

    /// Schedule applications one after another. Each one sees the
    /// reservations of those committed before it; a failure does not stop
    /// the batch.
    pub fn schedule_batch(&mut self, apps: &[Application]) -> Vec<(String, MeshResult<ComponentMapping>)> {
        apps.iter()
            .map(|app| (app.id.clone(), self.schedule(app)))
            .collect()
    }

    /// Committed resource state
    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    /// Committed placements of every deployed application
    pub fn assignments(&self) -> &Assignment {
        &self.assignments
    }

    /// Component placements of one deployed application
    pub fn assignment_for(&self, app_id: &str) -> Option<&ComponentMapping> {
        self.assignments.app(app_id)
    }

    /// Deployment state of an application, if it was ever scheduled
    pub fn deployment_state(&self, app_id: &str) -> Option<DeploymentState> {
        self.deployments.get(app_id).copied()
    }

    /// Placement details of a deployed application
    pub fn placement(&self, app_id: &str) -> Option<&PlacementRecord> {
        self.placements.get(app_id)
    }

    /// Name of the active strategy
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}
