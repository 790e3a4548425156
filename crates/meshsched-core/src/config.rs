//! Configuration types for meshsched

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// Top-level scheduler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Search strategy used by the facade
    pub strategy: StrategyKind,
    /// Simulated annealing parameters
    pub annealing: AnnealingConfig,
    /// Tabu search parameters
    pub tabu: TabuConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl SchedulerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> MeshResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MeshError::Config(format!("Failed to read config file: {}", e)))?;
        let config: SchedulerConfig = toml::from_str(&content)
            .map_err(|e| MeshError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the searches cannot run with
    pub fn validate(&self) -> MeshResult<()> {
        self.annealing.validate()?;
        self.tabu.validate()
    }
}

/// Placement search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Exhaustive backtracking
    Optimal,
    /// Degree-ordered greedy backtracking
    #[default]
    MaxBw,
    /// Simulated annealing over complete assignments
    SimulatedAnnealing,
    /// Tabu search over complete assignments
    TabuSearch,
}

impl StrategyKind {
    /// Every strategy, in a stable order
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Optimal,
        StrategyKind::MaxBw,
        StrategyKind::SimulatedAnnealing,
        StrategyKind::TabuSearch,
    ];
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Optimal => write!(f, "optimal"),
            StrategyKind::MaxBw => write!(f, "max-bw"),
            StrategyKind::SimulatedAnnealing => write!(f, "simulated-annealing"),
            StrategyKind::TabuSearch => write!(f, "tabu-search"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "optimal" | "exhaustive" => Ok(StrategyKind::Optimal),
            "max-bw" | "maxbw" | "greedy" => Ok(StrategyKind::MaxBw),
            "simulated-annealing" | "annealing" | "sa" => Ok(StrategyKind::SimulatedAnnealing),
            "tabu-search" | "tabu" => Ok(StrategyKind::TabuSearch),
            other => Err(MeshError::Config(format!("Unknown strategy: {}", other))),
        }
    }
}

/// Simulated annealing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingConfig {
    /// Starting temperature
    pub initial_temperature: f64,
    /// The search stops once the temperature drops below this floor
    pub final_temperature: f64,
    /// Geometric cooling factor applied every iteration, in (0, 1)
    pub cooling_factor: f64,
    /// Seed for the random source; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 5.0e4,
            final_temperature: 0.1,
            cooling_factor: 0.99,
            seed: None,
        }
    }
}

impl AnnealingConfig {
    fn validate(&self) -> MeshResult<()> {
        if !(self.cooling_factor > 0.0 && self.cooling_factor < 1.0) {
            return Err(MeshError::Config(format!(
                "annealing cooling_factor must be in (0, 1), got {}",
                self.cooling_factor
            )));
        }
        if !(self.final_temperature > 0.0 && self.final_temperature < self.initial_temperature) {
            return Err(MeshError::Config(format!(
                "annealing temperatures must satisfy 0 < final ({}) < initial ({})",
                self.final_temperature, self.initial_temperature
            )));
        }
        Ok(())
    }
}

/// Tabu search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabuConfig {
    /// Number of search steps
    pub max_steps: usize,
    /// Maximum number of remembered assignments
    pub tabu_list_size: usize,
    /// Seed for the random source; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            tabu_list_size: 50,
            seed: None,
        }
    }
}

impl TabuConfig {
    fn validate(&self) -> MeshResult<()> {
        if self.tabu_list_size == 0 {
            return Err(MeshError::Config(
                "tabu_list_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Include the event target in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}
