//! meshsched-scheduler: Bandwidth-aware placement strategies for meshsched
//!
//! This crate provides the logic for placing application components on nodes:
//! - Local and global feasibility checks
//! - The assignment applier that reserves node and route capacity
//! - Exhaustive, greedy, simulated annealing and tabu search strategies
//! - The scheduler facade that commits or rolls back each attempt

pub mod annealing;
pub mod applier;
pub mod exhaustive;
pub mod feasibility;
pub mod greedy;
pub mod ordering;
pub mod scheduler;
pub mod strategy;
pub mod tabu;

pub use annealing::AnnealingStrategy;
pub use applier::apply;
pub use exhaustive::OptimalStrategy;
pub use feasibility::{fits, verify};
pub use greedy::MaxBwStrategy;
pub use scheduler::{DeploymentState, PlacementRecord, Scheduler};
pub use strategy::{build_strategy, strategy_for, PlacementStrategy, SearchOutcome};
pub use tabu::TabuStrategy;
