//! meshsched-core: Core types for the meshsched placement engine
//!
//! This crate provides the fundamental types used throughout meshsched:
//! - Nodes, links, routes and their bottleneck bookkeeping
//! - Applications, components and assignments
//! - The arena-backed resource state with snapshot and restore
//! - CSV topology and application loading
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod state;

pub use config::*;
pub use error::*;
pub use model::*;
pub use state::ResourceState;
