//! Node, link, route, component, application and assignment types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MeshError, MeshResult};

/// Component id -> node id for one application
pub type ComponentMapping = BTreeMap<String, String>;

/// A compute host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier
    pub id: String,
    /// Total CPU units
    pub cpu_capacity: u64,
    /// CPU units reserved by placed components
    pub cpu_in_use: u64,
    /// Total memory (MB)
    pub memory_capacity: u64,
    /// Memory reserved by placed components (MB)
    pub memory_in_use: u64,
}

impl Node {
    /// Create an idle node
    pub fn new(id: impl Into<String>, cpu_capacity: u64, memory_capacity: u64) -> Self {
        Self {
            id: id.into(),
            cpu_capacity,
            cpu_in_use: 0,
            memory_capacity,
            memory_in_use: 0,
        }
    }

    /// Free CPU units
    pub fn cpu_available(&self) -> u64 {
        self.cpu_capacity.saturating_sub(self.cpu_in_use)
    }

    /// Free memory
    pub fn memory_available(&self) -> u64 {
        self.memory_capacity.saturating_sub(self.memory_in_use)
    }

    /// Whether both usage counters are within capacity
    pub fn is_within_capacity(&self) -> bool {
        self.cpu_in_use <= self.cpu_capacity && self.memory_in_use <= self.memory_capacity
    }
}

/// Index of a link inside the link arena of a
/// [`ResourceState`](crate::state::ResourceState)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub usize);

/// A directed physical edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBandwidth {
    pub src: String,
    pub dst: String,
    /// Bandwidth capacity
    pub capacity: f64,
    /// Bandwidth currently reserved
    pub in_use: f64,
}

impl LinkBandwidth {
    /// Create an unreserved link
    pub fn new(src: impl Into<String>, dst: impl Into<String>, capacity: f64) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            capacity,
            in_use: 0.0,
        }
    }

    /// Capacity that is not reserved yet
    pub fn remaining(&self) -> f64 {
        self.capacity - self.in_use
    }
}

/// Observed traffic on a directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTraffic {
    pub src: String,
    pub dst: String,
    /// Measured throughput in bandwidth units
    pub observed: f64,
}

/// A directed multi-hop path between two nodes.
///
/// Hops are indices into the link arena that owns the links, so copying the
/// arena together with its routes never leaves a route pointing at a link of
/// another copy.
///
/// Reservations follow a route-level model: reserving bandwidth on a route
/// writes the same in-use figure onto every hop of the chain. This does not
/// model multiplexing of several flows over a shared hop.
///
/// Routes are only built through [`Route::new`]; they serialize for
/// reporting but are never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub src: String,
    pub dst: String,
    hops: Vec<LinkId>,
    /// Cached capacity, the bottleneck capacity at initialization
    pub capacity: f64,
    /// Cached in-use, follows the bottleneck hop after every update
    pub in_use: f64,
}

impl Route {
    /// Create a route over an ordered, non-empty hop chain
    pub fn new(src: impl Into<String>, dst: impl Into<String>, hops: Vec<LinkId>) -> MeshResult<Self> {
        let src = src.into();
        let dst = dst.into();
        if hops.is_empty() {
            return Err(MeshError::Topology(format!(
                "route {} -> {} has no hops",
                src, dst
            )));
        }
        Ok(Self {
            src,
            dst,
            hops,
            capacity: 0.0,
            in_use: 0.0,
        })
    }

    /// Ordered hop chain
    pub fn hops(&self) -> &[LinkId] {
        &self.hops
    }

    /// Whether the route traverses the given link
    pub fn contains(&self, link: LinkId) -> bool {
        self.hops.contains(&link)
    }

    /// Hop with the least remaining bandwidth, with that remaining amount.
    ///
    /// Ties go to the hop that comes first in the chain.
    pub fn bottleneck(&self, links: &[LinkBandwidth]) -> (f64, LinkId) {
        let mut best = self.hops[0];
        let mut min = links[best.0].remaining();
        for &hop in &self.hops[1..] {
            let remaining = links[hop.0].remaining();
            if remaining < min {
                min = remaining;
                best = hop;
            }
        }
        (min, best)
    }

    /// Set the route's in-use figure and overwrite every hop with it
    pub fn set_bandwidth(&mut self, value: f64, links: &mut [LinkBandwidth]) {
        self.in_use = value;
        for hop in &self.hops {
            links[hop.0].in_use = value;
        }
    }

    /// Copy the in-use figure of `link` forward if this route traverses it
    pub fn recompute_from_link(&mut self, link: LinkId, links: &[LinkBandwidth]) {
        if self.contains(link) {
            self.in_use = links[link.0].in_use;
        }
    }
}

/// A deployable unit of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    /// CPU demand
    pub cpu: u64,
    /// Memory demand (MB)
    pub memory: u64,
    /// Dependency component id -> required bandwidth
    #[serde(default)]
    pub bandwidth: BTreeMap<String, f64>,
}

impl Component {
    /// Create a component without dependencies
    pub fn new(id: impl Into<String>, cpu: u64, memory: u64) -> Self {
        Self {
            id: id.into(),
            cpu,
            memory,
            bandwidth: BTreeMap::new(),
        }
    }

    /// Declare a bandwidth dependency on a sibling component
    pub fn with_dependency(mut self, dependency: impl Into<String>, bandwidth: f64) -> Self {
        self.bandwidth.insert(dependency.into(), bandwidth);
        self
    }

    /// Sum of all declared dependency bandwidths
    pub fn total_bandwidth(&self) -> f64 {
        self.bandwidth.values().sum()
    }

    /// Number of declared dependencies
    pub fn degree(&self) -> usize {
        self.bandwidth.len()
    }
}

/// A set of components forming one deployment unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub components: BTreeMap<String, Component>,
}

impl Application {
    /// Create an empty application
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            components: BTreeMap::new(),
        }
    }

    /// Add a component, keyed by its id
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.insert(component.id.clone(), component);
        self
    }

    /// Look up a component
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    /// Components that declare a dependency on `id`, with their demand
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = (&'a Component, f64)> + 'a {
        self.components
            .values()
            .filter_map(move |c| c.bandwidth.get(id).map(|bw| (c, *bw)))
    }

    /// Check that every dependency names a sibling and every demand is a
    /// finite, non-negative number
    pub fn validate(&self) -> MeshResult<()> {
        if self.components.is_empty() {
            return Err(MeshError::InvalidApplication(format!(
                "application {} has no components",
                self.id
            )));
        }
        for (key, component) in &self.components {
            if key != &component.id {
                return Err(MeshError::InvalidApplication(format!(
                    "component key {} does not match id {}",
                    key, component.id
                )));
            }
            for (dep, bw) in &component.bandwidth {
                if !self.components.contains_key(dep) {
                    return Err(MeshError::InvalidApplication(format!(
                        "component {} depends on unknown component {}",
                        component.id, dep
                    )));
                }
                if !bw.is_finite() || *bw < 0.0 {
                    return Err(MeshError::InvalidApplication(format!(
                        "component {} declares invalid bandwidth {} to {}",
                        component.id, bw, dep
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Candidate or committed placement: application id -> component id -> node id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    apps: BTreeMap<String, ComponentMapping>,
}

impl Assignment {
    /// Create an empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a component on a node
    pub fn insert(&mut self, app: &str, component: &str, node: &str) {
        self.apps
            .entry(app.to_string())
            .or_default()
            .insert(component.to_string(), node.to_string());
    }

    /// Remove a component's placement, returning the node it was on
    pub fn remove(&mut self, app: &str, component: &str) -> Option<String> {
        self.apps.get_mut(app).and_then(|m| m.remove(component))
    }

    /// Node a component is placed on
    pub fn node_of(&self, app: &str, component: &str) -> Option<&str> {
        self.apps
            .get(app)
            .and_then(|m| m.get(component))
            .map(String::as_str)
    }

    /// Mapping of one application
    pub fn app(&self, app: &str) -> Option<&ComponentMapping> {
        self.apps.get(app)
    }

    /// Replace the mapping of one application
    pub fn set_app(&mut self, app: &str, mapping: ComponentMapping) {
        self.apps.insert(app.to_string(), mapping);
    }

    /// Number of placed components of an application
    pub fn placed_count(&self, app: &str) -> usize {
        self.apps.get(app).map_or(0, |m| m.len())
    }

    /// Whether every component of `app` has a node
    pub fn is_complete(&self, app: &Application) -> bool {
        match self.apps.get(&app.id) {
            Some(mapping) => app.components.keys().all(|c| mapping.contains_key(c)),
            None => app.components.is_empty(),
        }
    }

    /// Iterate over application mappings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentMapping)> {
        self.apps.iter()
    }

    /// Whether nothing is placed
    pub fn is_empty(&self) -> bool {
        self.apps.values().all(|m| m.is_empty())
    }
}
