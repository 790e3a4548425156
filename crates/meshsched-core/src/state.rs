//! Arena-backed resource state with snapshot and restore
//!
//! Nodes, links and routes of one scheduling cycle live in three contiguous
//! arenas. Routes refer to links by [`LinkId`], so a snapshot is a plain
//! clone: the copied routes index the copied link arena and share nothing
//! with the original.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{MeshError, MeshResult, ResourceError};
use crate::model::{LinkBandwidth, LinkId, LinkTraffic, Node, Route};

/// The mutable node/link/route universe of one scheduling cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    links: Vec<LinkBandwidth>,
    link_index: HashMap<(String, String), LinkId>,
    routes: Vec<Route>,
    route_index: HashMap<(String, String), usize>,
}

impl ResourceState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Nodes enumerate in insertion order.
    pub fn add_node(&mut self, node: Node) -> MeshResult<()> {
        if self.node_index.contains_key(&node.id) {
            return Err(MeshError::Topology(format!("duplicate node {}", node.id)));
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Register a directed link between two known nodes
    pub fn add_link(&mut self, link: LinkBandwidth) -> MeshResult<LinkId> {
        for end in [&link.src, &link.dst] {
            if !self.node_index.contains_key(end) {
                return Err(MeshError::Topology(format!(
                    "link {} -> {} references unknown node {}",
                    link.src, link.dst, end
                )));
            }
        }
        if !link.capacity.is_finite() || link.capacity < 0.0 {
            return Err(MeshError::Topology(format!(
                "link {} -> {} has invalid capacity {}",
                link.src, link.dst, link.capacity
            )));
        }
        let key = (link.src.clone(), link.dst.clone());
        if self.link_index.contains_key(&key) {
            return Err(MeshError::Topology(format!(
                "duplicate link {} -> {}",
                link.src, link.dst
            )));
        }
        let id = LinkId(self.links.len());
        self.link_index.insert(key, id);
        self.links.push(link);
        Ok(id)
    }

    /// Register (or replace) the route between `src` and `dst` over the
    /// given chain of node ids, e.g. `["a", "b", "c"]` for `a -> b -> c`
    pub fn add_route(&mut self, path: &[&str]) -> MeshResult<()> {
        if path.len() < 2 {
            return Err(MeshError::Topology(format!(
                "route needs at least two nodes, got {:?}",
                path
            )));
        }
        let mut hops = Vec::with_capacity(path.len() - 1);
        for pair in path.windows(2) {
            let link = self.link_between(pair[0], pair[1]).ok_or_else(|| {
                MeshError::Topology(format!("no link {} -> {} for route", pair[0], pair[1]))
            })?;
            hops.push(link);
        }
        self.insert_route(Route::new(path[0], path[path.len() - 1], hops)?)
    }

    /// Register (or replace) a route from an already resolved hop chain.
    ///
    /// Every hop must index this state's link arena and the chain must lead
    /// from the route's source to its destination.
    pub fn insert_route(&mut self, route: Route) -> MeshResult<()> {
        self.check_hops(&route)?;
        let key = (route.src.clone(), route.dst.clone());
        match self.route_index.get(&key) {
            Some(&idx) => self.routes[idx] = route,
            None => {
                self.route_index.insert(key, self.routes.len());
                self.routes.push(route);
            }
        }
        Ok(())
    }

    fn check_hops(&self, route: &Route) -> MeshResult<()> {
        let broken = |reason: &str| {
            MeshError::Topology(format!("route {} -> {} {}", route.src, route.dst, reason))
        };
        let mut at = route.src.as_str();
        for hop in route.hops() {
            let link = self
                .links
                .get(hop.0)
                .ok_or_else(|| broken("references an unknown link"))?;
            if link.src != at {
                return Err(broken("has disconnected hops"));
            }
            at = link.dst.as_str();
        }
        match route.hops().last() {
            Some(_) if at == route.dst => Ok(()),
            Some(_) => Err(broken("does not end at its destination")),
            None => Err(broken("has no hops")),
        }
    }

    /// Give every link without an explicit route a one-hop route, self-loops
    /// included
    pub fn add_direct_routes(&mut self) -> MeshResult<()> {
        let missing: Vec<(LinkId, String, String)> = self
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| !self.route_index.contains_key(&(l.src.clone(), l.dst.clone())))
            .map(|(i, l)| (LinkId(i), l.src.clone(), l.dst.clone()))
            .collect();
        for (id, src, dst) in missing {
            self.insert_route(Route::new(src, dst, vec![id])?)?;
        }
        Ok(())
    }

    /// Reset every route's cached capacity to its current bottleneck and its
    /// cached in-use to zero. Run once per scheduling cycle before searching.
    pub fn initialize_routes(&mut self) {
        let links = &self.links;
        for route in &mut self.routes {
            let (bottleneck, _) = route.bottleneck(links);
            route.capacity = bottleneck;
            route.in_use = 0.0;
        }
        debug!(routes = self.routes.len(), "Initialized route capacities");
    }

    /// Value copy of the whole state
    pub fn snapshot(&self) -> ResourceState {
        self.clone()
    }

    /// Replace this state wholesale with a prior snapshot.
    ///
    /// The mutated branch is dropped here; callers keep no handle into it.
    pub fn restore(&mut self, old: ResourceState) {
        *self = old;
    }

    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    /// Look up a node mutably
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        match self.node_index.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    /// Nodes in enumeration order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node ids in enumeration order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link arena
    pub fn links(&self) -> &[LinkBandwidth] {
        &self.links
    }

    /// Link by arena index
    pub fn link(&self, id: LinkId) -> &LinkBandwidth {
        &self.links[id.0]
    }

    /// Index of the directed link `src -> dst`
    pub fn link_between(&self, src: &str, dst: &str) -> Option<LinkId> {
        self.link_index
            .get(&(src.to_string(), dst.to_string()))
            .copied()
    }

    /// Links leaving `node`. A loopback link `node -> node` counts as one.
    pub fn outgoing_links<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a LinkBandwidth> + 'a {
        self.links.iter().filter(move |l| l.src == node)
    }

    /// Sum of unreserved bandwidth over the links leaving `node`
    pub fn outgoing_remaining(&self, node: &str) -> f64 {
        self.outgoing_links(node).map(LinkBandwidth::remaining).sum()
    }

    /// Sum of capacity over the links leaving `node`
    pub fn outgoing_capacity(&self, node: &str) -> f64 {
        self.outgoing_links(node).map(|l| l.capacity).sum()
    }

    /// Number of links leaving `node`
    pub fn link_degree(&self, node: &str) -> usize {
        self.outgoing_links(node).count()
    }

    /// All routes
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route from `src` to `dst`
    pub fn route(&self, src: &str, dst: &str) -> Option<&Route> {
        self.route_index
            .get(&(src.to_string(), dst.to_string()))
            .map(|&i| &self.routes[i])
    }

    /// Route from `src` to `dst` together with the link arena it indexes
    pub fn route_with_links_mut(
        &mut self,
        src: &str,
        dst: &str,
    ) -> Option<(&mut Route, &mut [LinkBandwidth])> {
        let idx = *self.route_index.get(&(src.to_string(), dst.to_string()))?;
        Some((&mut self.routes[idx], self.links.as_mut_slice()))
    }

    /// Re-synchronize the cached in-use of every route that traverses `link`
    pub fn resync_routes(&mut self, link: LinkId) {
        let links = &self.links;
        for route in &mut self.routes {
            route.recompute_from_link(link, links);
        }
    }

    /// Lower each measured link's capacity by its observed traffic.
    ///
    /// Capacity saturates at zero. Measurements for unknown links are
    /// skipped. Returns how many links were discounted.
    pub fn discount_traffic(&mut self, traffic: &[LinkTraffic]) -> usize {
        let mut applied = 0;
        for sample in traffic {
            match self.link_between(&sample.src, &sample.dst) {
                Some(id) => {
                    let link = &mut self.links[id.0];
                    link.capacity = (link.capacity - sample.observed.max(0.0)).max(0.0);
                    applied += 1;
                }
                None => {
                    warn!(src = %sample.src, dst = %sample.dst, "Traffic sample for unknown link");
                }
            }
        }
        applied
    }

    /// Check that no node is over-committed
    pub fn check_node_conservation(&self) -> Result<(), ResourceError> {
        for node in &self.nodes {
            if node.cpu_in_use > node.cpu_capacity {
                return Err(ResourceError::InsufficientCpu {
                    node: node.id.clone(),
                });
            }
            if node.memory_in_use > node.memory_capacity {
                return Err(ResourceError::InsufficientMemory {
                    node: node.id.clone(),
                });
            }
        }
        Ok(())
    }
}
