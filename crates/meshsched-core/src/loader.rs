//! CSV input loading
//!
//! An input directory holds up to five tables:
//! - `nodes.csv` (`nodeId,cpu,memory_mb`)
//! - `links.csv` (`src,dst,bw_mbps`)
//! - `paths.csv` (`src,dst,next_hop`), optional
//! - `app.csv` (`name,cpu,memory`)
//! - `deps.csv` (`src,dst,bw_mbps`), optional
//!
//! Every link, loopbacks included, yields a one-hop route. Each `paths.csv`
//! row yields the route that leaves `src` through the row's next hop and
//! then, from every intermediate node, takes the direct link to `dst` when
//! there is one and that node's own next-hop row otherwise.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MeshError, MeshResult};
use crate::model::{Application, Component, LinkBandwidth, Node, Route};
use crate::state::ResourceState;

#[derive(Debug, Deserialize)]
struct NodeRecord {
    #[serde(rename = "nodeId")]
    node_id: String,
    cpu: u64,
    #[serde(rename = "memory_mb")]
    memory: u64,
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
    src: String,
    dst: String,
    #[serde(rename = "bw_mbps", alias = "bw_mb")]
    bandwidth: f64,
}

/// One row of the next-hop table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathRecord {
    pub src: String,
    pub dst: String,
    pub next_hop: String,
}

#[derive(Debug, Deserialize)]
struct ComponentRecord {
    name: String,
    cpu: u64,
    memory: u64,
}

#[derive(Debug, Deserialize)]
struct DependencyRecord {
    src: String,
    dst: String,
    #[serde(rename = "bw_mbps", alias = "bw_mb")]
    bandwidth: f64,
}

fn read_records<R: Read, T: for<'de> Deserialize<'de>>(reader: R) -> MeshResult<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for record in rdr.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Parse the nodes table
pub fn read_nodes<R: Read>(reader: R) -> MeshResult<Vec<Node>> {
    let records: Vec<NodeRecord> = read_records(reader)?;
    Ok(records
        .into_iter()
        .map(|r| Node::new(r.node_id, r.cpu, r.memory))
        .collect())
}

/// Parse the links table
pub fn read_links<R: Read>(reader: R) -> MeshResult<Vec<LinkBandwidth>> {
    let records: Vec<LinkRecord> = read_records(reader)?;
    Ok(records
        .into_iter()
        .map(|r| LinkBandwidth::new(r.src, r.dst, r.bandwidth))
        .collect())
}

/// Parse the next-hop table
pub fn read_paths<R: Read>(reader: R) -> MeshResult<Vec<PathRecord>> {
    read_records(reader)
}

/// Build an application from the component and dependency tables
pub fn read_application<R: Read, D: Read>(
    id: impl Into<String>,
    components: R,
    dependencies: Option<D>,
) -> MeshResult<Application> {
    let mut app = Application::new(id);
    let records: Vec<ComponentRecord> = read_records(components)?;
    for r in records {
        app = app.with_component(Component::new(r.name, r.cpu, r.memory));
    }

    if let Some(deps) = dependencies {
        let records: Vec<DependencyRecord> = read_records(deps)?;
        for d in records {
            let component = app.components.get_mut(&d.src).ok_or_else(|| {
                MeshError::InvalidApplication(format!(
                    "source for dependency {} not found",
                    d.src
                ))
            })?;
            component.bandwidth.insert(d.dst, d.bandwidth);
        }
    }

    app.validate()?;
    for (id, component) in &app.components {
        debug!(component = %id, deps = component.degree(), "Loaded component");
    }
    Ok(app)
}

/// Assemble a [`ResourceState`] from parsed tables and initialize its routes
pub fn build_state(
    nodes: Vec<Node>,
    links: Vec<LinkBandwidth>,
    paths: &[PathRecord],
) -> MeshResult<ResourceState> {
    let mut state = ResourceState::new();
    for node in nodes {
        state.add_node(node)?;
    }
    for link in links {
        state.add_link(link)?;
    }
    state.add_direct_routes()?;
    resolve_paths(&mut state, paths)?;
    state.initialize_routes();
    Ok(state)
}

/// Turn next-hop rows into multi-hop routes
fn resolve_paths(state: &mut ResourceState, paths: &[PathRecord]) -> MeshResult<()> {
    let next_hop: HashMap<(&str, &str), &str> = paths
        .iter()
        .map(|p| ((p.src.as_str(), p.dst.as_str()), p.next_hop.as_str()))
        .collect();

    for path in paths {
        let dst = path.dst.as_str();
        let mut hops = Vec::new();
        let mut visited = HashSet::new();
        let mut current = path.src.as_str();
        let mut hop = path.next_hop.as_str();
        visited.insert(current);

        loop {
            let link = state.link_between(current, hop).ok_or_else(|| {
                MeshError::Topology(format!(
                    "next hop {} of {} towards {} has no link",
                    hop, current, dst
                ))
            })?;
            hops.push(link);
            if hop == dst {
                break;
            }
            if !visited.insert(hop) {
                return Err(MeshError::Topology(format!(
                    "routing loop from {} to {} at {}",
                    path.src, dst, hop
                )));
            }
            current = hop;
            hop = if state.link_between(current, dst).is_some() {
                dst
            } else {
                next_hop.get(&(current, dst)).copied().ok_or_else(|| {
                    MeshError::Topology(format!("no next hop from {} towards {}", current, dst))
                })?
            };
        }

        state.insert_route(Route::new(path.src.as_str(), dst, hops)?)?;
    }
    Ok(())
}

/// Load nodes, links and paths from an input directory
pub fn load_topology(dir: &Path) -> MeshResult<ResourceState> {
    let nodes = read_nodes(std::fs::File::open(dir.join("nodes.csv"))?)?;
    let links = read_links(std::fs::File::open(dir.join("links.csv"))?)?;
    let paths_file = dir.join("paths.csv");
    let paths = if paths_file.exists() {
        read_paths(std::fs::File::open(paths_file)?)?
    } else {
        Vec::new()
    };

    let state = build_state(nodes, links, &paths)?;
    info!(
        nodes = state.node_count(),
        links = state.links().len(),
        routes = state.routes().len(),
        "Loaded topology"
    );
    Ok(state)
}

/// Load an application from an input directory; it gets a fresh UUID
pub fn load_application(dir: &Path) -> MeshResult<Application> {
    let components = std::fs::File::open(dir.join("app.csv"))?;
    let deps_file = dir.join("deps.csv");
    let deps = if deps_file.exists() {
        Some(std::fs::File::open(deps_file)?)
    } else {
        None
    };

    let app = read_application(Uuid::new_v4().to_string(), components, deps)?;
    info!(app = %app.id, components = app.components.len(), "Loaded application");
    Ok(app)
}
