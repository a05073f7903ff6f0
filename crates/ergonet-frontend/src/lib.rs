//! # Ergonet Frontend
//!
//! Everything between the filesystem and the engine: run-configuration
//! parsing, Pajek network I/O, attribute and zone tables, and the
//! writers that stream estimation trajectories and simulation samples.
//!
//! The split mirrors the engine's ownership rules: this crate builds a
//! fully validated [`DirectedGraph`](ergonet_core::DirectedGraph) and
//! [`Model`](ergonet_core::Model) before any sampling starts, and every
//! malformed input is reported with its file and line instead of
//! surfacing mid-run.

#![forbid(unsafe_code)]

pub mod attributes;
pub mod config;
pub mod errors;
pub mod output;
pub mod pajek;

use std::sync::Arc;

use tracing::info;

use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_core::DirectedGraph;

pub use config::{resolve_model, Config, ResolvedModel, RunMode};
pub use errors::FrontendError;

/// Loads the graph named by the configuration, with attributes and
/// snowball zones attached.
///
/// For simulation configs without an `arclistFile`, an empty graph on
/// `numNodes` nodes is built instead.
pub fn prepare_graph(config: &Config) -> Result<DirectedGraph, FrontendError> {
    let backend = config.two_path_index;
    let mut g = match (&config.arclist_file, config.num_nodes) {
        (Some(path), _) => pajek::load_graph(path, backend)?,
        (None, Some(n)) => DirectedGraph::new(n, backend)?,
        (None, None) => {
            return Err(FrontendError::Config(
                "no arclistFile and no numNodes; nothing to build a graph from".into(),
            ))
        }
    };
    info!(
        nodes = g.num_nodes(),
        arcs = g.num_arcs(),
        backend = ?backend,
        "network loaded"
    );

    let attrs = attributes::load_attributes(config, g.num_nodes())?;
    g.set_attributes(Arc::new(attrs))?;

    if let Some(zone_path) = &config.zone_file {
        let zones = attributes::read_zone_file(zone_path, g.num_nodes())?;
        g.attach_snowball(zones)?;
        if let Some(sb) = g.snowball() {
            info!(
                max_zone = sb.max_zone(),
                inner_nodes = sb.inner_nodes().len(),
                inner_arcs = sb.num_inner_arcs(),
                "snowball zones attached"
            );
        }
    }
    Ok(g)
}

/// Two-path backend selection is re-exported for CLI display purposes.
pub fn backend_name(backend: TwoPathBackend) -> &'static str {
    match backend {
        TwoPathBackend::Disabled => "none",
        TwoPathBackend::Dense => "dense",
        TwoPathBackend::Sparse => "sparse",
    }
}
