//! # Ergonet Core
//!
//! Core engine for estimating and simulating exponential random graph
//! models (ERGMs) on large directed networks.
//!
//! The engine is built from five layers, leaves first:
//!
//! - **graph**: the mutable directed-graph store with O(1) arc toggles,
//!   node attributes, and optional snowball-wave metadata
//! - **twopath**: an optional incremental accelerator for two-path counts
//! - **stats**: the change-statistic catalog and its aggregator
//! - **sampler**: Metropolis proposal kernels (basic, tie-no-tie,
//!   improved fixed density)
//! - **estimator** / **simulate**: the two-stage equilibrium expectation
//!   estimator and the fixed-parameter simulation driver
//!
//! Within one chain the engine is strictly single threaded: samplers are
//! the only graph mutators, change statistics take an immutable borrow,
//! and the per-proposal loop performs no allocation or I/O.

#![forbid(unsafe_code)]

pub mod engine;

// Re-export commonly used types
pub use engine::errors::ExecError;
pub use engine::graph::DirectedGraph;
pub use engine::rng::ChainRng;
pub use engine::sampler::{Sampler, SamplerKind, SamplerOptions};
pub use engine::stats::Model;
