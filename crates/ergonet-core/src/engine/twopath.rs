//! Incremental two-path index with selectable backends.
//!
//! The alternating k-triangle and alternating two-path change statistics
//! repeatedly need the number of two-paths between an ordered node pair.
//! This module maintains those counts incrementally as arcs toggle, with
//! a runtime choice of backend:
//!
//! - **dense**: three contiguous N x N matrices. O(1) everything, but
//!   Theta(N^2) memory, so construction is refused beyond
//!   [`DENSE_MAX_NODES`].
//! - **sparse**: one hash map per relation keyed on the packed 64-bit
//!   dyad; absent key means count 0, and entries are purged when a count
//!   returns to 0.
//! - **disabled**: no state at all; callers fall back to neighbor-list
//!   intersection on demand.
//!
//! The index is a pure accelerator. It has no failure modes of its own,
//! and [`crate::engine::graph::DirectedGraph::two_path_index_consistent`]
//! recomputes it from scratch for comparison in tests.

use rustc_hash::FxHashMap;

use crate::engine::errors::ExecError;

/// Node-count bound for the dense backend.
///
/// Three u32 matrices at this size occupy about 4.8 GB, which is already
/// at the edge of what a single chain should claim. Larger networks must
/// use the sparse backend or disable the index.
pub const DENSE_MAX_NODES: u32 = 20_000;

/// Packs an ordered dyad into a single hash key.
#[inline]
pub(crate) fn dyad_key(i: u32, j: u32) -> u64 {
    ((i as u64) << 32) | j as u64
}

/// The three two-path orientations between an ordered pair (i, j).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoPathRelation {
    /// #{k : i->k and k->j}. Directed, not symmetric in (i, j).
    Mixed,
    /// #{k : k->i and k->j}. The pair shares a source; symmetric.
    CommonSource,
    /// #{k : i->k and j->k}. The pair shares a target; symmetric.
    CommonTarget,
}

/// Backend selection, decided once per run from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TwoPathBackend {
    /// Compute two-path counts on demand by neighbor-list intersection.
    Disabled,
    /// Contiguous N x N matrices.
    Dense,
    /// Hash maps keyed on packed dyads.
    #[default]
    Sparse,
}

/// Dense backend: one N x N u32 matrix per relation.
#[derive(Debug, Clone)]
pub struct DenseTwoPathIndex {
    n: usize,
    mixed: Vec<u32>,
    common_source: Vec<u32>,
    common_target: Vec<u32>,
}

impl DenseTwoPathIndex {
    fn new(n: u32) -> Self {
        let n = n as usize;
        Self {
            n,
            mixed: vec![0; n * n],
            common_source: vec![0; n * n],
            common_target: vec![0; n * n],
        }
    }

    #[inline]
    fn cell(&self, rel: TwoPathRelation, i: u32, j: u32) -> usize {
        debug_assert!((i as usize) < self.n && (j as usize) < self.n);
        let _ = rel;
        i as usize * self.n + j as usize
    }

    #[inline]
    fn query(&self, rel: TwoPathRelation, i: u32, j: u32) -> u32 {
        let idx = self.cell(rel, i, j);
        match rel {
            TwoPathRelation::Mixed => self.mixed[idx],
            TwoPathRelation::CommonSource => self.common_source[idx],
            TwoPathRelation::CommonTarget => self.common_target[idx],
        }
    }

    #[inline]
    fn apply(&mut self, rel: TwoPathRelation, i: u32, j: u32, delta: i32) {
        let idx = self.cell(rel, i, j);
        let cell = match rel {
            TwoPathRelation::Mixed => &mut self.mixed[idx],
            TwoPathRelation::CommonSource => &mut self.common_source[idx],
            TwoPathRelation::CommonTarget => &mut self.common_target[idx],
        };
        if delta >= 0 {
            *cell += delta as u32;
        } else {
            debug_assert!(*cell >= (-delta) as u32, "two-path count underflow");
            *cell -= (-delta) as u32;
        }
    }
}

/// Sparse backend: absent key is count 0; zero entries are purged so the
/// maps only ever hold pairs with at least one two-path.
#[derive(Debug, Clone, Default)]
pub struct SparseTwoPathIndex {
    mixed: FxHashMap<u64, u32>,
    common_source: FxHashMap<u64, u32>,
    common_target: FxHashMap<u64, u32>,
}

impl SparseTwoPathIndex {
    fn map(&self, rel: TwoPathRelation) -> &FxHashMap<u64, u32> {
        match rel {
            TwoPathRelation::Mixed => &self.mixed,
            TwoPathRelation::CommonSource => &self.common_source,
            TwoPathRelation::CommonTarget => &self.common_target,
        }
    }

    fn map_mut(&mut self, rel: TwoPathRelation) -> &mut FxHashMap<u64, u32> {
        match rel {
            TwoPathRelation::Mixed => &mut self.mixed,
            TwoPathRelation::CommonSource => &mut self.common_source,
            TwoPathRelation::CommonTarget => &mut self.common_target,
        }
    }

    #[inline]
    fn query(&self, rel: TwoPathRelation, i: u32, j: u32) -> u32 {
        self.map(rel).get(&dyad_key(i, j)).copied().unwrap_or(0)
    }

    fn apply(&mut self, rel: TwoPathRelation, i: u32, j: u32, delta: i32) {
        let key = dyad_key(i, j);
        let map = self.map_mut(rel);
        if delta >= 0 {
            *map.entry(key).or_insert(0) += delta as u32;
        } else {
            let dec = (-delta) as u32;
            match map.get_mut(&key) {
                Some(count) => {
                    debug_assert!(*count >= dec, "two-path count underflow");
                    *count -= dec;
                    if *count == 0 {
                        map.remove(&key);
                    }
                }
                None => debug_assert!(false, "decrement of absent two-path entry"),
            }
        }
    }

    /// Number of live (nonzero) entries across all three relations.
    pub fn entries(&self) -> usize {
        self.mixed.len() + self.common_source.len() + self.common_target.len()
    }
}

/// The index state owned by a graph.
#[derive(Debug, Clone)]
pub enum TwoPathIndex {
    Disabled,
    Dense(DenseTwoPathIndex),
    Sparse(SparseTwoPathIndex),
}

impl TwoPathIndex {
    /// Builds an empty index for `n` nodes with the requested backend.
    pub fn new(backend: TwoPathBackend, n: u32) -> Result<Self, ExecError> {
        match backend {
            TwoPathBackend::Disabled => Ok(Self::Disabled),
            TwoPathBackend::Sparse => Ok(Self::Sparse(SparseTwoPathIndex::default())),
            TwoPathBackend::Dense => {
                if n > DENSE_MAX_NODES {
                    return Err(ExecError::Validation(format!(
                        "dense two-path index refused for {} nodes (maximum {})",
                        n, DENSE_MAX_NODES
                    )));
                }
                Ok(Self::Dense(DenseTwoPathIndex::new(n)))
            }
        }
    }

    /// The backend this index was built with.
    pub fn backend(&self) -> TwoPathBackend {
        match self {
            Self::Disabled => TwoPathBackend::Disabled,
            Self::Dense(_) => TwoPathBackend::Dense,
            Self::Sparse(_) => TwoPathBackend::Sparse,
        }
    }

    /// Stored count for the pair, or None when the index is disabled.
    #[inline]
    pub fn query(&self, rel: TwoPathRelation, i: u32, j: u32) -> Option<u32> {
        match self {
            Self::Disabled => None,
            Self::Dense(idx) => Some(idx.query(rel, i, j)),
            Self::Sparse(idx) => Some(idx.query(rel, i, j)),
        }
    }

    /// Adjusts one cell by an exact integer delta.
    #[inline]
    pub fn apply(&mut self, rel: TwoPathRelation, i: u32, j: u32, delta: i32) {
        match self {
            Self::Disabled => {}
            Self::Dense(idx) => idx.apply(rel, i, j, delta),
            Self::Sparse(idx) => idx.apply(rel, i, j, delta),
        }
    }

    /// True when no state is maintained.
    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_purges_zero_entries() {
        let mut idx = SparseTwoPathIndex::default();
        idx.apply(TwoPathRelation::Mixed, 1, 2, 1);
        idx.apply(TwoPathRelation::Mixed, 1, 2, 2);
        assert_eq!(idx.query(TwoPathRelation::Mixed, 1, 2), 3);
        idx.apply(TwoPathRelation::Mixed, 1, 2, -3);
        assert_eq!(idx.query(TwoPathRelation::Mixed, 1, 2), 0);
        assert_eq!(idx.entries(), 0);
    }

    #[test]
    fn relations_are_independent() {
        let mut idx = TwoPathIndex::new(TwoPathBackend::Dense, 8).unwrap();
        idx.apply(TwoPathRelation::Mixed, 3, 4, 1);
        idx.apply(TwoPathRelation::CommonSource, 3, 4, 2);
        assert_eq!(idx.query(TwoPathRelation::Mixed, 3, 4), Some(1));
        assert_eq!(idx.query(TwoPathRelation::CommonSource, 3, 4), Some(2));
        assert_eq!(idx.query(TwoPathRelation::CommonTarget, 3, 4), Some(0));
    }

    #[test]
    fn dense_refuses_oversized_networks() {
        assert!(TwoPathIndex::new(TwoPathBackend::Dense, DENSE_MAX_NODES + 1).is_err());
    }

    #[test]
    fn disabled_reports_no_counts() {
        let idx = TwoPathIndex::new(TwoPathBackend::Disabled, 10).unwrap();
        assert_eq!(idx.query(TwoPathRelation::Mixed, 0, 1), None);
    }
}
