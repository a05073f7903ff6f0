//! Directed-graph store with O(1) arc toggles.
//!
//! ## Key components
//!
//! - **DirectedGraph**: out/in adjacency lists, a flat arc list, and a
//!   packed (tail, head) -> position reverse index so that removal is a
//!   swap-with-last. Mutual arcs need no extra bookkeeping: the reverse
//!   index makes `is_arc(j, i)` an O(1) probe.
//! - **AttributeSet**: immutable node attribute columns (binary,
//!   categorical, continuous, set-valued) with per-entry missing markers.
//! - **SnowballMeta**: wave numbers and the derived inner-node /
//!   inner-arc structures used by conditional estimation.
//!
//! ## Invariants
//!
//! Outside a single toggle: arc presence agrees between the out and in
//! adjacency views; the flat arc list has exactly `num_arcs` entries; no
//! self loops; no duplicate arcs; for every arc the reverse index gives
//! its current flat-list position. `consistent()` checks all of this and
//! backs the debug assertions in the samplers.
//!
//! Sampler kernels are the only mutators. The change-statistic library
//! reads the graph through `&self` only.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::errors::ExecError;
use crate::engine::twopath::{dyad_key, TwoPathBackend, TwoPathIndex, TwoPathRelation};

/// One directed arc as a (tail, head) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArcPair {
    pub tail: u32,
    pub head: u32,
}

/// A named attribute column with per-node optional values.
///
/// `None` is the missing marker; attribute change statistics involving a
/// missing entry contribute zero.
#[derive(Debug, Clone)]
pub struct AttributeColumn<T> {
    pub name: String,
    pub values: Vec<Option<T>>,
}

/// Immutable node attributes, loaded once before sampling begins.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    num_nodes: u32,
    binary: Vec<AttributeColumn<u8>>,
    categorical: Vec<AttributeColumn<u32>>,
    continuous: Vec<AttributeColumn<f64>>,
    sets: Vec<AttributeColumn<FxHashSet<u32>>>,
}

impl AttributeSet {
    pub fn new(num_nodes: u32) -> Self {
        Self {
            num_nodes,
            ..Default::default()
        }
    }

    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    fn check_len<T>(&self, name: &str, values: &[Option<T>]) -> Result<(), ExecError> {
        if values.len() != self.num_nodes as usize {
            return Err(ExecError::Validation(format!(
                "attribute '{}' has {} rows for {} nodes",
                name,
                values.len(),
                self.num_nodes
            )));
        }
        Ok(())
    }

    pub fn add_binary(&mut self, name: &str, values: Vec<Option<u8>>) -> Result<(), ExecError> {
        self.check_len(name, &values)?;
        self.binary.push(AttributeColumn {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    pub fn add_categorical(
        &mut self,
        name: &str,
        values: Vec<Option<u32>>,
    ) -> Result<(), ExecError> {
        self.check_len(name, &values)?;
        self.categorical.push(AttributeColumn {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    pub fn add_continuous(
        &mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<(), ExecError> {
        self.check_len(name, &values)?;
        self.continuous.push(AttributeColumn {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    pub fn add_set(
        &mut self,
        name: &str,
        values: Vec<Option<FxHashSet<u32>>>,
    ) -> Result<(), ExecError> {
        self.check_len(name, &values)?;
        self.sets.push(AttributeColumn {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    fn find<T>(columns: &[AttributeColumn<T>], name: &str) -> Option<usize> {
        columns.iter().position(|c| c.name == name)
    }

    pub fn binary_index(&self, name: &str) -> Option<usize> {
        Self::find(&self.binary, name)
    }

    pub fn categorical_index(&self, name: &str) -> Option<usize> {
        Self::find(&self.categorical, name)
    }

    pub fn continuous_index(&self, name: &str) -> Option<usize> {
        Self::find(&self.continuous, name)
    }

    pub fn set_index(&self, name: &str) -> Option<usize> {
        Self::find(&self.sets, name)
    }

    #[inline]
    pub fn binary_value(&self, col: usize, node: u32) -> Option<u8> {
        self.binary[col].values[node as usize]
    }

    #[inline]
    pub fn categorical_value(&self, col: usize, node: u32) -> Option<u32> {
        self.categorical[col].values[node as usize]
    }

    #[inline]
    pub fn continuous_value(&self, col: usize, node: u32) -> Option<f64> {
        self.continuous[col].values[node as usize]
    }

    #[inline]
    pub fn set_value(&self, col: usize, node: u32) -> Option<&FxHashSet<u32>> {
        self.sets[col].values[node as usize].as_ref()
    }
}

/// Snowball-wave metadata and the structures derived from it.
///
/// `prev_wave_degree[v]` counts the distinct neighbors of v, ignoring
/// arc direction, whose zone is exactly one less than v's zone. A node
/// in wave z > 0 must keep at least one such neighbor, which is what the
/// conditional delete constraint protects.
#[derive(Debug, Clone)]
pub struct SnowballMeta {
    zone: Vec<u32>,
    max_zone: u32,
    inner_nodes: Vec<u32>,
    inner_arcs: Vec<ArcPair>,
    inner_pos: FxHashMap<u64, u32>,
    prev_wave_degree: Vec<u32>,
}

impl SnowballMeta {
    #[inline]
    pub fn zone(&self, v: u32) -> u32 {
        self.zone[v as usize]
    }

    pub fn max_zone(&self) -> u32 {
        self.max_zone
    }

    #[inline]
    pub fn is_inner(&self, v: u32) -> bool {
        self.zone[v as usize] < self.max_zone
    }

    pub fn inner_nodes(&self) -> &[u32] {
        &self.inner_nodes
    }

    pub fn num_inner_arcs(&self) -> u32 {
        self.inner_arcs.len() as u32
    }

    #[inline]
    pub fn inner_arc_at(&self, idx: u32) -> ArcPair {
        self.inner_arcs[idx as usize]
    }

    #[inline]
    pub fn prev_wave_degree(&self, v: u32) -> u32 {
        self.prev_wave_degree[v as usize]
    }
}

/// The mutable directed graph, owned by the driver and borrowed mutably
/// for the duration of each sampler call.
#[derive(Debug, Clone)]
pub struct DirectedGraph {
    num_nodes: u32,
    out_neighbours: Vec<Vec<u32>>,
    in_neighbours: Vec<Vec<u32>>,
    arcs: Vec<ArcPair>,
    arc_pos: FxHashMap<u64, u32>,
    attrs: Arc<AttributeSet>,
    snowball: Option<SnowballMeta>,
    twopath: TwoPathIndex,
}

impl DirectedGraph {
    /// Creates an empty graph on `num_nodes` nodes.
    ///
    /// Fails only when the dense two-path backend is requested for a
    /// network too large to hold it.
    pub fn new(num_nodes: u32, backend: TwoPathBackend) -> Result<Self, ExecError> {
        Ok(Self {
            num_nodes,
            out_neighbours: vec![Vec::new(); num_nodes as usize],
            in_neighbours: vec![Vec::new(); num_nodes as usize],
            arcs: Vec::new(),
            arc_pos: FxHashMap::default(),
            attrs: Arc::new(AttributeSet::new(num_nodes)),
            snowball: None,
            twopath: TwoPathIndex::new(backend, num_nodes)?,
        })
    }

    /// Attaches the (immutable) attribute columns.
    pub fn set_attributes(&mut self, attrs: Arc<AttributeSet>) -> Result<(), ExecError> {
        if attrs.num_nodes() != self.num_nodes {
            return Err(ExecError::Validation(format!(
                "attribute table covers {} nodes, graph has {}",
                attrs.num_nodes(),
                self.num_nodes
            )));
        }
        self.attrs = attrs;
        Ok(())
    }

    #[inline]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attrs
    }

    pub(crate) fn attributes_handle(&self) -> Arc<AttributeSet> {
        Arc::clone(&self.attrs)
    }

    #[inline]
    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    #[inline]
    pub fn num_arcs(&self) -> u32 {
        self.arcs.len() as u32
    }

    /// Number of ordered dyads N(N-1).
    #[inline]
    pub fn num_dyads(&self) -> u64 {
        self.num_nodes as u64 * (self.num_nodes as u64).saturating_sub(1)
    }

    /// Arc density M / N(N-1); zero for graphs with fewer than two nodes.
    pub fn density(&self) -> f64 {
        let dyads = self.num_dyads();
        if dyads == 0 {
            0.0
        } else {
            self.num_arcs() as f64 / dyads as f64
        }
    }

    #[inline]
    pub fn is_arc(&self, i: u32, j: u32) -> bool {
        self.arc_pos.contains_key(&dyad_key(i, j))
    }

    /// True when i and j are adjacent in either direction.
    #[inline]
    pub fn is_adjacent(&self, i: u32, j: u32) -> bool {
        self.is_arc(i, j) || self.is_arc(j, i)
    }

    #[inline]
    pub fn out_neighbours(&self, v: u32) -> &[u32] {
        &self.out_neighbours[v as usize]
    }

    #[inline]
    pub fn in_neighbours(&self, v: u32) -> &[u32] {
        &self.in_neighbours[v as usize]
    }

    #[inline]
    pub fn out_degree(&self, v: u32) -> u32 {
        self.out_neighbours[v as usize].len() as u32
    }

    #[inline]
    pub fn in_degree(&self, v: u32) -> u32 {
        self.in_neighbours[v as usize].len() as u32
    }

    /// The arc stored at a flat-list position, for uniform arc selection.
    #[inline]
    pub fn arc_at(&self, idx: u32) -> ArcPair {
        self.arcs[idx as usize]
    }

    /// All arcs in flat-list order. The order is arbitrary but stable
    /// between toggles.
    pub fn arcs(&self) -> impl Iterator<Item = ArcPair> + '_ {
        self.arcs.iter().copied()
    }

    /// Reserves reverse-index and arc-list capacity ahead of bulk loads,
    /// keeping rehashes out of the sampling loop.
    pub fn reserve_arcs(&mut self, additional: usize) {
        self.arcs.reserve(additional);
        self.arc_pos.reserve(additional);
    }

    /// Inserts arc i->j. Requires i != j and the arc to be absent.
    pub fn insert_arc(&mut self, i: u32, j: u32) {
        debug_assert!(i != j, "self loops are not representable");
        debug_assert!(i < self.num_nodes && j < self.num_nodes);
        debug_assert!(!self.is_arc(i, j), "duplicate arc {} -> {}", i, j);

        // Adjacency lists must not yet contain the arc when the index
        // cells are adjusted.
        self.update_two_paths(i, j, 1);

        let pos = self.arcs.len() as u32;
        self.arcs.push(ArcPair { tail: i, head: j });
        self.arc_pos.insert(dyad_key(i, j), pos);
        self.out_neighbours[i as usize].push(j);
        self.in_neighbours[j as usize].push(i);
    }

    /// Removes arc i->j in O(1) via the reverse index and swap-with-last.
    /// Requires the arc to be present.
    pub fn remove_arc(&mut self, i: u32, j: u32) {
        let pos = self.arc_pos.remove(&dyad_key(i, j));
        debug_assert!(pos.is_some(), "removal of absent arc {} -> {}", i, j);
        let pos = match pos {
            Some(p) => p as usize,
            None => return,
        };

        self.arcs.swap_remove(pos);
        if pos < self.arcs.len() {
            let moved = self.arcs[pos];
            self.arc_pos
                .insert(dyad_key(moved.tail, moved.head), pos as u32);
        }
        swap_remove_value(&mut self.out_neighbours[i as usize], j);
        swap_remove_value(&mut self.in_neighbours[j as usize], i);

        self.update_two_paths(i, j, -1);
    }

    /// Toggling arc i->j changes exactly these two-path cells:
    /// v->i->j for in-neighbours v of i, i->j->w for out-neighbours w of
    /// j, the common-source pairs (j, w) for other targets w of i, and
    /// the common-target pairs (i, v) for other sources v of j.
    fn update_two_paths(&mut self, i: u32, j: u32, delta: i32) {
        if self.twopath.is_disabled() {
            return;
        }
        let idx = &mut self.twopath;
        let outs = &self.out_neighbours;
        let ins = &self.in_neighbours;

        for &v in &ins[i as usize] {
            if v != j {
                idx.apply(TwoPathRelation::Mixed, v, j, delta);
            }
        }
        for &w in &outs[j as usize] {
            if w != i {
                idx.apply(TwoPathRelation::Mixed, i, w, delta);
            }
        }
        for &w in &outs[i as usize] {
            if w != j {
                idx.apply(TwoPathRelation::CommonSource, j, w, delta);
                idx.apply(TwoPathRelation::CommonSource, w, j, delta);
            }
        }
        for &v in &ins[j as usize] {
            if v != i {
                idx.apply(TwoPathRelation::CommonTarget, i, v, delta);
                idx.apply(TwoPathRelation::CommonTarget, v, i, delta);
            }
        }
    }

    /// Number of two-paths of the given orientation between (i, j),
    /// from the index when one is maintained, otherwise by intersecting
    /// neighbor lists.
    pub fn two_paths(&self, rel: TwoPathRelation, i: u32, j: u32) -> u32 {
        if let Some(count) = self.twopath.query(rel, i, j) {
            return count;
        }
        self.count_two_paths(rel, i, j)
    }

    fn count_two_paths(&self, rel: TwoPathRelation, i: u32, j: u32) -> u32 {
        match rel {
            TwoPathRelation::Mixed => self
                .out_neighbours(i)
                .iter()
                .filter(|&&k| k != j && self.is_arc(k, j))
                .count() as u32,
            TwoPathRelation::CommonSource => self
                .in_neighbours(i)
                .iter()
                .filter(|&&k| k != j && self.is_arc(k, j))
                .count() as u32,
            TwoPathRelation::CommonTarget => self
                .out_neighbours(i)
                .iter()
                .filter(|&&k| k != j && self.is_arc(j, k))
                .count() as u32,
        }
    }

    /// Backend of the attached two-path index.
    pub fn two_path_backend(&self) -> TwoPathBackend {
        self.twopath.backend()
    }

    // ------------------------------------------------------------------
    // Snowball metadata and the inner-arc variants of insert/remove.
    // ------------------------------------------------------------------

    /// Attaches snowball zones and builds the derived structures.
    ///
    /// Validates that every wave 0..=max is non-empty, and that no arc
    /// skips a wave, which a snowball sample cannot produce.
    pub fn attach_snowball(&mut self, zone: Vec<u32>) -> Result<(), ExecError> {
        if zone.len() != self.num_nodes as usize {
            return Err(ExecError::Validation(format!(
                "zone file covers {} nodes, graph has {}",
                zone.len(),
                self.num_nodes
            )));
        }
        let max_zone = zone.iter().copied().max().unwrap_or(0);
        for z in 0..=max_zone {
            if !zone.contains(&z) {
                return Err(ExecError::Validation(format!("wave {} is empty", z)));
            }
        }
        for arc in &self.arcs {
            let (zi, zj) = (zone[arc.tail as usize], zone[arc.head as usize]);
            if zi.abs_diff(zj) > 1 {
                return Err(ExecError::Validation(format!(
                    "arc {} -> {} skips from wave {} to wave {}",
                    arc.tail, arc.head, zi, zj
                )));
            }
        }

        let inner_nodes: Vec<u32> = (0..self.num_nodes)
            .filter(|&v| zone[v as usize] < max_zone)
            .collect();

        let mut inner_arcs = Vec::new();
        let mut inner_pos = FxHashMap::default();
        for arc in &self.arcs {
            if zone[arc.tail as usize] < max_zone && zone[arc.head as usize] < max_zone {
                inner_pos.insert(dyad_key(arc.tail, arc.head), inner_arcs.len() as u32);
                inner_arcs.push(*arc);
            }
        }

        let mut prev_wave_degree = vec![0u32; self.num_nodes as usize];
        for v in 0..self.num_nodes {
            let zv = zone[v as usize];
            if zv == 0 {
                continue;
            }
            let mut seen = FxHashSet::default();
            for &u in self.out_neighbours(v).iter().chain(self.in_neighbours(v)) {
                if zone[u as usize] + 1 == zv {
                    seen.insert(u);
                }
            }
            prev_wave_degree[v as usize] = seen.len() as u32;
        }

        self.snowball = Some(SnowballMeta {
            zone,
            max_zone,
            inner_nodes,
            inner_arcs,
            inner_pos,
            prev_wave_degree,
        });
        Ok(())
    }

    #[inline]
    pub fn snowball(&self) -> Option<&SnowballMeta> {
        self.snowball.as_ref()
    }

    /// Inserts an arc between inner nodes, additionally maintaining the
    /// inner arc list and the previous-wave degrees.
    pub fn insert_arc_inner(&mut self, i: u32, j: u32) {
        // Adjacency before the toggle decides whether a new neighbor
        // relation appears.
        let already_adjacent = self.is_arc(j, i);
        self.insert_arc(i, j);

        let sb = self
            .snowball
            .as_mut()
            .expect("inner insert without snowball metadata");
        debug_assert!(sb.zone[i as usize] < sb.max_zone && sb.zone[j as usize] < sb.max_zone);
        sb.inner_pos.insert(dyad_key(i, j), sb.inner_arcs.len() as u32);
        sb.inner_arcs.push(ArcPair { tail: i, head: j });

        if !already_adjacent {
            let (zi, zj) = (sb.zone[i as usize], sb.zone[j as usize]);
            if zj + 1 == zi {
                sb.prev_wave_degree[i as usize] += 1;
            } else if zi + 1 == zj {
                sb.prev_wave_degree[j as usize] += 1;
            }
        }
    }

    /// Removes an arc between inner nodes, additionally maintaining the
    /// inner arc list and the previous-wave degrees.
    pub fn remove_arc_inner(&mut self, i: u32, j: u32) {
        self.remove_arc(i, j);
        let still_adjacent = self.is_arc(j, i);

        let sb = self
            .snowball
            .as_mut()
            .expect("inner remove without snowball metadata");
        let pos = sb
            .inner_pos
            .remove(&dyad_key(i, j))
            .expect("inner removal of arc missing from inner list") as usize;
        sb.inner_arcs.swap_remove(pos);
        if pos < sb.inner_arcs.len() {
            let moved = sb.inner_arcs[pos];
            sb.inner_pos
                .insert(dyad_key(moved.tail, moved.head), pos as u32);
        }

        if !still_adjacent {
            let (zi, zj) = (sb.zone[i as usize], sb.zone[j as usize]);
            if zj + 1 == zi {
                debug_assert!(sb.prev_wave_degree[i as usize] > 0);
                sb.prev_wave_degree[i as usize] -= 1;
            } else if zi + 1 == zj {
                debug_assert!(sb.prev_wave_degree[j as usize] > 0);
                sb.prev_wave_degree[j as usize] -= 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Consistency checks backing tests and debug assertions.
    // ------------------------------------------------------------------

    /// Full structural invariant check. Quadratic in places; intended for
    /// tests and debug assertions, never the sampling loop.
    pub fn consistent(&self) -> bool {
        if self.arcs.len() != self.arc_pos.len() {
            return false;
        }
        for (pos, arc) in self.arcs.iter().enumerate() {
            if arc.tail == arc.head {
                return false;
            }
            if self.arc_pos.get(&dyad_key(arc.tail, arc.head)) != Some(&(pos as u32)) {
                return false;
            }
            if !self.out_neighbours[arc.tail as usize].contains(&arc.head) {
                return false;
            }
            if !self.in_neighbours[arc.head as usize].contains(&arc.tail) {
                return false;
            }
        }
        let degree_total: usize = self.out_neighbours.iter().map(Vec::len).sum();
        let in_total: usize = self.in_neighbours.iter().map(Vec::len).sum();
        degree_total == self.arcs.len() && in_total == self.arcs.len()
    }

    /// Compares every maintained two-path cell against a from-scratch
    /// recomputation. Trivially true when the index is disabled.
    pub fn two_path_index_consistent(&self) -> bool {
        if self.twopath.is_disabled() {
            return true;
        }
        for i in 0..self.num_nodes {
            for j in 0..self.num_nodes {
                if i == j {
                    continue;
                }
                for rel in [
                    TwoPathRelation::Mixed,
                    TwoPathRelation::CommonSource,
                    TwoPathRelation::CommonTarget,
                ] {
                    if self.twopath.query(rel, i, j) != Some(self.count_two_paths(rel, i, j)) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Removes the first occurrence of `value` by swap-with-last.
#[inline]
fn swap_remove_value(list: &mut Vec<u32>, value: u32) {
    let pos = list.iter().position(|&x| x == value);
    debug_assert!(pos.is_some(), "adjacency list missing value {}", value);
    if let Some(pos) = pos {
        list.swap_remove(pos);
    }
}
