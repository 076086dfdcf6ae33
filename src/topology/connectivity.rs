//! CSR connectivity tables.
//!
//! A [`Connectivity`] maps every "from" entity (by local index) to an ordered
//! run of "to" [`EntityId`]s:
//!
//! * `offsets[i] .. offsets[i+1]` = the run of entity `i`
//! * `to_ids`                     = concatenated runs
//!
//! A table with no offsets at all has not been computed yet; the derivation
//! engine treats that as "missing", never as "no adjacency". A computed table
//! always holds `from_size() + 1` offsets.
//!
//! [`DomainConnectivity`] groups the `(from_dim, to_dim)` tables of one
//! ordered `(from_domain, to_domain)` pair.

use std::fmt;
use std::ops::Range;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshTopologyError;
use crate::topology::id::EntityId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connectivity {
    offsets: Vec<usize>,
    to_ids: Vec<EntityId>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the table has not been computed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Drop all rows and return to the "not computed" state.
    pub fn clear(&mut self) {
        self.offsets.clear();
        self.to_ids.clear();
    }

    /// Build the table from one ordered id list per from-entity.
    pub fn init<R: AsRef<[EntityId]>>(&mut self, rows: &[R]) {
        let total = rows.iter().map(|r| r.as_ref().len()).sum();
        self.offsets = Vec::with_capacity(rows.len() + 1);
        self.to_ids = Vec::with_capacity(total);
        self.offsets.push(0);
        for row in rows {
            self.to_ids.extend_from_slice(row.as_ref());
            self.offsets.push(self.to_ids.len());
        }
    }

    /// Mark the table computed with zero rows; rows are then added with
    /// [`push`](Self::push) and [`end_from`](Self::end_from).
    pub fn init_empty(&mut self) {
        self.offsets.clear();
        self.offsets.push(0);
        self.to_ids.clear();
    }

    /// Append a target to the row under construction.
    pub fn push(&mut self, id: EntityId) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.to_ids.push(id);
    }

    /// Close the current row, which received `count` targets.
    pub fn add_count(&mut self, count: usize) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        let last = *self.offsets.last().unwrap_or(&0);
        debug_assert_eq!(
            last + count,
            self.to_ids.len(),
            "add_count disagrees with pushed targets"
        );
        self.offsets.push(last + count);
    }

    /// Close the current row with whatever has been pushed since the last one.
    pub fn end_from(&mut self) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.offsets.push(self.to_ids.len());
    }

    /// Pre-size the table from known per-row counts; targets are filled with
    /// [`set`](Self::set).
    pub fn resize(&mut self, counts: &[usize]) {
        self.offsets = Vec::with_capacity(counts.len() + 1);
        self.offsets.push(0);
        let mut acc = 0;
        for &c in counts {
            acc += c;
            self.offsets.push(acc);
        }
        self.to_ids = vec![EntityId::default(); acc];
    }

    /// Write `id` at position `pos` of row `from`.
    #[inline]
    pub fn set(&mut self, from: usize, id: EntityId, pos: usize) {
        let start = self.offsets[from];
        debug_assert!(start + pos < self.offsets[from + 1], "set past end of row");
        self.to_ids[start + pos] = id;
    }

    /// Number of rows.
    #[inline]
    pub fn from_size(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of stored targets.
    #[inline]
    pub fn to_size(&self) -> usize {
        self.to_ids.len()
    }

    #[inline]
    pub fn range(&self, from: usize) -> Range<usize> {
        self.offsets[from]..self.offsets[from + 1]
    }

    /// Targets of row `from`, borrowed from the flattened array.
    ///
    /// # Panics
    /// Panics if `from >= from_size()`; see
    /// [`try_get_entities`](Self::try_get_entities).
    #[inline]
    pub fn get_entities(&self, from: usize) -> &[EntityId] {
        &self.to_ids[self.range(from)]
    }

    #[inline]
    pub fn get_entities_mut(&mut self, from: usize) -> &mut [EntityId] {
        let r = self.range(from);
        &mut self.to_ids[r]
    }

    pub fn try_get_entities(&self, from: usize) -> Result<&[EntityId], MeshTopologyError> {
        if from < self.from_size() {
            Ok(self.get_entities(from))
        } else {
            Err(MeshTopologyError::OutOfRange {
                what: "connectivity row",
                index: from,
                limit: self.from_size(),
            })
        }
    }

    /// Number of targets of row `from`.
    #[inline]
    pub fn count(&self, from: usize) -> usize {
        self.offsets[from + 1] - self.offsets[from]
    }

    /// Reverse row `from` in place.
    pub fn reverse_entities(&mut self, from: usize) {
        self.get_entities_mut(from).reverse();
    }

    /// Permute row `from` in place: position `i` receives the target that was
    /// at `order[i]`.
    pub fn reorder_entities(&mut self, from: usize, order: &[usize]) -> Result<(), MeshTopologyError> {
        let row = self.get_entities_mut(from);
        if order.len() != row.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "reorder permutation vs row",
                left: order.len(),
                right: row.len(),
            });
        }
        let mut seen = vec![false; order.len()];
        for &o in order {
            if o >= seen.len() || std::mem::replace(&mut seen[o], true) {
                return Err(MeshTopologyError::InvariantViolation(format!(
                    "{order:?} is not a permutation"
                )));
            }
        }
        let original = row.to_vec();
        for (slot, &o) in row.iter_mut().zip(order) {
            *slot = original[o];
        }
        Ok(())
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn to_ids(&self) -> &[EntityId] {
        &self.to_ids
    }

    /// Replace both arrays wholesale; used when loading a checkpoint.
    pub(crate) fn set_raw(
        &mut self,
        offsets: Vec<usize>,
        to_ids: Vec<EntityId>,
    ) -> Result<(), MeshTopologyError> {
        let candidate = Connectivity { offsets, to_ids };
        candidate.validate_invariants()?;
        *self = candidate;
        Ok(())
    }

    /// Iterate rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[EntityId]> + '_ {
        (0..self.from_size()).map(move |i| self.get_entities(i))
    }
}

impl DebugInvariants for Connectivity {
    fn validate_invariants(&self) -> Result<(), MeshTopologyError> {
        let Some((&first, _)) = self.offsets.split_first() else {
            if self.to_ids.is_empty() {
                return Ok(());
            }
            return Err(MeshTopologyError::InvariantViolation(format!(
                "{} targets stored without offsets",
                self.to_ids.len()
            )));
        };
        if first != 0 {
            return Err(MeshTopologyError::InvariantViolation(format!(
                "first offset is {first}, expected 0"
            )));
        }
        if let Some(w) = self.offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(MeshTopologyError::InvariantViolation(format!(
                "offsets decrease at row {w}"
            )));
        }
        let last = *self.offsets.last().unwrap_or(&0);
        if last != self.to_ids.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "final offset vs targets",
                left: last,
                right: self.to_ids.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().enumerate() {
            write!(f, "{i}:")?;
            for id in row {
                write!(f, " {}", id.entity())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// All `(from_dim, to_dim)` tables between two domains.
#[derive(Clone, Debug)]
pub struct DomainConnectivity {
    from_domain: usize,
    to_domain: usize,
    dims: usize,
    tables: Vec<Connectivity>,
}

impl DomainConnectivity {
    /// Tables for dimensions `0..=top`.
    pub fn new(from_domain: usize, to_domain: usize, top: usize) -> Self {
        let dims = top + 1;
        Self {
            from_domain,
            to_domain,
            dims,
            tables: vec![Connectivity::default(); dims * dims],
        }
    }

    pub fn from_domain(&self) -> usize {
        self.from_domain
    }

    pub fn to_domain(&self) -> usize {
        self.to_domain
    }

    #[inline]
    pub fn get(&self, from_dim: usize, to_dim: usize) -> &Connectivity {
        &self.tables[from_dim * self.dims + to_dim]
    }

    #[inline]
    pub fn get_mut(&mut self, from_dim: usize, to_dim: usize) -> &mut Connectivity {
        &mut self.tables[from_dim * self.dims + to_dim]
    }

    /// `(from_dim, to_dim, table)` for every table, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Connectivity)> + '_ {
        self.tables
            .iter()
            .enumerate()
            .map(move |(k, c)| (k / self.dims, k % self.dims, c))
    }
}

impl fmt::Display for DomainConnectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (fd, td, c) in self.iter() {
            if c.is_empty() {
                continue;
            }
            writeln!(f, "----- {fd} -> {td}")?;
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(e: usize) -> EntityId {
        EntityId::new(0, 0, e, 0)
    }

    #[test]
    fn init_builds_offsets_in_one_pass() {
        let mut c = Connectivity::new();
        assert!(c.is_empty());
        c.init(&[vec![v(0), v(1)], vec![], vec![v(2)]]);
        assert!(!c.is_empty());
        assert_eq!(c.offsets(), &[0, 2, 2, 3]);
        assert_eq!(c.from_size(), 3);
        assert_eq!(c.get_entities(0), &[v(0), v(1)]);
        assert!(c.get_entities(1).is_empty());
        assert_eq!(c.count(2), 1);
        c.validate_invariants().unwrap();
    }

    #[test]
    fn zero_row_table_is_computed() {
        let mut c = Connectivity::new();
        c.init::<Vec<EntityId>>(&[]);
        assert!(!c.is_empty());
        assert_eq!(c.from_size(), 0);
    }

    #[test]
    fn push_and_close_rows() {
        let mut c = Connectivity::new();
        c.push(v(3));
        c.push(v(4));
        c.add_count(2);
        c.end_from();
        c.push(v(5));
        c.end_from();
        assert_eq!(c.offsets(), &[0, 2, 2, 3]);
        assert_eq!(c.get_entities(2), &[v(5)]);
        c.validate_invariants().unwrap();
    }

    #[test]
    fn resize_then_set() {
        let mut c = Connectivity::new();
        c.resize(&[1, 2]);
        c.set(1, v(9), 1);
        c.set(1, v(8), 0);
        c.set(0, v(7), 0);
        assert_eq!(c.to_ids(), &[v(7), v(8), v(9)]);
    }

    #[test]
    fn reverse_and_reorder_rows() {
        let mut c = Connectivity::new();
        c.init(&[vec![v(0)], vec![v(1), v(2), v(3)]]);
        c.reverse_entities(1);
        assert_eq!(c.get_entities(1), &[v(3), v(2), v(1)]);
        c.reorder_entities(1, &[2, 0, 1]).unwrap();
        assert_eq!(c.get_entities(1), &[v(1), v(3), v(2)]);
        assert!(c.reorder_entities(1, &[0, 0, 1]).is_err());
        assert!(c.reorder_entities(1, &[0, 1]).is_err());
        assert_eq!(c.get_entities(0), &[v(0)]);
    }

    #[test]
    fn checked_row_access() {
        let mut c = Connectivity::new();
        c.init(&[vec![v(0)]]);
        assert!(c.try_get_entities(0).is_ok());
        assert!(matches!(
            c.try_get_entities(1),
            Err(MeshTopologyError::OutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn raw_arrays_are_validated() {
        let mut c = Connectivity::new();
        assert!(c.set_raw(vec![0, 2, 1], vec![v(0), v(1)]).is_err());
        assert!(c.set_raw(vec![0, 3], vec![v(0)]).is_err());
        assert!(c.set_raw(vec![], vec![v(0)]).is_err());
        c.set_raw(vec![0, 1, 2], vec![v(0), v(1)]).unwrap();
        assert_eq!(c.from_size(), 2);
    }

    #[test]
    fn domain_matrix_addressing() {
        let mut dc = DomainConnectivity::new(0, 1, 2);
        dc.get_mut(2, 0).init(&[vec![v(1)]]);
        assert!(!dc.get(2, 0).is_empty());
        assert!(dc.get(0, 2).is_empty());
        let computed: Vec<_> = dc
            .iter()
            .filter(|(_, _, c)| !c.is_empty())
            .map(|(fd, td, _)| (fd, td))
            .collect();
        assert_eq!(computed, vec![(2, 0)]);
        assert_eq!((dc.from_domain(), dc.to_domain()), (0, 1));
    }

    #[test]
    fn display_lists_rows() {
        let mut c = Connectivity::new();
        c.init(&[vec![v(0), v(1)], vec![v(1)]]);
        assert_eq!(c.to_string(), "0: 0 1\n1: 1\n");
    }
}
