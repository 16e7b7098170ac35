//! Stable indexing between flowsheet ids and graph vertices.
//!
//! Provides bidirectional mappings between domain IDs (UnitId, StreamId)
//! and contiguous vertex indices (0..N).

use fsim_core::Id;

use crate::error::{GraphError, GraphResult};

/// Index map providing stable, contiguous indices for flowsheet objects.
///
/// O(1) lookup both ways. Ids need not be contiguous: removed objects
/// leave holes in the reverse table.
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    /// Contiguous list of ids (index -> Id).
    ids: Vec<Id>,

    /// Reverse lookup: Id -> index.
    /// Sized to max(Id.index) + 1; None if that ID doesn't exist.
    to_idx: Vec<Option<usize>>,

    what: &'static str,
}

impl IndexMap {
    /// Build an index map over `ids` in iteration order.
    pub fn new<I: IntoIterator<Item = Id>>(what: &'static str, ids: I) -> Self {
        let ids: Vec<Id> = ids.into_iter().collect();
        let max_idx = ids.iter().map(|id| id.index() as usize).max().unwrap_or(0);

        let mut to_idx = vec![None; max_idx + 1];
        for (i, &id) in ids.iter().enumerate() {
            to_idx[id.index() as usize] = Some(i);
        }

        Self { ids, to_idx, what }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Get the contiguous index for an ID.
    pub fn idx(&self, id: Id) -> GraphResult<usize> {
        self.to_idx
            .get(id.index() as usize)
            .and_then(|&opt| opt)
            .ok_or(GraphError::IdNotFound { what: self.what })
    }

    /// Get the ID for a contiguous index, if in range.
    pub fn id(&self, i: usize) -> Option<Id> {
        self.ids.get(i).copied()
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }
}
