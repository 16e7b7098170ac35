//! Directed unit graph.

use crate::error::{GraphError, GraphResult};

/// Adjacency list over vertices `0..n`.
///
/// Parallel edges to the same target are stored once; successors keep
/// their insertion order, which makes every analysis deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectedGraph {
    adj: Vec<Vec<usize>>,
}

impl DirectedGraph {
    pub fn new(vertices: usize) -> Self {
        Self {
            adj: vec![Vec::new(); vertices],
        }
    }

    pub fn from_adjacency(adj: Vec<Vec<usize>>) -> GraphResult<Self> {
        let mut g = Self::new(adj.len());
        for (v, targets) in adj.into_iter().enumerate() {
            for w in targets {
                g.add_edge(v, w)?;
            }
        }
        Ok(g)
    }

    /// Add `v → w`; duplicates are ignored.
    pub fn add_edge(&mut self, v: usize, w: usize) -> GraphResult<()> {
        let count = self.adj.len();
        for vertex in [v, w] {
            if vertex >= count {
                return Err(GraphError::VertexOutOfRange { vertex, count });
            }
        }
        if v == w {
            return Err(GraphError::SelfLoop { vertex: v });
        }
        if !self.adj[v].contains(&w) {
            self.adj[v].push(w);
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.adj.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adj.iter().map(Vec::len).sum()
    }

    pub fn successors(&self, v: usize) -> &[usize] {
        self.adj.get(v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, v: usize, w: usize) -> bool {
        self.successors(v).contains(&w)
    }

    /// All edges in enumeration order: by source, then insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adj
            .iter()
            .enumerate()
            .flat_map(|(v, ws)| ws.iter().map(move |&w| (v, w)))
    }

    pub(crate) fn adjacency(&self) -> &[Vec<usize>] {
        &self.adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_edges_are_merged() {
        let mut g = DirectedGraph::new(2);
        g.add_edge(0, 1).unwrap();
        g.add_edge(0, 1).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert!(g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));
    }

    #[test]
    fn rejects_bad_edges() {
        let mut g = DirectedGraph::new(2);
        assert_eq!(g.add_edge(1, 1), Err(GraphError::SelfLoop { vertex: 1 }));
        assert_eq!(
            g.add_edge(0, 7),
            Err(GraphError::VertexOutOfRange { vertex: 7, count: 2 })
        );
    }

    #[test]
    fn edges_follow_enumeration_order() {
        let g = DirectedGraph::from_adjacency(vec![vec![2, 1], vec![2], vec![]]).unwrap();
        assert_eq!(g.edges().collect::<Vec<_>>(), vec![(0, 2), (0, 1), (1, 2)]);
        assert!(g.successors(9).is_empty());
    }
}
