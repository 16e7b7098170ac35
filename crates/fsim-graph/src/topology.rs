//! Calculation order and tear-edge selection.
//!
//! The analyzer splits the graph into strongly connected components,
//! then picks tear edges inside each cyclic component with a weighted
//! heuristic: bidirectional pairs are torn first, a minimum spanning tree
//! over the component forms the acyclic skeleton, and every remaining edge
//! is tried in ascending weight order, kept only if it does not close a
//! cycle. Each cyclic component is finally ordered by a
//! topological sort of its torn subgraph.

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::DirectedGraph;
use crate::scc::strongly_connected_components;
use crate::search::{reaches, topological_sort};
use crate::weights::{Weights, adjacent_loops, min_spanning_tree, weighted_matrix};

/// Group of vertices evaluated together.
///
/// No tears: vertices are evaluated once in the stored order. With tears:
/// the vertices form one recycle loop that is opened at the tear edges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub vertices: Vec<usize>,
    pub tears: Vec<(usize, usize)>,
}

impl Partition {
    pub fn is_cyclic(&self) -> bool {
        !self.tears.is_empty()
    }
}

/// Result of [`TopologyAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Analysis {
    pub partitions: Vec<Partition>,
}

impl Analysis {
    pub fn tear_count(&self) -> usize {
        self.partitions.iter().map(|p| p.tears.len()).sum()
    }

    pub fn tears(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.partitions.iter().flat_map(|p| p.tears.iter().copied())
    }
}

/// Stateless analyzer over a borrowed graph.
pub struct TopologyAnalyzer<'a> {
    graph: &'a DirectedGraph,
}

impl<'a> TopologyAnalyzer<'a> {
    pub fn new(graph: &'a DirectedGraph) -> Self {
        Self { graph }
    }

    /// Partition the graph and open every recycle loop.
    ///
    /// Partitions are ordered producer before consumer; runs of adjacent
    /// acyclic partitions are merged into one.
    pub fn analyze(&self) -> GraphResult<Analysis> {
        let components = strongly_connected_components(self.graph);
        let selected = self.tear_edges(&components);
        let selected_count: usize = selected.iter().map(Vec::len).sum();

        let mut partitions = Vec::with_capacity(components.len());
        for component in components {
            if component.len() <= 1 {
                partitions.push(Partition {
                    vertices: component,
                    tears: Vec::new(),
                });
                continue;
            }
            partitions.push(self.order_cycle(component, &selected)?);
        }

        let assigned: usize = partitions.iter().map(|p| p.tears.len()).sum();
        if assigned != selected_count {
            return Err(GraphError::InconsistentTears {
                selected: selected_count,
                assigned,
            });
        }

        let merged = merge_acyclic(partitions);
        debug!(
            partitions = merged.len(),
            tears = assigned,
            "topology analyzed"
        );
        Ok(Analysis { partitions: merged })
    }

    /// Tear edges per source vertex, chosen component by component.
    fn tear_edges(&self, components: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let weights = weighted_matrix(self.graph, components);
        let mut tears = vec![Vec::new(); self.graph.vertex_count()];
        for component in components.iter().filter(|c| c.len() > 1) {
            for (v, w) in self.component_tears(component, &weights) {
                tears[v].push(w);
            }
        }
        tears
    }

    /// Tear edges inside one strongly connected component.
    ///
    /// Local indices follow ascending vertex order so that ties resolve the
    /// same way as in the enumeration of the whole graph.
    fn component_tears(&self, component: &[usize], weights: &Weights) -> Vec<(usize, usize)> {
        let mut vertices = component.to_vec();
        vertices.sort_unstable();
        let mut local = vec![usize::MAX; self.graph.vertex_count()];
        for (j, &v) in vertices.iter().enumerate() {
            local[v] = j;
        }

        let mut sub: Weights = vertices
            .iter()
            .map(|&v| vertices.iter().map(|&w| weights[v][w]).collect())
            .collect();
        let mut torn = adjacent_loops(&sub);
        for (v, ws) in torn.iter().enumerate() {
            for &w in ws {
                sub[v][w] = 0;
            }
        }

        let Some(mut dag) = min_spanning_tree(&sub) else {
            debug!(?vertices, "no spanning tree over component");
            return Vec::new();
        };

        // stable sort keeps enumeration order among equal weights
        let mut candidates: Vec<(u64, usize, usize)> = self
            .graph
            .edges()
            .filter(|&(v, w)| local[v] != usize::MAX && local[w] != usize::MAX)
            .map(|(v, w)| (local[v], local[w]))
            .filter(|&(v, w)| !dag[v].contains(&w) && !torn[v].contains(&w))
            .map(|(v, w)| (sub[v][w], v, w))
            .collect();
        candidates.sort_by_key(|&(weight, _, _)| weight);

        for (_, v, w) in candidates {
            dag[v].push(w);
            if reaches(&dag, w, v) {
                dag[v].pop();
                torn[v].push(w);
            }
        }

        let mut tears = Vec::new();
        for (v, ws) in torn.iter().enumerate() {
            for &w in ws {
                tears.push((vertices[v], vertices[w]));
            }
        }
        tears
    }

    fn order_cycle(&self, component: Vec<usize>, selected: &[Vec<usize>]) -> GraphResult<Partition> {
        let n = self.graph.vertex_count();
        let size = component.len();
        let mut local = vec![usize::MAX; n];
        for (j, &v) in component.iter().enumerate() {
            local[v] = j;
        }

        let adjacency = self.graph.adjacency();
        let mut sub: Vec<Vec<usize>> = vec![Vec::new(); size];
        for &v in &component {
            for &w in &adjacency[v] {
                if local[w] != usize::MAX {
                    sub[local[v]].push(local[w]);
                }
            }
        }

        let mut tears = Vec::new();
        for (v, ws) in selected.iter().enumerate() {
            if local[v] == usize::MAX {
                continue;
            }
            for &w in ws {
                if local[w] == usize::MAX {
                    continue;
                }
                let targets = &mut sub[local[v]];
                if let Some(pos) = targets.iter().position(|&x| x == local[w]) {
                    targets.remove(pos);
                    tears.push((v, w));
                }
            }
        }
        if tears.is_empty() {
            return Err(GraphError::UnresolvableCycle {
                vertices: component,
            });
        }

        let vertices = topological_sort(&sub)
            .into_iter()
            .map(|j| component[j])
            .collect();
        Ok(Partition { vertices, tears })
    }
}

fn merge_acyclic(partitions: Vec<Partition>) -> Vec<Partition> {
    let mut merged: Vec<Partition> = Vec::with_capacity(partitions.len());
    for p in partitions {
        match merged.last_mut() {
            Some(last) if !last.is_cyclic() && !p.is_cyclic() => {
                last.vertices.extend(p.vertices);
            }
            _ => merged.push(p),
        }
    }
    merged
}
