//! Edge weighting and spanning-tree helpers used to choose tear edges.

use crate::graph::DirectedGraph;

/// Dense weight matrix; `0` means "no edge".
pub(crate) type Weights = Vec<Vec<u64>>;

/// Weights of every edge of `graph`.
///
/// Edges inside a component get `k_lo - out(u) + k_hi * in(u)` with degrees
/// counted inside components only, so the in-degree of the source always
/// dominates. Edges between components get weight 1.
pub(crate) fn weighted_matrix(graph: &DirectedGraph, components: &[Vec<usize>]) -> Weights {
    let n = graph.vertex_count();
    let mut component_of = vec![usize::MAX; n];
    for (c, vertices) in components.iter().enumerate() {
        for &v in vertices {
            component_of[v] = c;
        }
    }

    let mut reduced: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (v, w) in graph.edges() {
        if component_of[v] == component_of[w] {
            reduced[v].push(w);
        }
    }
    let mut in_degree = vec![0_u64; n];
    for ws in &reduced {
        for &w in ws {
            in_degree[w] += 1;
        }
    }

    let k_lo = reduced.iter().map(Vec::len).max().unwrap_or(0).max(1) as u64 + 1;
    let k_hi = 10_u64.pow(k_lo.ilog10() + 1);

    let mut weights = vec![vec![0_u64; n]; n];
    for (v, ws) in reduced.iter().enumerate() {
        for &w in ws {
            weights[v][w] = k_lo - ws.len() as u64 + k_hi * in_degree[v];
        }
    }
    for (v, w) in graph.edges() {
        if weights[v][w] == 0 {
            weights[v][w] = 1;
        }
    }
    weights
}

/// Bidirectionally coupled pairs: for each pair the heavier direction is torn.
pub(crate) fn adjacent_loops(weights: &Weights) -> Vec<Vec<usize>> {
    let n = weights.len();
    let mut loops: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in i..n {
            if weights[i][j] == 0 || weights[j][i] == 0 {
                continue;
            }
            if weights[i][j] >= weights[j][i] {
                if !loops[i].contains(&j) {
                    loops[i].push(j);
                }
            } else if !loops[j].contains(&i) {
                loops[j].push(i);
            }
        }
    }
    loops
}

/// Prim minimum spanning tree over the undirected view of `weights`,
/// rooted at vertex 0. Callers pass one strongly connected component.
///
/// Tree edges keep the direction they have in the graph. `None` when some
/// vertex cannot be reached.
pub(crate) fn min_spanning_tree(weights: &Weights) -> Option<Vec<Vec<usize>>> {
    let n = weights.len();
    if n == 0 {
        return Some(Vec::new());
    }
    let mut parent = vec![usize::MAX; n];
    let mut best = vec![u64::MAX; n];
    let mut included = vec![false; n];
    best[0] = 0;

    for _ in 0..n {
        let mut v = None;
        let mut min = u64::MAX;
        for j in 0..n {
            if !included[j] && best[j] < min {
                min = best[j];
                v = Some(j);
            }
        }
        let v = v?;
        included[v] = true;

        for w in 0..n {
            if included[w] {
                continue;
            }
            let forward = weights[v][w];
            if forward != 0 && forward < best[w] {
                parent[w] = v;
                best[w] = forward;
            }
            let backward = weights[w][v];
            if backward != 0 && backward < best[w] {
                parent[w] = v;
                best[w] = backward;
            }
        }
    }

    let mut tree: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, &p) in parent.iter().enumerate() {
        if p == usize::MAX {
            continue;
        }
        if weights[i][p] != 0 {
            tree[i].push(p);
        } else {
            tree[p].push(i);
        }
    }
    Some(tree)
}
