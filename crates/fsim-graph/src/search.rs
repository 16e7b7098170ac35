//! Depth-first helpers over plain adjacency lists.

/// Reverse post-order of a DFS started from each unvisited vertex in turn.
pub(crate) fn topological_sort(adj: &[Vec<usize>]) -> Vec<usize> {
    let n = adj.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        frames.push((root, 0));
        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = adj[v].get(frame.1) {
                frame.1 += 1;
                if !visited[w] {
                    visited[w] = true;
                    frames.push((w, 0));
                }
            } else {
                frames.pop();
                order.push(v);
            }
        }
    }

    order.reverse();
    order
}

/// Whether `to` can be reached from `from` through at least one edge.
pub(crate) fn reaches(adj: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut visited = vec![false; adj.len()];
    let mut stack = vec![from];
    visited[from] = true;
    while let Some(v) = stack.pop() {
        for &w in &adj[v] {
            if visited[w] {
                continue;
            }
            if w == to {
                return true;
            }
            visited[w] = true;
            stack.push(w);
        }
    }
    false
}
