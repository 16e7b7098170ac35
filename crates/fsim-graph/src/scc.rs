//! Tarjan strongly connected components.

use crate::graph::DirectedGraph;

const UNVISITED: usize = usize::MAX;

/// Strongly connected components, producers before consumers.
///
/// Uses an explicit frame stack so deep flowsheets cannot overflow the call stack.
pub fn strongly_connected_components(graph: &DirectedGraph) -> Vec<Vec<usize>> {
    let n = graph.vertex_count();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = counter;
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = graph.successors(v).get(frame.1) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    low[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components.reverse();
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut c: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        for v in &mut c {
            v.sort_unstable();
        }
        c
    }

    #[test]
    fn chain_is_one_component_per_vertex_in_order() {
        let g = DirectedGraph::from_adjacency(vec![vec![1], vec![2], vec![]]).unwrap();
        assert_eq!(strongly_connected_components(&g), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn reverse_chain_still_producer_first() {
        let g = DirectedGraph::from_adjacency(vec![vec![], vec![0], vec![1]]).unwrap();
        assert_eq!(strongly_connected_components(&g), vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn recycle_forms_single_component() {
        // 0 -> 1 -> 2 -> 3, 2 -> 1
        let g = DirectedGraph::from_adjacency(vec![vec![1], vec![2], vec![3, 1], vec![]]).unwrap();
        assert_eq!(
            sorted(strongly_connected_components(&g)),
            vec![vec![0], vec![1, 2], vec![3]]
        );
    }

    #[test]
    fn empty_graph() {
        assert!(strongly_connected_components(&DirectedGraph::new(0)).is_empty());
    }
}
