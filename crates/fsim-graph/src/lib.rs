//! fsim-graph: unit-connectivity graph and calculation-order analysis.
//!
//! Provides:
//! - [`DirectedGraph`]: unit→unit adjacency with deduplicated edges
//! - Tarjan strongly-connected components (explicit stack, producers first)
//! - [`TopologyAnalyzer`]: partitions plus tear edges that make every
//!   recycle loop acyclic
//! - [`IndexMap`]: stable id ↔ contiguous index mapping
//!
//! # Example
//!
//! ```
//! use fsim_graph::{DirectedGraph, TopologyAnalyzer};
//!
//! // feed -> mixer -> splitter -> product, splitter -> mixer
//! let mut g = DirectedGraph::new(4);
//! g.add_edge(0, 1).unwrap();
//! g.add_edge(1, 2).unwrap();
//! g.add_edge(2, 3).unwrap();
//! g.add_edge(2, 1).unwrap();
//!
//! let analysis = TopologyAnalyzer::new(&g).analyze().unwrap();
//! assert_eq!(analysis.partitions.len(), 3);
//! assert_eq!(analysis.tear_count(), 1);
//! ```

pub mod error;
pub mod graph;
pub mod indexing;
pub mod scc;
pub(crate) mod search;
pub mod topology;
pub(crate) mod weights;

// Re-exports for ergonomics
pub use error::{GraphError, GraphResult};
pub use graph::DirectedGraph;
pub use indexing::IndexMap;
pub use scc::strongly_connected_components;
pub use topology::{Analysis, Partition, TopologyAnalyzer};
