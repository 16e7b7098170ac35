//! Graph-specific error types.

use fsim_core::CoreError;

/// Graph construction and analysis errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge endpoint is not a vertex of the graph.
    VertexOutOfRange { vertex: usize, count: usize },

    /// A unit feeds itself directly.
    SelfLoop { vertex: usize },

    /// A strongly connected component could not be opened by tearing edges.
    UnresolvableCycle { vertices: Vec<usize> },

    /// Tears assigned to partitions disagree with the tears selected.
    InconsistentTears { selected: usize, assigned: usize },

    /// ID not found in index map.
    IdNotFound { what: &'static str },
}

pub type GraphResult<T> = Result<T, GraphError>;

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::VertexOutOfRange { vertex, count } => {
                write!(f, "Vertex {} out of range ({} vertices)", vertex, count)
            }
            GraphError::SelfLoop { vertex } => {
                write!(f, "Vertex {} is connected to itself", vertex)
            }
            GraphError::UnresolvableCycle { vertices } => {
                write!(f, "Cannot break the cycle through vertices {:?}", vertices)
            }
            GraphError::InconsistentTears { selected, assigned } => {
                write!(
                    f,
                    "{} tear edges selected but {} assigned to partitions",
                    selected, assigned
                )
            }
            GraphError::IdNotFound { what } => {
                write!(f, "{} not found in index map", what)
            }
        }
    }
}

impl std::error::Error for GraphError {}

impl From<GraphError> for CoreError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::VertexOutOfRange { vertex, count } => CoreError::IndexOob {
                what: "graph vertex",
                index: vertex,
                len: count,
            },
            GraphError::IdNotFound { what } => CoreError::InvalidArg { what },
            _ => CoreError::Invariant {
                what: "graph analysis failed",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_vertices() {
        let err = GraphError::UnresolvableCycle {
            vertices: vec![1, 2],
        };
        assert!(err.to_string().contains("[1, 2]"));
    }

    #[test]
    fn converts_to_core() {
        let core: CoreError = GraphError::VertexOutOfRange { vertex: 5, count: 2 }.into();
        assert!(matches!(core, CoreError::IndexOob { index: 5, len: 2, .. }));
    }
}
