//! Error types for surfopt.
//!
//! Refusals of local edits are not errors: operators report them as an
//! [`Outcome`](crate::algo::optimize::Outcome). The variants below cover invalid
//! input and fatal topological corruption of the triangle graph.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building or optimizing a surface mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A triangle references an invalid vertex index.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A triangle has duplicate vertex indices.
    #[error("triangle {triangle} is degenerate (has duplicate vertices)")]
    DegenerateTriangle {
        /// The triangle index.
        triangle: usize,
    },

    /// The vertex position and parametric coordinate tables disagree in length.
    #[error("{positions} positions but {uvs} parametric coordinates")]
    VertexTableMismatch {
        /// Number of physical positions.
        positions: usize,
        /// Number of parametric coordinates.
        uvs: usize,
    },

    /// An edge is shared by more than two live triangles.
    #[error("topological corruption: edge ({v0}, {v1}) is shared by {count} triangles")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
        /// Number of triangles found on the edge.
        count: usize,
    },

    /// Two triangles traverse a shared edge in the same direction.
    #[error("topological corruption: edge ({v0}, {v1}) is traversed twice in the same direction")]
    InconsistentOrientation {
        /// Origin of the directed edge.
        v0: usize,
        /// Destination of the directed edge.
        v1: usize,
    },

    /// A live triangle links to a deleted or missing neighbor.
    #[error("topological corruption: triangle {triangle} links to dead neighbor {neighbor}")]
    DanglingNeighbor {
        /// The live triangle.
        triangle: usize,
        /// The neighbor it points to.
        neighbor: usize,
    },

    /// A neighbor link is not reciprocated across the same edge.
    #[error("topological corruption: triangle {triangle} -> {neighbor} is not reciprocal")]
    AsymmetricNeighbor {
        /// The triangle holding the link.
        triangle: usize,
        /// The neighbor that does not link back.
        neighbor: usize,
    },

    /// The mesh outgrew the ids its index type can address.
    #[error("{element} count would exceed the {capacity} ids of the index type")]
    IndexOverflow {
        /// Kind of element being added (`"vertex"` or `"triangle"`).
        element: &'static str,
        /// Number of ids the index type can address.
        capacity: usize,
    },

    /// The geometric entity is not a surface.
    #[error("entity {tag} has dimension {dimension}, expected a surface")]
    NotASurface {
        /// Entity tag.
        tag: usize,
        /// Reported topological dimension.
        dimension: u8,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Whether this error reports a corrupted triangle graph.
    pub fn is_topological_corruption(&self) -> bool {
        matches!(
            self,
            MeshError::NonManifoldEdge { .. }
                | MeshError::InconsistentOrientation { .. }
                | MeshError::DanglingNeighbor { .. }
                | MeshError::AsymmetricNeighbor { .. }
        )
    }
}
