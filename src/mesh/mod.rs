//! Core mesh data structures.
//!
//! This module provides the triangle-soup-with-adjacency representation the
//! local operators work on, together with its construction, adjacency and
//! shape-measure utilities.
//!
//! # Overview
//!
//! The primary type is [`SurfaceMesh`]: a flat arena of [`Triangle`]s, each
//! holding three vertex ids and three neighbor ids, plus a vertex table carrying
//! physical and parametric coordinates and cached sizes. Deleting a triangle
//! only flags it; [`SurfaceMesh::sweep_and_compact`] discards flagged triangles
//! and renumbers the survivors.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`TriangleId`] - Identifies a triangle slot in the arena
//! - [`EdgeKey`] - Identifies an undirected edge by its endpoints
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! ```
//! use surfopt::mesh::{build_from_triangles, check_topology, SurfaceMesh};
//! use nalgebra::{Point2, Point3};
//!
//! let uvs = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let positions: Vec<_> = uvs.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//!
//! let mesh: SurfaceMesh = build_from_triangles(&positions, &uvs, &faces).unwrap();
//! check_topology(&mesh).unwrap();
//! ```

mod adjacency;
mod builder;
mod container;
mod index;
pub mod quality;

pub use adjacency::{
    check_topology, connect_triangles, rebuild_all_neighbors, rebuild_neighbors, vertex_star,
    VertexStar,
};
pub use builder::{build_from_triangles, build_on_surface, to_face_vertex};
pub use container::{SurfaceMesh, Triangle, Vertex};
pub use index::{EdgeKey, MeshIndex, TriangleId, VertexId};
