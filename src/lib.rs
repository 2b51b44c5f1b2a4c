//! # Surfopt
//!
//! Local-operator optimization of triangulated parametric surface patches.
//!
//! Surfopt takes an existing triangulation of a surface, with every vertex
//! carrying both its 3D position and its parametric `(u, v)` location, and
//! improves it in place so that edge lengths match a background size field
//! and triangles are well shaped. It does so with local edits only:
//! edge swaps, edge splits, vertex collapses and optional parametric smoothing.
//!
//! ## Features
//!
//! - **Triangle adjacency graph**: per-triangle neighbor links with type-safe
//!   indices and tombstoned deletion
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Pluggable geometry**: any [`Surface`](surface::Surface) mapping `(u, v)`
//!   to 3D, any [`SizeField`](sizing::SizeField) giving target lengths
//! - **Three swap criteria**: shape quality, anisotropic Delaunay, surface closeness
//! - **Parallel batches**: independent surfaces are optimized on the rayon pool
//!
//! ## Quick Start
//!
//! ```
//! use surfopt::prelude::*;
//! use nalgebra::Point2;
//!
//! // A unit square in the parameter plane, split along one diagonal
//! let uvs = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let plane = PlanarSurface::xy();
//! let mut mesh: SurfaceMesh = build_on_surface(&plane, &uvs, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! // Refine towards edges of length 0.25
//! let options = OptimizeOptions::new(SwapCriterion::Delaunay);
//! let stats = optimize_surface_mesh(&mut mesh, &plane, &UniformSize(0.25), &options).unwrap();
//!
//! println!("{} triangles after {} passes", stats.live_triangles, stats.passes);
//! assert!(mesh.num_live_triangles() > 2);
//! check_topology(&mesh).unwrap();
//! ```
//!
//! ## Curved Surfaces
//!
//! Any closure `(u, v) -> point` can serve as a surface. Positions of new
//! vertices are always evaluated on the surface, never interpolated:
//!
//! ```
//! use surfopt::prelude::*;
//! use nalgebra::{Point2, Point3};
//!
//! let cylinder = ParametricSurface::new(|uv: Point2<f64>| {
//!     Point3::new(uv.x.cos(), uv.x.sin(), uv.y)
//! });
//! let uvs = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.5, 0.0),
//!     Point2::new(1.5, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let mut mesh: SurfaceMesh = build_on_surface(&cylinder, &uvs, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let options = OptimizeOptions::new(SwapCriterion::Closeness).sequential();
//! optimize_surface_mesh(&mut mesh, &cylinder, &UniformSize(0.4), &options).unwrap();
//!
//! for v in mesh.vertex_ids() {
//!     let p = mesh.position(v);
//!     assert!(((p.x * p.x + p.y * p.y).sqrt() - 1.0).abs() < 1e-9);
//! }
//! ```
//!
//! ## Logging
//!
//! The optimizer emits [`tracing`] events: one span per surface, a summary per
//! phase at `debug`, refused edits at `trace`, and corruption at `error`.
//! Installing a subscriber is left to the application.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
pub mod sizing;
pub mod surface;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use surfopt::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::optimize::{
        optimize_surface_mesh, optimize_surface_mesh_with_progress, optimize_surfaces,
        OptimizeOptions, OptimizeStats, Outcome, Refusal, SplitCriterion, SwapCriterion,
    };
    pub use crate::algo::{Phase, PhaseReport, Progress};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, build_on_surface, check_topology, to_face_vertex, MeshIndex,
        SurfaceMesh, Triangle, TriangleId, Vertex, VertexId,
    };
    pub use crate::sizing::{SizeBounds, SizeField, SizeFn, SizeQuery, UniformSize};
    pub use crate::surface::{EntityDim, ParametricSurface, PlanarSurface, Surface};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
