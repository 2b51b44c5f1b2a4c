//! Mesh construction utilities.
//!
//! This module builds [`SurfaceMesh`]es from face-vertex lists carrying both
//! physical and parametric coordinates, and exports them back.

use nalgebra::{Point2, Point3};

use super::adjacency::rebuild_all_neighbors;
use super::container::{SurfaceMesh, Triangle, Vertex};
use super::index::{MeshIndex, VertexId};
use crate::error::{MeshError, Result};
use crate::surface::Surface;

/// Build a surface mesh from positions, parametric coordinates and triangles.
///
/// Triangles must be counter-clockwise in the parameter plane and form an
/// orientable 2-manifold. Each vertex's local size is initialized to the length
/// of its shortest incident edge (0 for vertices no triangle references).
///
/// # Arguments
/// * `positions` - Physical vertex positions
/// * `uvs` - Parametric vertex positions, same length as `positions`
/// * `faces` - Triangles as `[v0, v1, v2]` indices
///
/// # Example
/// ```
/// use surfopt::mesh::{build_from_triangles, SurfaceMesh};
/// use nalgebra::{Point2, Point3};
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let uvs = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.5, 1.0)];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: SurfaceMesh = build_from_triangles(&positions, &uvs, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_live_triangles(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    positions: &[Point3<f64>],
    uvs: &[Point2<f64>],
    faces: &[[usize; 3]],
) -> Result<SurfaceMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if positions.len() != uvs.len() {
        return Err(MeshError::VertexTableMismatch {
            positions: positions.len(),
            uvs: uvs.len(),
        });
    }

    // Validate vertex indices
    for (ti, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= positions.len() {
                return Err(MeshError::InvalidVertexIndex { triangle: ti, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateTriangle { triangle: ti });
        }
    }

    let mut mesh = SurfaceMesh::with_capacity(positions.len(), faces.len());
    for (&position, &uv) in positions.iter().zip(uvs) {
        mesh.add_vertex(Vertex::new(position, uv))?;
    }

    // Shortest incident edge per vertex
    let mut shortest = vec![f64::INFINITY; positions.len()];
    for face in faces {
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            let length = (positions[b] - positions[a]).norm();
            shortest[a] = shortest[a].min(length);
            shortest[b] = shortest[b].min(length);
        }
    }
    for (vertex, length) in mesh.vertices.iter_mut().zip(shortest) {
        vertex.local_size = if length.is_finite() { length } else { 0.0 };
    }

    for face in faces {
        let vertices = face.map(VertexId::new);
        mesh.insert(Triangle::new(vertices, 0.0))?;
    }

    rebuild_all_neighbors(&mut mesh)?;

    Ok(mesh)
}

/// Build a surface mesh whose positions are the images of `uvs` on `surface`.
pub fn build_on_surface<I: MeshIndex, S: Surface>(
    surface: &S,
    uvs: &[Point2<f64>],
    faces: &[[usize; 3]],
) -> Result<SurfaceMesh<I>> {
    let positions: Vec<Point3<f64>> = uvs.iter().map(|&uv| surface.point(uv)).collect();
    build_from_triangles(&positions, uvs, faces)
}

/// Export a mesh as face-vertex lists.
///
/// The vertex tables are returned whole: vertices created by splits are
/// appended after the input vertices, and collapsed vertices stay in place but
/// are no longer referenced by any face.
pub fn to_face_vertex<I: MeshIndex>(
    mesh: &SurfaceMesh<I>,
) -> (Vec<Point3<f64>>, Vec<Point2<f64>>, Vec<[usize; 3]>) {
    let positions = mesh.vertices.iter().map(|v| v.position).collect();
    let uvs = mesh.vertices.iter().map(|v| v.uv).collect();
    let faces = mesh
        .live_triangle_ids()
        .map(|t| mesh.triangle(t).vertices.map(|v| v.index()))
        .collect();
    (positions, uvs, faces)
}
