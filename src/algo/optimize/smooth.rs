//! Parametric vertex smoothing.

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::context::MeshOptimizationContext;
use crate::error::Result;
use crate::mesh::quality::signed_area_uv;
use crate::mesh::{vertex_star, MeshIndex, SurfaceMesh, TriangleId, VertexId, VertexStar};
use crate::sizing::SizeField;
use crate::surface::Surface;

/// Move every interior vertex towards the mean centroid of its triangles.
///
/// Proposals are computed from the current parameter locations of all vertices
/// and then applied one vertex at a time. A move is skipped if it would flatten
/// or invert one of the vertex's triangles in the parameter plane. Accepted
/// vertices are re-projected onto the surface. Their local size becomes the
/// shortest distance to a ring vertex, and their background size and triangle
/// keys are refreshed. Vertices on the boundary never move, and the topology is
/// left untouched.
///
/// Returns the number of vertices moved.
pub fn laplace_smooth<I, S, F>(
    ctx: &MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
) -> Result<usize>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    let stars = interior_stars(mesh)?;

    let propose = |star: &VertexStar<I>| centroid_average(mesh, star);
    let proposals: Vec<Point2<f64>> = if ctx.options().parallel {
        stars.par_iter().map(propose).collect()
    } else {
        stars.iter().map(propose).collect()
    };

    let mut moved = 0;
    for (star, uv) in stars.iter().zip(proposals) {
        let v = star.center;
        if uv == *mesh.uv(v) {
            continue;
        }
        if !keeps_orientation(mesh, star, &uv) {
            trace!(vertex = v.index(), "smoothing move would fold a triangle");
            continue;
        }

        let position = ctx.surface().point(uv);
        let local_size = star
            .ring
            .iter()
            .map(|&w| (mesh.position(w) - position).norm())
            .fold(f64::INFINITY, f64::min);
        let background_size = ctx.sample_size(uv, position, local_size);
        let vertex = mesh.vertex_mut(v);
        vertex.uv = uv;
        vertex.position = position;
        vertex.local_size = local_size;
        vertex.background_size = background_size;

        for &t in &star.triangles {
            let key = ctx.triangle_key(mesh, mesh.triangle(t).vertices);
            mesh.triangle_mut(t).key = key;
        }
        moved += 1;
    }

    debug!(moved, candidates = stars.len(), "smoothing sweep");
    Ok(moved)
}

/// Closed stars of all vertices referenced by a live triangle.
fn interior_stars<I: MeshIndex>(mesh: &SurfaceMesh<I>) -> Result<Vec<VertexStar<I>>> {
    let mut first: Vec<Option<TriangleId<I>>> = vec![None; mesh.num_vertices()];
    for t in mesh.live_triangle_ids() {
        for v in mesh.triangle(t).vertices {
            first[v.index()].get_or_insert(t);
        }
    }

    let mut stars = Vec::new();
    for (i, start) in first.into_iter().enumerate() {
        let Some(t) = start else {
            continue;
        };
        let star = vertex_star(mesh, t, VertexId::new(i))?;
        if star.closed {
            stars.push(star);
        }
    }
    Ok(stars)
}

fn centroid_average<I: MeshIndex>(mesh: &SurfaceMesh<I>, star: &VertexStar<I>) -> Point2<f64> {
    let sum = star
        .triangles
        .iter()
        .flat_map(|&t| mesh.triangle(t).vertices)
        .fold(Vector2::zeros(), |acc, v| acc + mesh.uv(v).coords);
    Point2::from(sum / (3 * star.triangles.len()) as f64)
}

fn keeps_orientation<I: MeshIndex>(
    mesh: &SurfaceMesh<I>,
    star: &VertexStar<I>,
    uv: &Point2<f64>,
) -> bool {
    let center = mesh.uv(star.center);
    let k = star.ring.len();
    (0..k).all(|i| {
        let (a, b) = (mesh.uv(star.ring[i]), mesh.uv(star.ring[(i + 1) % k]));
        let before = signed_area_uv(center, a, b);
        let after = signed_area_uv(uv, a, b);
        after * before.signum() > 0.0
    })
}
