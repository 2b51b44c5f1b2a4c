//! Vertex collapse.

use std::collections::HashSet;

use tracing::debug;

use super::context::MeshOptimizationContext;
use super::{Outcome, Refusal};
use crate::error::Result;
use crate::mesh::quality::signed_area_uv;
use crate::mesh::{vertex_star, MeshIndex, SurfaceMesh, TriangleId, VertexId};
use crate::sizing::SizeField;
use crate::surface::Surface;

/// Relative difference allowed between the parametric areas of the two fans.
const AREA_TOLERANCE: f64 = 1e-10;

/// Smallest admissible replacement triangle, relative to the triangle it replaces.
const MIN_AREA_RATIO: f64 = 0.1;

/// Remove local vertex `corner` of `t` by collapsing it onto its nearest neighbor.
///
/// The vertex must be surrounded by a closed ring `r[0..k]` of triangles
/// `(v, r[i], r[i + 1])`. If some ring vertex is closer than `l_min`, the closest
/// one `r[m]` receives the `k - 2` triangles `(r[m], r[j], r[j + 1])` for the
/// other ring edges. The collapse is refused if a replacement triangle is
/// inverted or shrinks below a tenth of the triangle it replaces, if the two
/// fans do not cover the same parametric area, or if `r[m]` is already
/// connected to a ring vertex it would be joined to.
pub fn collapse_vertex<I, S, F>(
    ctx: &mut MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
    t: TriangleId<I>,
    corner: usize,
) -> Result<Outcome>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    let v = mesh.triangle(t).vertices[corner];
    let star = vertex_star(mesh, t, v)?;
    if !star.closed {
        debug!(vertex = v.index(), "vertex cavity does not close");
        return Ok(Outcome::Refused(Refusal::OpenCavity));
    }

    let ring = &star.ring;
    let k = ring.len();
    if k < 3 || ring.iter().collect::<HashSet<_>>().len() != k {
        return Ok(Outcome::Refused(Refusal::LinkCondition));
    }

    // Closest ring vertex; ties go to the first.
    let mut nearest: Option<(usize, f64)> = None;
    for (i, &r) in ring.iter().enumerate() {
        let Some(length) = ctx.adim_length(mesh, v, r) else {
            continue;
        };
        if nearest.map_or(true, |(_, best)| length < best) {
            nearest = Some((i, length));
        }
    }
    let Some((m, length)) = nearest else {
        return Ok(Outcome::Refused(Refusal::Degenerate));
    };
    if length >= ctx.options().l_min {
        return Ok(Outcome::Refused(Refusal::NothingToCollapse));
    }
    let target = ring[m];

    let uv = |x: VertexId<I>| *mesh.uv(x);
    let old_area: Vec<f64> = (0..k)
        .map(|i| signed_area_uv(&uv(v), &uv(ring[i]), &uv(ring[(i + 1) % k])))
        .collect();
    let orientation = old_area.iter().sum::<f64>().signum();

    let mut fan = Vec::with_capacity(k - 2);
    let mut new_total = 0.0;
    for j in 1..k - 1 {
        let (a, b) = ((m + j) % k, (m + j + 1) % k);
        let area = orientation * signed_area_uv(&uv(target), &uv(ring[a]), &uv(ring[b]));
        let replaced = orientation * old_area[a];
        if area <= 0.0 || area < MIN_AREA_RATIO * replaced {
            return Ok(Outcome::Refused(Refusal::Degenerate));
        }
        new_total += area;
        fan.push([target, ring[a], ring[b]]);
    }

    let old_total: f64 = old_area.iter().map(|a| a.abs()).sum();
    if (new_total - old_total).abs() > AREA_TOLERANCE * (new_total + old_total) {
        return Ok(Outcome::Refused(Refusal::AreaMismatch));
    }

    // The target must not already be joined to a ring vertex it gains an edge to.
    let target_neighbors = vertex_star(mesh, star.triangles[m], target)?.neighbors();
    if (2..k - 1).any(|j| target_neighbors.contains(&ring[(m + j) % k])) {
        return Ok(Outcome::Refused(Refusal::LinkCondition));
    }

    ctx.replace_cavity(mesh, &star.triangles, &fan)?;
    Ok(Outcome::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::optimize::{collapse_phase, OptimizeOptions, SwapCriterion};
    use crate::mesh::tests::{create_fan, create_grid};
    use crate::mesh::{build_from_triangles, check_topology};
    use crate::sizing::UniformSize;
    use crate::surface::PlanarSurface;
    use nalgebra::{Point2, Point3};

    fn references(mesh: &SurfaceMesh, v: VertexId) -> usize {
        mesh.live_triangle_ids()
            .filter(|&t| mesh.triangle(t).local_vertex(v).is_some())
            .count()
    }

    #[test]
    fn test_fan_collapse_removes_center() {
        let (mut mesh, center) = create_fan(6, 0.05);
        let plane = PlanarSurface::xy();
        let field = UniformSize(0.3);
        let options = OptimizeOptions::new(SwapCriterion::Quality).with_length_bounds(0.2, 1.4);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);
        let area = mesh.total_parametric_area();

        assert_eq!(collapse_phase(&mut ctx, &mut mesh).unwrap(), 1);
        mesh.sweep_and_compact().unwrap();

        assert_eq!(mesh.num_live_triangles(), 4);
        assert_eq!(references(&mesh, center), 0);
        assert!(mesh.live_triangle_ids().all(|t| mesh.parametric_area(t) > 0.0));
        assert!((mesh.total_parametric_area() - area).abs() < 1e-10 * area);
        check_topology(&mesh).unwrap();
    }

    #[test]
    fn test_long_spokes_are_kept() {
        let (mut mesh, _) = create_fan(6, 0.05);
        let plane = PlanarSurface::xy();
        let field = UniformSize(0.05);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(
            collapse_vertex(&mut ctx, &mut mesh, TriangleId::new(0), 0).unwrap(),
            Outcome::Refused(Refusal::NothingToCollapse)
        );
        // Ring vertices sit on the boundary.
        assert_eq!(
            collapse_vertex(&mut ctx, &mut mesh, TriangleId::new(0), 1).unwrap(),
            Outcome::Refused(Refusal::OpenCavity)
        );
    }

    #[test]
    fn test_folding_collapse_is_refused() {
        // A concave ring: collapsing the center onto vertex 1 inverts the
        // triangle spanning the notch at vertex 3.
        let uvs = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.1, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(-0.05, 0.1),
            Point2::new(-1.0, 1.0),
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
        ];
        let positions: Vec<_> = uvs.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        let faces: Vec<[usize; 3]> = (0..6).map(|i| [0, 1 + i, 1 + (i + 1) % 6]).collect();
        let mut mesh: SurfaceMesh = build_from_triangles(&positions, &uvs, &faces).unwrap();
        let plane = PlanarSurface::xy();
        let field = UniformSize(1.0);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(
            collapse_vertex(&mut ctx, &mut mesh, TriangleId::new(0), 0).unwrap(),
            Outcome::Refused(Refusal::Degenerate)
        );
        assert_eq!(mesh.num_live_triangles(), 6);
    }

    #[test]
    fn test_grid_collapse_keeps_manifold() {
        let mut mesh = create_grid(4, 1.0);
        let plane = PlanarSurface::xy();
        let field = UniformSize(0.6);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        let accepted = collapse_phase(&mut ctx, &mut mesh).unwrap();
        mesh.sweep_and_compact().unwrap();

        assert!(accepted > 0);
        assert_eq!(mesh.num_live_triangles(), 32 - 2 * accepted);
        assert!((mesh.total_parametric_area() - 1.0).abs() < 1e-10);
        assert!(mesh.live_triangle_ids().all(|t| mesh.parametric_area(t) > 0.0));
        check_topology(&mesh).unwrap();
    }
}
