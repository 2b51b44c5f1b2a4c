//! Edge split.

use super::context::{midpoint, MeshOptimizationContext};
use super::{edge_pair, EdgePair, Outcome, Refusal, SplitCriterion};
use crate::error::Result;
use crate::mesh::quality::shape_quality;
use crate::mesh::{MeshIndex, SurfaceMesh, TriangleId, Vertex};
use crate::sizing::SizeField;
use crate::surface::Surface;

/// Split the edge shared by `t` and its neighbor across local edge `edge`.
///
/// The edge is split when its adimensional length exceeds `l_max`. The new
/// vertex sits at the surface image of the parametric midpoint; its local
/// size is the mean of the endpoints' and its background size is sampled
/// there. With `t = (v1, v2, v3)` and the neighbor `(v2, v1, v4)`, the pair
/// becomes `(v1, vn, v3)`, `(vn, v2, v3)`, `(v1, v4, vn)` and `(v4, v2, vn)`.
///
/// Boundary edges are never split. Each edge is evaluated once per phase.
pub fn split_edge<I, S, F>(
    ctx: &mut MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
    t: TriangleId<I>,
    edge: usize,
) -> Result<Outcome>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    let Some(EdgePair { t1, t2, v1, v2, v3, v4 }) = edge_pair(mesh, t, edge)? else {
        return Ok(Outcome::Refused(Refusal::Boundary));
    };
    if v3 == v4 {
        return Ok(Outcome::Refused(Refusal::Degenerate));
    }
    if !ctx.mark_split_edge(v1, v2) {
        return Ok(Outcome::Refused(Refusal::AlreadyEvaluated));
    }

    let Some(length) = ctx.adim_length(mesh, v1, v2) else {
        return Ok(Outcome::Refused(Refusal::Degenerate));
    };
    if length <= ctx.options().l_max {
        return Ok(Outcome::Refused(Refusal::ShortEnough));
    }

    let uv = midpoint(mesh.uv(v1), mesh.uv(v2));
    let position = ctx.surface().point(uv);

    if ctx.options().split_criterion == SplitCriterion::Quality {
        let before = mesh.triangle_quality(t1).min(mesh.triangle_quality(t2));
        let (p1, p2) = (mesh.position(v1), mesh.position(v2));
        let (p3, p4) = (mesh.position(v3), mesh.position(v4));
        let after = shape_quality(p1, &position, p3)
            .min(shape_quality(&position, p2, p3))
            .min(shape_quality(p1, p4, &position))
            .min(shape_quality(p4, p2, &position));
        if after < before {
            return Ok(Outcome::Refused(Refusal::CriterionRejected));
        }
    }

    let local_size = 0.5 * (mesh.vertex(v1).local_size + mesh.vertex(v2).local_size);
    mesh.reserve_triangle_ids(4)?;
    let vn = mesh.add_vertex(Vertex {
        position,
        uv,
        local_size,
        background_size: ctx.sample_size(uv, position, local_size),
    })?;

    ctx.replace_cavity(
        mesh,
        &[t1, t2],
        &[[v1, vn, v3], [vn, v2, v3], [v1, v4, vn], [v4, v2, vn]],
    )?;
    Ok(Outcome::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::optimize::{split_phase, OptimizeOptions, SwapCriterion};
    use crate::mesh::tests::create_square;
    use crate::mesh::{build_on_surface, check_topology, VertexId};
    use crate::sizing::UniformSize;
    use crate::surface::{ParametricSurface, PlanarSurface};
    use nalgebra::{Point2, Point3};

    /// Two unit equilateral triangles (in the parameter plane) sharing edge (0, 1).
    fn equilateral_pair_uvs() -> Vec<Point2<f64>> {
        let h = 3f64.sqrt() / 2.0;
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, h),
            Point2::new(0.5, -h),
        ]
    }

    const PAIR: [[usize; 3]; 2] = [[0, 1, 2], [1, 0, 3]];

    #[test]
    fn test_split_phase_on_curved_pair() {
        // Cylinder of radius 2, u measured as arc length.
        let cylinder = ParametricSurface::new(|uv: Point2<f64>| {
            Point3::new(2.0 * (uv.x / 2.0).cos(), 2.0 * (uv.x / 2.0).sin(), uv.y)
        });
        let mut mesh: SurfaceMesh =
            build_on_surface(&cylinder, &equilateral_pair_uvs(), &PAIR).unwrap();
        let area = mesh.total_parametric_area();
        let field = UniformSize(0.3);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&cylinder, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(split_phase(&mut ctx, &mut mesh).unwrap(), 1);
        mesh.sweep_and_compact().unwrap();

        assert_eq!(mesh.num_live_triangles(), 4);
        assert_eq!(mesh.num_vertices(), 5);
        let vn = VertexId::new(4);
        let arc_mid = Point3::new(2.0 * 0.25f64.cos(), 2.0 * 0.25f64.sin(), 0.0);
        assert!((mesh.position(vn) - arc_mid).norm() < 1e-12);
        assert_eq!(*mesh.uv(vn), Point2::new(0.5, 0.0));
        assert!(mesh
            .live_triangle_ids()
            .all(|t| mesh.triangle(t).local_vertex(vn).is_some() && mesh.parametric_area(t) > 0.0));
        assert!((mesh.total_parametric_area() - area).abs() < 1e-8 * area);
        check_topology(&mesh).unwrap();
    }

    #[test]
    fn test_new_vertex_sizes() {
        let plane = PlanarSurface::xy();
        let mut mesh: SurfaceMesh =
            build_on_surface(&plane, &equilateral_pair_uvs(), &PAIR).unwrap();
        let field = UniformSize(0.3);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert!(split_edge(&mut ctx, &mut mesh, TriangleId::new(0), 0).unwrap().is_accepted());
        let vn = mesh.vertex(VertexId::new(4));
        assert!((vn.local_size - 1.0).abs() < 1e-12);
        assert!((vn.background_size - 0.3).abs() < 1e-12);

        // The neighbor is gone: its copy of the edge is never split again.
        assert!(!mesh.is_live(TriangleId::new(1)));
    }

    #[test]
    fn test_short_and_boundary_edges_are_kept() {
        let mut mesh = create_square();
        let plane = PlanarSurface::xy();
        let field = UniformSize(2.0);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(
            split_edge(&mut ctx, &mut mesh, TriangleId::new(0), 2).unwrap(),
            Outcome::Refused(Refusal::ShortEnough)
        );
        assert_eq!(
            split_edge(&mut ctx, &mut mesh, TriangleId::new(1), 0).unwrap(),
            Outcome::Refused(Refusal::AlreadyEvaluated)
        );
        assert_eq!(
            split_edge(&mut ctx, &mut mesh, TriangleId::new(0), 0).unwrap(),
            Outcome::Refused(Refusal::Boundary)
        );
        assert_eq!(mesh.num_vertices(), 4);
    }

    #[test]
    fn test_quality_gate_discards_the_vertex() {
        let plane = PlanarSurface::xy();
        let mut mesh: SurfaceMesh =
            build_on_surface(&plane, &equilateral_pair_uvs(), &PAIR).unwrap();
        let field = UniformSize(0.3);
        let options = OptimizeOptions::new(SwapCriterion::Quality)
            .with_split_criterion(SplitCriterion::Quality);
        let mut ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(
            split_edge(&mut ctx, &mut mesh, TriangleId::new(0), 0).unwrap(),
            Outcome::Refused(Refusal::CriterionRejected)
        );
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_live_triangles(), 2);
    }
}
