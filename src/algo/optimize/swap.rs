//! Edge swap.

use tracing::trace;

use super::context::{midpoint, MeshOptimizationContext};
use super::{edge_pair, EdgePair, Outcome, Refusal, SwapCriterion};
use crate::error::Result;
use crate::mesh::quality::{in_circumcircle_aniso, signed_area_uv};
use crate::mesh::{vertex_star, MeshIndex, SurfaceMesh, TriangleId, VertexId};
use crate::sizing::SizeField;
use crate::surface::Surface;

/// Relative difference allowed between the parametric areas of the two diagonals.
const AREA_TOLERANCE: f64 = 1e-10;

/// Smallest admissible replacement triangle, relative to the quad area.
const MIN_AREA_FRACTION: f64 = 1e-8;

/// Shape quality gain below which two diagonals count as equivalent.
const QUALITY_EPSILON: f64 = 1e-12;

/// Swap the diagonal shared by `t` and its neighbor across local edge `edge`.
///
/// With `t = (v1, v2, v3)` and the neighbor `(v2, v1, v4)`, the pair is replaced
/// by `(v2, v3, v4)` and `(v4, v3, v1)` when the new diagonal covers the same
/// parametric area and the configured [`SwapCriterion`] prefers it. Each vertex
/// quad is evaluated at most once per phase.
pub fn swap_edge<I, S, F>(
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
    if !ctx.mark_swap_quad([v1, v2, v3, v4]) {
        return Ok(Outcome::Refused(Refusal::AlreadyEvaluated));
    }

    let old = [[v1, v2, v3], [v2, v1, v4]];
    let new = [[v2, v3, v4], [v4, v3, v1]];

    let area =
        |[a, b, c]: [VertexId<I>; 3]| signed_area_uv(mesh.uv(a), mesh.uv(b), mesh.uv(c)).abs();
    let old_area = area(old[0]) + area(old[1]);
    let (a1, a2) = (area(new[0]), area(new[1]));
    let new_area = a1 + a2;
    let total = old_area + new_area;
    if (new_area - old_area).abs() > AREA_TOLERANCE * total {
        return Ok(Outcome::Refused(Refusal::AreaMismatch));
    }
    if a1 < MIN_AREA_FRACTION * total || a2 < MIN_AREA_FRACTION * total {
        return Ok(Outcome::Refused(Refusal::Degenerate));
    }

    let prefers_new = match ctx.options().swap_criterion {
        SwapCriterion::Quality => {
            let before = mesh.quality_of(old[0]).min(mesh.quality_of(old[1]));
            let after = mesh.quality_of(new[0]).min(mesh.quality_of(new[1]));
            Some(after > before + QUALITY_EPSILON)
        }
        SwapCriterion::Delaunay => {
            let (p1, p2) = (mesh.uv(v1), mesh.uv(v2));
            ctx.parametric_metric(midpoint(p1, p2))
                .and_then(|metric| in_circumcircle_aniso(&metric, p1, p2, mesh.uv(v3), mesh.uv(v4)))
        }
        SwapCriterion::Closeness => {
            let before = surface_deviation(ctx.surface(), mesh, v1, v2);
            let after = surface_deviation(ctx.surface(), mesh, v3, v4);
            Some(after < before * (1.0 - 1e-10))
        }
    };
    match prefers_new {
        None => {
            trace!(v1 = v1.index(), v2 = v2.index(), "no usable metric at swap candidate");
            return Ok(Outcome::Refused(Refusal::Degenerate));
        }
        Some(false) => return Ok(Outcome::Refused(Refusal::CriterionRejected)),
        Some(true) => {}
    }

    // The new diagonal must not duplicate an existing edge.
    if vertex_star(mesh, t1, v3)?.neighbors().contains(&v4) {
        return Ok(Outcome::Refused(Refusal::EdgeExists));
    }

    ctx.replace_cavity(mesh, &[t1, t2], &new)?;
    Ok(Outcome::Accepted)
}

/// Distance between the surface point and the chord midpoint of edge `(a, b)`.
fn surface_deviation<I: MeshIndex, S: Surface>(
    surface: &S,
    mesh: &SurfaceMesh<I>,
    a: VertexId<I>,
    b: VertexId<I>,
) -> f64 {
    let on_surface = surface.point(midpoint(mesh.uv(a), mesh.uv(b)));
    let chord = (mesh.position(a).coords + mesh.position(b).coords) * 0.5;
    (on_surface.coords - chord).norm()
}
