//! Per-invocation optimization state.

use std::collections::HashSet;

use nalgebra::{Matrix2, Point2, Point3};
use tracing::{trace, warn};

use super::OptimizeOptions;
use crate::error::Result;
use crate::mesh::quality::{circumradius, pull_back_metric};
use crate::mesh::{
    connect_triangles, EdgeKey, MeshIndex, SurfaceMesh, Triangle, TriangleId, VertexId,
};
use crate::sizing::{SizeBounds, SizeField, SizeQuery};
use crate::surface::Surface;

/// Everything one optimization run of one surface needs besides the mesh.
///
/// Holds the geometry and size collaborators, the options, and the caches that
/// keep a phase from evaluating the same configuration twice. The caches are
/// reset by [`begin_phase`](Self::begin_phase).
pub struct MeshOptimizationContext<'a, I: MeshIndex, S, F> {
    surface: &'a S,
    size_field: &'a F,
    options: &'a OptimizeOptions,
    bounds: SizeBounds,
    swap_quads: HashSet<[VertexId<I>; 4]>,
    split_edges: HashSet<EdgeKey<I>>,
}

impl<'a, I, S, F> MeshOptimizationContext<'a, I, S, F>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    /// Create a context with empty caches.
    pub fn new(surface: &'a S, size_field: &'a F, options: &'a OptimizeOptions) -> Self {
        Self {
            surface,
            size_field,
            options,
            bounds: options.size_bounds(),
            swap_quads: HashSet::new(),
            split_edges: HashSet::new(),
        }
    }

    /// The surface being meshed.
    #[inline]
    pub fn surface(&self) -> &'a S {
        self.surface
    }

    /// The options of this run.
    #[inline]
    pub fn options(&self) -> &'a OptimizeOptions {
        self.options
    }

    /// Forget every configuration evaluated so far.
    pub fn begin_phase(&mut self) {
        self.swap_quads.clear();
        self.split_edges.clear();
    }

    /// Record a swap quad; `false` if it was already evaluated this phase.
    pub fn mark_swap_quad(&mut self, mut quad: [VertexId<I>; 4]) -> bool {
        quad.sort_unstable();
        self.swap_quads.insert(quad)
    }

    /// Record a split candidate edge; `false` if it was already evaluated this phase.
    pub fn mark_split_edge(&mut self, a: VertexId<I>, b: VertexId<I>) -> bool {
        self.split_edges.insert(EdgeKey::new(a, b))
    }

    // ==================== Sizes ====================

    fn query(&self, uv: Point2<f64>, position: Point3<f64>) -> SizeQuery {
        SizeQuery {
            entity: self.surface.tag(),
            dimension: self.surface.dimension(),
            uv,
            position,
        }
    }

    /// Clamped background size at a location.
    ///
    /// An unusable sample (non-finite or non-positive) is logged and replaced by
    /// `fallback`.
    pub fn sample_size(&self, uv: Point2<f64>, position: Point3<f64>, fallback: f64) -> f64 {
        let raw = self.size_field.size(&self.query(uv, position));
        match self.bounds.apply(raw) {
            Some(size) => size,
            None => {
                warn!(raw, u = uv.x, v = uv.y, fallback, "unusable background size sample");
                fallback
            }
        }
    }

    /// Sample and cache the background size of every vertex.
    pub fn init_sizes(&self, mesh: &mut SurfaceMesh<I>) {
        for vertex in mesh.vertices.iter_mut() {
            vertex.background_size =
                self.sample_size(vertex.uv, vertex.position, vertex.local_size);
        }
    }

    /// Size governing a vertex: the background size, capped by the local size
    /// when local sizes are extended.
    pub fn vertex_size(&self, mesh: &SurfaceMesh<I>, v: VertexId<I>) -> f64 {
        let vertex = mesh.vertex(v);
        if self.options.extend_local_sizes && vertex.local_size > 0.0 {
            vertex.local_size.min(vertex.background_size)
        } else {
            vertex.background_size
        }
    }

    /// Edge length measured in target sizes, along the surface.
    ///
    /// `None` when the endpoint sizes do not define a length scale.
    pub fn adim_length(
        &self,
        mesh: &SurfaceMesh<I>,
        a: VertexId<I>,
        b: VertexId<I>,
    ) -> Option<f64> {
        let scale = self.vertex_size(mesh, a) + self.vertex_size(mesh, b);
        if !(scale.is_finite() && scale > 0.0) {
            trace!(a = a.index(), b = b.index(), scale, "edge has no length scale");
            return None;
        }
        let mid = self.surface.point(midpoint(mesh.uv(a), mesh.uv(b)));
        let arc = (mesh.position(a) - mid).norm() + (mid - mesh.position(b)).norm();
        Some(2.0 * arc / scale)
    }

    /// Ordering key of a vertex triple: circumradius over the mean vertex size.
    pub fn triangle_key(&self, mesh: &SurfaceMesh<I>, [a, b, c]: [VertexId<I>; 3]) -> f64 {
        let r = circumradius(mesh.position(a), mesh.position(b), mesh.position(c));
        let sum = self.vertex_size(mesh, a) + self.vertex_size(mesh, b) + self.vertex_size(mesh, c);
        let mean = sum / 3.0;
        if mean > 0.0 {
            r / mean
        } else {
            r
        }
    }

    /// A live, unlinked triangle with its key computed.
    pub fn make_triangle(&self, mesh: &SurfaceMesh<I>, vertices: [VertexId<I>; 3]) -> Triangle<I> {
        Triangle::new(vertices, self.triangle_key(mesh, vertices))
    }

    /// Recompute the key of every live triangle.
    pub fn refresh_keys(&self, mesh: &mut SurfaceMesh<I>) {
        let ids: Vec<_> = mesh.live_triangle_ids().collect();
        for t in ids {
            let key = self.triangle_key(mesh, mesh.triangle(t).vertices);
            mesh.triangle_mut(t).key = key;
        }
    }

    /// Replace the `cavity` triangles by new triangles over the same boundary.
    ///
    /// The cavity is marked deleted and the replacements are linked to each
    /// other and to the live triangles bordering the cavity. Fails without
    /// touching the mesh when the replacements would run out of triangle ids.
    pub fn replace_cavity(
        &self,
        mesh: &mut SurfaceMesh<I>,
        cavity: &[TriangleId<I>],
        replacement: &[[VertexId<I>; 3]],
    ) -> Result<Vec<TriangleId<I>>> {
        mesh.reserve_triangle_ids(replacement.len())?;
        let mut linked: Vec<TriangleId<I>> = cavity
            .iter()
            .flat_map(|&t| mesh.triangle(t).neighbors)
            .filter(|n| n.is_valid() && !cavity.contains(n))
            .collect();

        for &t in cavity {
            mesh.mark_deleted(t);
        }
        let created = replacement
            .iter()
            .map(|&vertices| {
                let triangle = self.make_triangle(mesh, vertices);
                mesh.insert(triangle)
            })
            .collect::<Result<Vec<TriangleId<I>>>>()?;

        linked.extend_from_slice(&created);
        connect_triangles(mesh, &linked)?;
        Ok(created)
    }

    /// Clamped target metric at a parametric location, expressed in the
    /// parameter plane.
    ///
    /// `None`, logged, when the field's metric is not finite and symmetric
    /// positive definite.
    pub fn parametric_metric(&self, uv: Point2<f64>) -> Option<Matrix2<f64>> {
        let position = self.surface.point(uv);
        let raw = self.size_field.metric(&self.query(uv, position));
        let Some(metric) = self.bounds.apply_metric(&raw) else {
            warn!(u = uv.x, v = uv.y, "unusable background metric sample");
            return None;
        };
        Some(pull_back_metric(&self.surface.jacobian(uv), &metric))
    }
}

impl<I: MeshIndex, S, F> std::fmt::Debug for MeshOptimizationContext<'_, I, S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshOptimizationContext")
            .field("options", self.options)
            .field("swap_quads", &self.swap_quads.len())
            .field("split_edges", &self.split_edges.len())
            .finish_non_exhaustive()
    }
}

/// Parametric midpoint of two locations.
#[inline]
pub(crate) fn midpoint(a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    Point2::from((a.coords + b.coords) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::optimize::SwapCriterion;
    use crate::mesh::tests::create_square;
    use crate::sizing::{SizeFn, UniformSize};
    use crate::surface::{ParametricSurface, PlanarSurface};

    #[test]
    fn test_adim_length_on_plane() {
        let mut mesh = create_square();
        let plane = PlanarSurface::xy();
        let field = UniformSize(0.5);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        let l = ctx.adim_length(&mesh, VertexId::new(0), VertexId::new(1)).unwrap();
        assert!((l - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_adim_length_follows_the_arc() {
        let mut mesh = create_square();
        // Unit cylinder, u = angle: the edge (0, 1) spans one radian of arc.
        let cylinder =
            ParametricSurface::new(|uv: Point2<f64>| Point3::new(uv.x.cos(), uv.x.sin(), uv.y));
        for v in mesh.vertex_ids().collect::<Vec<_>>() {
            let uv = *mesh.uv(v);
            mesh.vertex_mut(v).position = cylinder.point(uv);
        }
        let field = UniformSize(1.0);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let ctx = MeshOptimizationContext::new(&cylinder, &field, &options);
        ctx.init_sizes(&mut mesh);

        let l = ctx.adim_length(&mesh, VertexId::new(0), VertexId::new(1)).unwrap();
        let chord = (mesh.position(VertexId::new(1)) - mesh.position(VertexId::new(0))).norm();
        // Two half-chords through the arc midpoint are longer than the chord.
        assert!(l > chord);
        assert!((l - 4.0 * 0.25f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_unusable_samples_fall_back_to_local_size() {
        let mut mesh = create_square();
        let plane = PlanarSurface::xy();
        let field = SizeFn::new(|q: &SizeQuery| if q.uv.x > 0.5 { f64::NAN } else { 0.25 });
        let options = OptimizeOptions::new(SwapCriterion::Quality).with_size_bounds(0.0, 0.2);
        let ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);

        assert_eq!(mesh.vertex(VertexId::new(0)).background_size, 0.2);
        assert_eq!(mesh.vertex(VertexId::new(1)).background_size, 1.0);
    }

    #[test]
    fn test_extended_local_sizes() {
        let mut mesh = create_square();
        let plane = PlanarSurface::xy();
        let field = UniformSize(5.0);
        let options = OptimizeOptions::new(SwapCriterion::Quality).with_extend_local_sizes(true);
        let ctx = MeshOptimizationContext::new(&plane, &field, &options);
        ctx.init_sizes(&mut mesh);
        assert_eq!(ctx.vertex_size(&mesh, VertexId::new(0)), 1.0);

        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let ctx = MeshOptimizationContext::new(&plane, &field, &options);
        assert_eq!(ctx.vertex_size(&mesh, VertexId::new(0)), 5.0);
    }

    #[test]
    fn test_phase_caches() {
        let plane = PlanarSurface::xy();
        let field = UniformSize(1.0);
        let options = OptimizeOptions::new(SwapCriterion::Quality);
        let mut ctx: MeshOptimizationContext<'_, u32, _, _> =
            MeshOptimizationContext::new(&plane, &field, &options);

        let quad = [VertexId::new(3), VertexId::new(0), VertexId::new(2), VertexId::new(1)];
        assert!(ctx.mark_swap_quad(quad));
        let sorted = [VertexId::new(0), VertexId::new(1), VertexId::new(2), VertexId::new(3)];
        assert!(!ctx.mark_swap_quad(sorted));
        assert!(ctx.mark_split_edge(VertexId::new(4), VertexId::new(2)));
        assert!(!ctx.mark_split_edge(VertexId::new(2), VertexId::new(4)));

        ctx.begin_phase();
        assert!(ctx.mark_swap_quad(quad));
    }

    #[test]
    fn test_metric_pull_back_on_scaled_plane() {
        let plane = PlanarSurface {
            tag: 0,
            origin: Point3::origin(),
            u_axis: nalgebra::Vector3::new(2.0, 0.0, 0.0),
            v_axis: nalgebra::Vector3::new(0.0, 1.0, 0.0),
        };
        let field = UniformSize(0.5);
        let options = OptimizeOptions::new(SwapCriterion::Delaunay);
        let ctx: MeshOptimizationContext<'_, u32, _, _> =
            MeshOptimizationContext::new(&plane, &field, &options);
        let m = ctx.parametric_metric(Point2::new(0.3, 0.3)).unwrap();
        assert!((m - Matrix2::new(16.0, 0.0, 0.0, 4.0)).norm() < 1e-12);

        // Sizes below the lower bound are raised before the pull-back.
        let options = OptimizeOptions::new(SwapCriterion::Delaunay).with_size_bounds(1.0, 2.0);
        let ctx: MeshOptimizationContext<'_, u32, _, _> =
            MeshOptimizationContext::new(&plane, &field, &options);
        let m = ctx.parametric_metric(Point2::new(0.3, 0.3)).unwrap();
        assert!((m - Matrix2::new(4.0, 0.0, 0.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_indefinite_metric_is_unusable() {
        struct Saddle;
        impl SizeField for Saddle {
            fn size(&self, _query: &SizeQuery) -> f64 {
                1.0
            }
            fn metric(&self, _query: &SizeQuery) -> nalgebra::Matrix3<f64> {
                nalgebra::Matrix3::from_diagonal(&nalgebra::Vector3::new(1.0, -1.0, 1.0))
            }
        }
        let plane = PlanarSurface::xy();
        let options = OptimizeOptions::new(SwapCriterion::Delaunay);
        let ctx: MeshOptimizationContext<'_, u32, _, _> =
            MeshOptimizationContext::new(&plane, &Saddle, &options);
        assert_eq!(ctx.parametric_metric(Point2::new(0.5, 0.5)), None);
    }
}
