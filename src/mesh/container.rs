//! Arena-backed triangle container.
//!
//! Triangles are stored in a flat vector and addressed by [`TriangleId`].
//! Local operators never remove a triangle from the arena: they flag it as
//! deleted and append its replacements. Deleted triangles are physically
//! discarded by [`SurfaceMesh::sweep_and_compact`] between phases, which is also
//! the only place where triangle ids change.
//!
//! # Local numbering
//!
//! Local edge `i` of a triangle runs from `vertices[i]` to `vertices[(i + 1) % 3]`
//! and `neighbors[i]` is the triangle across that edge. The vertex opposite edge
//! `i` is `vertices[(i + 2) % 3]`.

use std::cmp::Ordering;

use nalgebra::{Point2, Point3};
use tracing::error;

use super::index::{MeshIndex, TriangleId, VertexId};
use super::quality;
use crate::error::{MeshError, Result};

/// A mesh vertex: physical position, parametric position and cached sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in physical space.
    pub position: Point3<f64>,

    /// Position in the parameter plane of the owning surface.
    pub uv: Point2<f64>,

    /// Size derived from the surrounding edges of the input mesh.
    pub local_size: f64,

    /// Cached (clamped) background size at this vertex.
    pub background_size: f64,
}

impl Vertex {
    /// Create a vertex with unset sizes.
    pub fn new(position: Point3<f64>, uv: Point2<f64>) -> Self {
        Self {
            position,
            uv,
            local_size: 0.0,
            background_size: 0.0,
        }
    }
}

/// A triangle in the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle<I: MeshIndex = u32> {
    /// The three corners, counter-clockwise in the parameter plane.
    pub vertices: [VertexId<I>; 3],

    /// Triangle across each local edge, invalid on the boundary.
    pub neighbors: [TriangleId<I>; 3],

    /// Ordering key: circumradius relative to the local target size.
    pub key: f64,

    /// Set once the triangle has been replaced by a local edit.
    pub deleted: bool,
}

impl<I: MeshIndex> Triangle<I> {
    /// Create an unlinked, live triangle.
    pub fn new(vertices: [VertexId<I>; 3], key: f64) -> Self {
        Self {
            vertices,
            neighbors: [TriangleId::invalid(); 3],
            key,
            deleted: false,
        }
    }

    /// Endpoints of local edge `i`.
    #[inline]
    pub fn edge(&self, i: usize) -> (VertexId<I>, VertexId<I>) {
        (self.vertices[i], self.vertices[(i + 1) % 3])
    }

    /// Vertex opposite local edge `i`.
    #[inline]
    pub fn opposite(&self, i: usize) -> VertexId<I> {
        self.vertices[(i + 2) % 3]
    }

    /// Neighbor across local edge `i`, if any.
    #[inline]
    pub fn neighbor(&self, i: usize) -> Option<TriangleId<I>> {
        self.neighbors[i].get()
    }

    /// Local index of `v`, if it is a corner of this triangle.
    #[inline]
    pub fn local_vertex(&self, v: VertexId<I>) -> Option<usize> {
        self.vertices.iter().position(|&w| w == v)
    }

    /// Local index of the edge joining `a` and `b`, in either direction.
    pub fn local_edge(&self, a: VertexId<I>, b: VertexId<I>) -> Option<usize> {
        (0..3).find(|&i| {
            let (p, q) = self.edge(i);
            (p == a && q == b) || (p == b && q == a)
        })
    }

    /// Whether the three corners are pairwise distinct.
    #[inline]
    pub fn is_proper(&self) -> bool {
        let [a, b, c] = self.vertices;
        a != b && b != c && a != c
    }
}

/// A triangulated parametric surface patch.
#[derive(Debug, Clone)]
pub struct SurfaceMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) triangles: Vec<Triangle<I>>,
}

impl<I: MeshIndex> Default for SurfaceMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> SurfaceMesh<I> {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity(num_triangles),
        }
    }

    // ==================== Accessors ====================

    /// Number of vertices, referenced or not.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of arena slots, deleted triangles included.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of live triangles.
    pub fn num_live_triangles(&self) -> usize {
        self.triangles.iter().filter(|t| !t.deleted).count()
    }

    /// Number of vertices referenced by at least one live triangle.
    pub fn num_referenced_vertices(&self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for tri in self.triangles.iter().filter(|t| !t.deleted) {
            for v in tri.vertices {
                used[v.index()] = true;
            }
        }
        used.into_iter().filter(|&u| u).count()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex {
        &mut self.vertices[id.index()]
    }

    /// Physical position of a vertex.
    #[inline]
    pub fn position(&self, id: VertexId<I>) -> &Point3<f64> {
        &self.vertices[id.index()].position
    }

    /// Parametric position of a vertex.
    #[inline]
    pub fn uv(&self, id: VertexId<I>) -> &Point2<f64> {
        &self.vertices[id.index()].uv
    }

    /// Get a triangle by ID.
    #[inline]
    pub fn triangle(&self, id: TriangleId<I>) -> &Triangle<I> {
        &self.triangles[id.index()]
    }

    /// Get a mutable triangle by ID.
    #[inline]
    pub fn triangle_mut(&mut self, id: TriangleId<I>) -> &mut Triangle<I> {
        &mut self.triangles[id.index()]
    }

    /// Whether `id` addresses an existing, non-deleted triangle.
    #[inline]
    pub fn is_live(&self, id: TriangleId<I>) -> bool {
        id.is_valid() && self.triangles.get(id.index()).is_some_and(|t| !t.deleted)
    }

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over the IDs of live triangles, in arena order.
    pub fn live_triangle_ids(&self) -> impl Iterator<Item = TriangleId<I>> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.deleted)
            .map(|(i, _)| TriangleId::new(i))
    }

    // ==================== Mutation ====================

    /// Append a vertex.
    ///
    /// Fails with [`MeshError::IndexOverflow`] once every id of `I` is taken.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<VertexId<I>> {
        ensure_ids::<I>("vertex", self.vertices.len(), 1)?;
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(vertex);
        Ok(id)
    }

    /// Append a triangle. Its neighbor links are left as given.
    ///
    /// Fails with [`MeshError::IndexOverflow`] once every id of `I` is taken.
    /// Deleted triangles keep their slot until the next sweep.
    pub fn insert(&mut self, triangle: Triangle<I>) -> Result<TriangleId<I>> {
        self.reserve_triangle_ids(1)?;
        let id = TriangleId::new(self.triangles.len());
        self.triangles.push(triangle);
        Ok(id)
    }

    /// Check that `additional` more triangles can be inserted.
    pub fn reserve_triangle_ids(&self, additional: usize) -> Result<()> {
        ensure_ids::<I>("triangle", self.triangles.len(), additional)
    }

    /// Flag a triangle as deleted.
    #[inline]
    pub fn mark_deleted(&mut self, id: TriangleId<I>) {
        self.triangles[id.index()].deleted = true;
    }

    /// Physically remove deleted triangles and renumber the survivors.
    ///
    /// Returns the number of discarded triangles. A live triangle that still
    /// links to a deleted one means an earlier edit corrupted the graph.
    pub fn sweep_and_compact(&mut self) -> Result<usize> {
        let mut remap: Vec<Option<usize>> = Vec::with_capacity(self.triangles.len());
        let mut next = 0;
        for tri in &self.triangles {
            if tri.deleted {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }

        let removed = self.triangles.len() - next;
        if removed == 0 {
            return Ok(0);
        }

        for (old, tri) in self.triangles.iter().enumerate() {
            if tri.deleted {
                continue;
            }
            for n in tri.neighbors {
                if n.is_valid() && remap.get(n.index()).copied().flatten().is_none() {
                    let neighbor = n.index();
                    error!(triangle = old, neighbor, "live triangle links to a swept one");
                    return Err(MeshError::DanglingNeighbor { triangle: old, neighbor });
                }
            }
        }

        let old = std::mem::take(&mut self.triangles);
        self.triangles = old
            .into_iter()
            .filter(|t| !t.deleted)
            .map(|mut t| {
                for n in t.neighbors.iter_mut() {
                    if let Some(new_index) = n.get().and_then(|id| remap[id.index()]) {
                        *n = TriangleId::new(new_index);
                    }
                }
                t
            })
            .collect();

        Ok(removed)
    }

    // ==================== Ordering ====================

    /// Live triangles ordered by decreasing key, ties broken by id.
    ///
    /// The order is a snapshot: triangles inserted afterwards are not part of it.
    pub fn traversal_order(&self) -> Vec<TriangleId<I>> {
        let mut order: Vec<TriangleId<I>> = self.live_triangle_ids().collect();
        order.sort_by(|&a, &b| {
            let ka = self.triangle(a).key;
            let kb = self.triangle(b).key;
            kb.partial_cmp(&ka)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        order
    }

    // ==================== Geometry ====================

    /// Signed area of a triangle in the parameter plane.
    pub fn parametric_area(&self, id: TriangleId<I>) -> f64 {
        let [a, b, c] = self.triangle(id).vertices;
        quality::signed_area_uv(self.uv(a), self.uv(b), self.uv(c))
    }

    /// Sum of unsigned parametric areas over live triangles.
    pub fn total_parametric_area(&self) -> f64 {
        self.live_triangle_ids()
            .map(|t| self.parametric_area(t).abs())
            .sum()
    }

    /// Shape quality of a triangle in physical space, in `[0, 1]`.
    pub fn triangle_quality(&self, id: TriangleId<I>) -> f64 {
        self.quality_of(self.triangle(id).vertices)
    }

    /// Shape quality of an arbitrary vertex triple.
    pub fn quality_of(&self, [a, b, c]: [VertexId<I>; 3]) -> f64 {
        quality::shape_quality(self.position(a), self.position(b), self.position(c))
    }

    /// Smallest shape quality over live triangles (1 for an empty mesh).
    pub fn min_quality(&self) -> f64 {
        self.live_triangle_ids()
            .map(|t| self.triangle_quality(t))
            .fold(1.0, f64::min)
    }
}

/// Fail unless `len + additional` elements can all be addressed by `I`.
fn ensure_ids<I: MeshIndex>(element: &'static str, len: usize, additional: usize) -> Result<()> {
    let capacity = I::MAX.to_usize().saturating_add(1);
    if len.saturating_add(additional) > capacity {
        return Err(MeshError::IndexOverflow { element, capacity });
    }
    Ok(())
}
