//! Triangle-to-triangle adjacency.
//!
//! Neighbor links are derived from a shared-edge map: an undirected edge seen
//! in exactly two triangles links them, an edge seen once stays on the boundary,
//! and an edge seen three or more times means the triangle set is corrupt.

use std::collections::{HashMap, HashSet};

use tracing::error;

use super::container::SurfaceMesh;
use super::index::{EdgeKey, MeshIndex, TriangleId, VertexId};
use crate::error::{MeshError, Result};

/// Upper bound on the number of triangles visited around one vertex.
const MAX_STAR_SIZE: usize = 4096;

/// Recompute all neighbor links of `ids` from scratch.
///
/// Links of the listed triangles are cleared first, so an edge seen once ends
/// up on the boundary even if it was linked before.
pub fn rebuild_neighbors<I: MeshIndex>(
    mesh: &mut SurfaceMesh<I>,
    ids: &[TriangleId<I>],
) -> Result<()> {
    link_shared_edges(mesh, ids, true)
}

/// Link every pair of listed triangles sharing an edge, leaving other links alone.
///
/// Used after a local edit with the replacement triangles plus the live
/// triangles bordering the cavity.
pub fn connect_triangles<I: MeshIndex>(
    mesh: &mut SurfaceMesh<I>,
    ids: &[TriangleId<I>],
) -> Result<()> {
    link_shared_edges(mesh, ids, false)
}

/// Rebuild neighbor links for every live triangle of the mesh.
pub fn rebuild_all_neighbors<I: MeshIndex>(mesh: &mut SurfaceMesh<I>) -> Result<()> {
    let ids: Vec<TriangleId<I>> = mesh.live_triangle_ids().collect();
    rebuild_neighbors(mesh, &ids)
}

fn link_shared_edges<I: MeshIndex>(
    mesh: &mut SurfaceMesh<I>,
    ids: &[TriangleId<I>],
    reset: bool,
) -> Result<()> {
    let mut unique: Vec<TriangleId<I>> = ids.iter().copied().filter(|&t| mesh.is_live(t)).collect();
    unique.sort_unstable();
    unique.dedup();

    let mut edges: HashMap<EdgeKey<I>, Vec<(TriangleId<I>, usize)>> =
        HashMap::with_capacity(unique.len() * 3 / 2 + 1);
    for &t in &unique {
        let tri = mesh.triangle(t);
        for i in 0..3 {
            let (a, b) = tri.edge(i);
            edges.entry(EdgeKey::new(a, b)).or_default().push((t, i));
        }
    }

    if let Some((key, sharing)) = edges.iter().find(|(_, s)| s.len() > 2) {
        let (v0, v1) = key.vertices();
        error!(
            v0 = v0.index(),
            v1 = v1.index(),
            count = sharing.len(),
            "edge shared by more than two triangles"
        );
        return Err(MeshError::NonManifoldEdge {
            v0: v0.index(),
            v1: v1.index(),
            count: sharing.len(),
        });
    }

    if reset {
        for &t in &unique {
            mesh.triangle_mut(t).neighbors = [TriangleId::invalid(); 3];
        }
    }

    for sharing in edges.values() {
        if let [(t0, i0), (t1, i1)] = sharing.as_slice() {
            let (a0, b0) = mesh.triangle(*t0).edge(*i0);
            let (a1, _) = mesh.triangle(*t1).edge(*i1);
            if a0 == a1 {
                error!(v0 = a0.index(), v1 = b0.index(), "inconsistent orientation across edge");
                return Err(MeshError::InconsistentOrientation {
                    v0: a0.index(),
                    v1: b0.index(),
                });
            }
            mesh.triangle_mut(*t0).neighbors[*i0] = *t1;
            mesh.triangle_mut(*t1).neighbors[*i1] = *t0;
        }
    }

    Ok(())
}

/// Verify the adjacency invariants over all live triangles.
///
/// Checks that corners are distinct, that every link points to a live triangle
/// holding the same edge reversed and linking back, and that no edge is shared
/// by more than two live triangles.
pub fn check_topology<I: MeshIndex>(mesh: &SurfaceMesh<I>) -> Result<()> {
    let mut edge_count: HashMap<EdgeKey<I>, usize> = HashMap::new();

    for t in mesh.live_triangle_ids() {
        let tri = mesh.triangle(t);
        if !tri.is_proper() {
            return Err(MeshError::DegenerateTriangle { triangle: t.index() });
        }

        for i in 0..3 {
            let (a, b) = tri.edge(i);
            let count = edge_count.entry(EdgeKey::new(a, b)).or_insert(0);
            *count += 1;
            if *count > 2 {
                error!(
                    v0 = a.index(),
                    v1 = b.index(),
                    "edge shared by more than two live triangles"
                );
                return Err(MeshError::NonManifoldEdge {
                    v0: a.index(),
                    v1: b.index(),
                    count: *count,
                });
            }

            let Some(n) = tri.neighbor(i) else {
                continue;
            };
            if !mesh.is_live(n) {
                error!(triangle = t.index(), neighbor = n.index(), "link to a dead triangle");
                return Err(MeshError::DanglingNeighbor {
                    triangle: t.index(),
                    neighbor: n.index(),
                });
            }
            let other = mesh.triangle(n);
            let reciprocal = (0..3).any(|j| other.edge(j) == (b, a) && other.neighbors[j] == t);
            if !reciprocal {
                error!(triangle = t.index(), neighbor = n.index(), "non-reciprocal neighbor link");
                return Err(MeshError::AsymmetricNeighbor {
                    triangle: t.index(),
                    neighbor: n.index(),
                });
            }
        }
    }

    Ok(())
}

/// The triangles around one vertex, as seen by walking neighbor links.
#[derive(Debug, Clone)]
pub struct VertexStar<I: MeshIndex = u32> {
    /// The center vertex.
    pub center: VertexId<I>,

    /// Incident triangles. For a closed star, triangle `i` is
    /// `(center, ring[i], ring[i + 1])` up to rotation.
    pub triangles: Vec<TriangleId<I>>,

    /// Vertices around the center, counter-clockwise for a closed star.
    pub ring: Vec<VertexId<I>>,

    /// Whether the walk returned to its starting triangle.
    pub closed: bool,
}

impl<I: MeshIndex> VertexStar<I> {
    /// Distinct vertices adjacent to the center.
    pub fn neighbors(&self) -> HashSet<VertexId<I>> {
        self.ring.iter().copied().collect()
    }
}

/// Walk counter-clockwise around `center` starting in `start`.
///
/// If the walk hits a boundary edge it resumes clockwise from `start`, so the
/// returned star covers every triangle reachable through neighbor links; only a
/// star that wraps back to `start` is reported as `closed`. Ring order is
/// meaningful for closed stars only.
///
/// A link to a deleted triangle, or a neighbor missing the center, is reported
/// as topological corruption.
pub fn vertex_star<I: MeshIndex>(
    mesh: &SurfaceMesh<I>,
    start: TriangleId<I>,
    center: VertexId<I>,
) -> Result<VertexStar<I>> {
    let mut star = VertexStar {
        center,
        triangles: vec![start],
        ring: Vec::new(),
        closed: false,
    };

    let corner = |t: TriangleId<I>, from: TriangleId<I>| -> Result<usize> {
        mesh.triangle(t).local_vertex(center).ok_or_else(|| {
            error!(
                triangle = from.index(),
                neighbor = t.index(),
                "neighbor does not share the walked vertex"
            );
            MeshError::AsymmetricNeighbor {
                triangle: from.index(),
                neighbor: t.index(),
            }
        })
    };
    let step = |from: TriangleId<I>, to: TriangleId<I>| -> Result<usize> {
        if !mesh.is_live(to) {
            error!(
                triangle = from.index(),
                neighbor = to.index(),
                "vertex walk reached a dead triangle"
            );
            return Err(MeshError::DanglingNeighbor {
                triangle: from.index(),
                neighbor: to.index(),
            });
        }
        corner(to, from)
    };

    let first = corner(start, start)?;

    // Counter-clockwise: leave (center, a, b) through edge (b, center).
    let (mut t, mut k) = (start, first);
    loop {
        let tri = mesh.triangle(t);
        star.ring.push(tri.vertices[(k + 1) % 3]);
        match tri.neighbor((k + 2) % 3) {
            None => {
                star.ring.push(tri.vertices[(k + 2) % 3]);
                break;
            }
            Some(n) if n == start => {
                star.closed = true;
                return Ok(star);
            }
            Some(n) => {
                let kn = step(t, n)?;
                if star.triangles.len() >= MAX_STAR_SIZE {
                    return Ok(star);
                }
                star.triangles.push(n);
                (t, k) = (n, kn);
            }
        }
    }

    // Clockwise from the start: leave (center, a, b) through edge (center, a).
    let (mut t, mut k) = (start, first);
    while let Some(n) = mesh.triangle(t).neighbor(k) {
        let kn = step(t, n)?;
        if star.triangles.len() >= MAX_STAR_SIZE {
            break;
        }
        star.ring.insert(0, mesh.triangle(n).vertices[(kn + 1) % 3]);
        star.triangles.push(n);
        (t, k) = (n, kn);
    }

    Ok(star)
}
