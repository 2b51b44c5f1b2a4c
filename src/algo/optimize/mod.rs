//! Local-operator quality optimization of surface meshes.
//!
//! The optimizer improves an existing triangulation of a parametric surface
//! in place, using three topology-preserving local edits:
//!
//! - **Edge swap**: replace the diagonal of the quad formed by two triangles
//! - **Edge split**: insert a vertex at the surface midpoint of a long edge
//! - **Vertex collapse**: remove a vertex with a short edge, refilling its
//!   cavity with a fan around the nearest neighbor
//!
//! Lengths are measured in units of a background size field (see
//! [`SizeField`]): an edge whose adimensional length exceeds
//! [`OptimizeOptions::l_max`] is split, a vertex with an edge shorter than
//! [`OptimizeOptions::l_min`] is collapsed.
//!
//! # Passes
//!
//! Each outer pass runs a swap phase (rounds until no swap is accepted), a split
//! sweep and a collapse sweep, then optionally smooths vertices in the
//! parameter plane. Triangles are visited by decreasing key, so the largest
//! triangles relative to the target size come first; collapses go the other
//! way. Replacement triangles are only visited from the next round or phase on.
//! The loop stops after a pass without edits, after [`OptimizeOptions::max_passes`],
//! or when the time budget runs out.
//!
//! Refused edits are ordinary [`Outcome`]s. Only a corrupted triangle graph
//! aborts a run with an error.
//!
//! # Example
//!
//! ```
//! use surfopt::prelude::*;
//! use surfopt::algo::optimize::{optimize_surface_mesh, OptimizeOptions, SwapCriterion};
//! use nalgebra::{Point2, Point3};
//!
//! let uvs = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let plane = PlanarSurface::xy();
//! let mut mesh: SurfaceMesh = build_on_surface(&plane, &uvs, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let options = OptimizeOptions::new(SwapCriterion::Quality).with_parallel(false);
//! let stats = optimize_surface_mesh(&mut mesh, &plane, &UniformSize(0.4), &options).unwrap();
//!
//! assert!(stats.splits > 0);
//! assert!((mesh.total_parametric_area() - 1.0).abs() < 1e-9);
//! ```

mod collapse;
mod context;
mod smooth;
mod split;
mod swap;

pub use collapse::collapse_vertex;
pub use context::MeshOptimizationContext;
pub use smooth::laplace_smooth;
pub use split::split_edge;
pub use swap::swap_edge;

use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, error, info, info_span, trace};

use crate::algo::progress::{Phase, PhaseReport, Progress};
use crate::error::{MeshError, Result};
use crate::mesh::{check_topology, MeshIndex, SurfaceMesh, TriangleId, VertexId};
use crate::sizing::{SizeBounds, SizeField};
use crate::surface::{EntityDim, Surface};

/// Acceptance test for edge swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapCriterion {
    /// Swap when the worst shape quality of the pair strictly improves.
    Quality,
    /// Swap when the far vertex lies inside the circumcircle of the triangle,
    /// measured in the target metric at the edge midpoint.
    Delaunay,
    /// Swap when the new diagonal follows the surface more closely than the old.
    Closeness,
}

/// Acceptance test for edge splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SplitCriterion {
    /// Split every edge that is too long.
    #[default]
    Always,
    /// Refuse splits that make the worst shape quality strictly worse.
    Quality,
}

/// Options for surface mesh optimization.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Acceptance test for swaps.
    pub swap_criterion: SwapCriterion,

    /// Acceptance test for splits.
    pub split_criterion: SplitCriterion,

    /// Adimensional length below which a vertex's edge is collapsed.
    pub l_min: f64,

    /// Adimensional length above which an edge is split.
    pub l_max: f64,

    /// Maximum number of outer passes.
    pub max_passes: usize,

    /// Maximum number of rounds in one swap phase.
    pub max_swap_rounds: usize,

    /// Wall-clock budget for the whole run, if any.
    pub time_budget: Option<Duration>,

    /// Smallest admissible background size.
    pub size_min: f64,

    /// Largest admissible background size.
    pub size_max: f64,

    /// Multiplier applied to every clamped background size.
    pub size_factor: f64,

    /// Cap the background size by the size of the input mesh at each vertex.
    pub extend_local_sizes: bool,

    /// Parametric smoothing iterations at the end of each pass.
    pub smoothing_iterations: usize,

    /// Check the adjacency invariants after every phase.
    pub validate_topology: bool,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl OptimizeOptions {
    /// Create options with the given swap criterion.
    pub fn new(swap_criterion: SwapCriterion) -> Self {
        Self {
            swap_criterion,
            split_criterion: SplitCriterion::Always,
            l_min: 0.6,
            l_max: 1.4,
            max_passes: 20,
            max_swap_rounds: 1200,
            time_budget: None,
            size_min: 0.0,
            size_max: f64::MAX,
            size_factor: 1.0,
            extend_local_sizes: false,
            smoothing_iterations: 0,
            validate_topology: cfg!(debug_assertions),
            parallel: true,
        }
    }

    /// Set the split criterion.
    pub fn with_split_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.split_criterion = criterion;
        self
    }

    /// Set the adimensional length window `[l_min, l_max]`.
    pub fn with_length_bounds(mut self, l_min: f64, l_max: f64) -> Self {
        self.l_min = l_min;
        self.l_max = l_max;
        self
    }

    /// Set the maximum number of outer passes.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    /// Set the maximum number of rounds per swap phase.
    pub fn with_max_swap_rounds(mut self, rounds: usize) -> Self {
        self.max_swap_rounds = rounds;
        self
    }

    /// Set a wall-clock budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Set the clamp applied to background sizes.
    pub fn with_size_bounds(mut self, min: f64, max: f64) -> Self {
        self.size_min = min;
        self.size_max = max;
        self
    }

    /// Set the multiplier applied to background sizes.
    pub fn with_size_factor(mut self, factor: f64) -> Self {
        self.size_factor = factor;
        self
    }

    /// Set whether input edge lengths cap the background size.
    pub fn with_extend_local_sizes(mut self, extend: bool) -> Self {
        self.extend_local_sizes = extend;
        self
    }

    /// Set the number of smoothing iterations per pass.
    pub fn with_smoothing_iterations(mut self, iterations: usize) -> Self {
        self.smoothing_iterations = iterations;
        self
    }

    /// Set whether adjacency is checked after every phase.
    pub fn with_validate_topology(mut self, validate: bool) -> Self {
        self.validate_topology = validate;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// The size clamp as a [`SizeBounds`].
    pub fn size_bounds(&self) -> SizeBounds {
        SizeBounds {
            min: self.size_min,
            max: self.size_max,
            factor: self.size_factor,
        }
    }

    /// Check that the options describe a usable configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.l_min.is_finite() && self.l_min > 0.0) {
            return Err(MeshError::invalid_param(
                "l_min",
                self.l_min,
                "must be positive and finite",
            ));
        }
        if !(self.l_max.is_finite() && self.l_max > self.l_min) {
            return Err(MeshError::invalid_param(
                "l_max",
                self.l_max,
                "must be finite and above l_min",
            ));
        }
        if !(self.size_min >= 0.0) {
            return Err(MeshError::invalid_param("size_min", self.size_min, "must be non-negative"));
        }
        if !(self.size_max > 0.0 && self.size_max >= self.size_min) {
            return Err(MeshError::invalid_param(
                "size_max",
                self.size_max,
                "must be positive and at least size_min",
            ));
        }
        if !(self.size_factor.is_finite() && self.size_factor > 0.0) {
            return Err(MeshError::invalid_param(
                "size_factor",
                self.size_factor,
                "must be positive and finite",
            ));
        }
        if self.max_swap_rounds == 0 {
            return Err(MeshError::invalid_param("max_swap_rounds", 0, "must be at least 1"));
        }
        Ok(())
    }
}

/// Result of attempting one local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The edit was applied.
    Accepted,
    /// The edit was declined; the mesh is unchanged.
    Refused(Refusal),
}

impl Outcome {
    /// Whether the edit was applied.
    #[inline]
    pub fn is_accepted(self) -> bool {
        matches!(self, Outcome::Accepted)
    }
}

/// Why a local edit was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refusal {
    /// The edge lies on the mesh boundary.
    Boundary,
    /// The same configuration was already evaluated in this phase.
    AlreadyEvaluated,
    /// The replacement does not cover the same parametric area.
    AreaMismatch,
    /// A replacement triangle would be flat, inverted or too small.
    Degenerate,
    /// The acceptance criterion prefers the current configuration.
    CriterionRejected,
    /// The edge is not longer than `l_max`.
    ShortEnough,
    /// No edge at the vertex is shorter than `l_min`.
    NothingToCollapse,
    /// The triangles around the vertex do not close into a disk.
    OpenCavity,
    /// The collapse would join vertices that are already connected.
    LinkCondition,
    /// The new diagonal already exists elsewhere in the mesh.
    EdgeExists,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Refusal::Boundary => "boundary edge",
            Refusal::AlreadyEvaluated => "already evaluated",
            Refusal::AreaMismatch => "area not conserved",
            Refusal::Degenerate => "degenerate result",
            Refusal::CriterionRejected => "criterion rejected",
            Refusal::ShortEnough => "edge short enough",
            Refusal::NothingToCollapse => "no short edge",
            Refusal::OpenCavity => "open cavity",
            Refusal::LinkCondition => "link condition",
            Refusal::EdgeExists => "edge exists",
        })
    }
}

/// Summary of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OptimizeStats {
    /// Outer passes started.
    pub passes: usize,
    /// Accepted swaps.
    pub swaps: usize,
    /// Accepted splits.
    pub splits: usize,
    /// Accepted collapses.
    pub collapses: usize,
    /// Vertex moves made by smoothing.
    pub smoothed: usize,
    /// Whether the last pass made no edit.
    pub converged: bool,
    /// Whether the time budget stopped the run.
    pub budget_exhausted: bool,
    /// Live triangles at the end.
    pub live_triangles: usize,
    /// Vertices referenced by a live triangle at the end.
    pub referenced_vertices: usize,
    /// Worst shape quality at the end.
    pub min_quality: f64,
}

impl OptimizeStats {
    /// Total topological edits.
    pub fn edits(&self) -> usize {
        self.swaps + self.splits + self.collapses
    }
}

/// Optimize a surface mesh in place.
///
/// # Arguments
///
/// * `mesh` - The mesh to optimize (modified in place)
/// * `surface` - The surface the mesh lies on
/// * `size_field` - Target edge lengths
/// * `options` - Optimization parameters
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] for unusable options,
/// [`MeshError::NotASurface`] if `surface` is not two-dimensional, and a
/// topological corruption error if the triangle graph is found inconsistent.
pub fn optimize_surface_mesh<I, S, F>(
    mesh: &mut SurfaceMesh<I>,
    surface: &S,
    size_field: &F,
    options: &OptimizeOptions,
) -> Result<OptimizeStats>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    optimize_internal(mesh, surface, size_field, options, None)
}

/// Optimize a surface mesh in place with progress reporting.
///
/// See [`optimize_surface_mesh`] for details.
pub fn optimize_surface_mesh_with_progress<I, S, F>(
    mesh: &mut SurfaceMesh<I>,
    surface: &S,
    size_field: &F,
    options: &OptimizeOptions,
    progress: &Progress,
) -> Result<OptimizeStats>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    optimize_internal(mesh, surface, size_field, options, Some(progress))
}

/// Optimize several independent surfaces.
///
/// Each `(mesh, surface)` pair gets its own context; with `options.parallel`
/// the pairs are processed on the rayon thread pool. Results are returned in
/// input order, and the first error aborts the whole call.
pub fn optimize_surfaces<I, S, F>(
    patches: &mut [(SurfaceMesh<I>, S)],
    size_field: &F,
    options: &OptimizeOptions,
) -> Result<Vec<OptimizeStats>>
where
    I: MeshIndex,
    S: Surface + Send + Sync,
    F: SizeField + Sync,
{
    let run = |patch: &mut (SurfaceMesh<I>, S)| {
        let (mesh, surface) = patch;
        optimize_surface_mesh(mesh, &*surface, size_field, options)
    };

    if options.parallel {
        patches.par_iter_mut().map(run).collect()
    } else {
        patches.iter_mut().map(run).collect()
    }
}

// ============================================================================
// Shared operator helpers
// ============================================================================

/// Two live triangles sharing an edge: `(v1, v2, v3)` and `(v2, v1, v4)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgePair<I: MeshIndex> {
    pub t1: TriangleId<I>,
    pub t2: TriangleId<I>,
    pub v1: VertexId<I>,
    pub v2: VertexId<I>,
    pub v3: VertexId<I>,
    pub v4: VertexId<I>,
}

/// The pair of triangles across local edge `edge` of `t`, `None` on the boundary.
pub(crate) fn edge_pair<I: MeshIndex>(
    mesh: &SurfaceMesh<I>,
    t: TriangleId<I>,
    edge: usize,
) -> Result<Option<EdgePair<I>>> {
    let tri = mesh.triangle(t);
    let Some(t2) = tri.neighbor(edge) else {
        return Ok(None);
    };
    if !mesh.is_live(t2) {
        error!(triangle = t.index(), neighbor = t2.index(), "link to a dead triangle");
        return Err(MeshError::DanglingNeighbor {
            triangle: t.index(),
            neighbor: t2.index(),
        });
    }

    let (v1, v2) = tri.edge(edge);
    let other = mesh.triangle(t2);
    let j = (0..3)
        .find(|&j| other.edge(j) == (v2, v1) && other.neighbors[j] == t)
        .ok_or_else(|| {
            error!(triangle = t.index(), neighbor = t2.index(), "neighbor does not link back");
            MeshError::AsymmetricNeighbor {
                triangle: t.index(),
                neighbor: t2.index(),
            }
        })?;

    Ok(Some(EdgePair {
        t1: t,
        t2,
        v1,
        v2,
        v3: tri.opposite(edge),
        v4: other.opposite(j),
    }))
}

// ============================================================================
// Scheduler
// ============================================================================

struct Budget {
    start: Instant,
    limit: Option<Duration>,
}

impl Budget {
    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.start.elapsed() >= limit)
    }
}

fn optimize_internal<I, S, F>(
    mesh: &mut SurfaceMesh<I>,
    surface: &S,
    size_field: &F,
    options: &OptimizeOptions,
    progress: Option<&Progress>,
) -> Result<OptimizeStats>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    options.validate()?;
    if surface.dimension() != EntityDim::Surface {
        return Err(MeshError::NotASurface {
            tag: surface.tag(),
            dimension: surface.dimension().as_u8(),
        });
    }

    let span = info_span!("optimize_surface", tag = surface.tag());
    let _enter = span.enter();

    let budget = Budget {
        start: Instant::now(),
        limit: options.time_budget,
    };
    let mut ctx = MeshOptimizationContext::new(surface, size_field, options);
    ctx.init_sizes(mesh);
    ctx.refresh_keys(mesh);
    if options.validate_topology {
        check_topology(mesh)?;
    }

    let mut stats = OptimizeStats::default();
    let report = |pass: usize, phase: Phase, accepted: usize, mesh: &SurfaceMesh<I>| {
        debug!(pass, %phase, accepted, live = mesh.num_live_triangles(), "phase finished");
        if let Some(p) = progress {
            p.report(&PhaseReport {
                pass,
                phase,
                accepted,
                live_triangles: mesh.num_live_triangles(),
            });
        }
    };

    for pass in 0..options.max_passes {
        if budget.exhausted() {
            stats.budget_exhausted = true;
            break;
        }
        stats.passes += 1;

        let swaps = swap_phase(&mut ctx, mesh, &budget)?;
        end_phase(mesh, options)?;
        report(pass, Phase::Swap, swaps, mesh);

        let splits = split_phase(&mut ctx, mesh)?;
        end_phase(mesh, options)?;
        report(pass, Phase::Split, splits, mesh);

        let collapses = collapse_phase(&mut ctx, mesh)?;
        end_phase(mesh, options)?;
        report(pass, Phase::Collapse, collapses, mesh);

        if options.smoothing_iterations > 0 {
            let mut moved = 0;
            for _ in 0..options.smoothing_iterations {
                moved += laplace_smooth(&ctx, mesh)?;
            }
            stats.smoothed += moved;
            report(pass, Phase::Smooth, moved, mesh);
        }

        stats.swaps += swaps;
        stats.splits += splits;
        stats.collapses += collapses;

        if swaps + splits + collapses == 0 {
            stats.converged = true;
            break;
        }
    }

    if !stats.converged && budget.exhausted() {
        stats.budget_exhausted = true;
    }

    stats.live_triangles = mesh.num_live_triangles();
    stats.referenced_vertices = mesh.num_referenced_vertices();
    stats.min_quality = mesh.min_quality();

    info!(
        passes = stats.passes,
        swaps = stats.swaps,
        splits = stats.splits,
        collapses = stats.collapses,
        converged = stats.converged,
        triangles = stats.live_triangles,
        "optimization finished"
    );

    Ok(stats)
}

fn end_phase<I: MeshIndex>(mesh: &mut SurfaceMesh<I>, options: &OptimizeOptions) -> Result<()> {
    mesh.sweep_and_compact()?;
    if options.validate_topology {
        check_topology(mesh)?;
    }
    Ok(())
}

/// Swap rounds until a round accepts nothing, the round cap, or the budget.
fn swap_phase<I, S, F>(
    ctx: &mut MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
    budget: &Budget,
) -> Result<usize>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    ctx.begin_phase();
    let mut total = 0;

    for round in 0..ctx.options().max_swap_rounds {
        if budget.exhausted() {
            break;
        }
        let mut accepted = 0;
        for t in mesh.traversal_order() {
            if !mesh.is_live(t) {
                continue;
            }
            for i in 0..3 {
                match swap_edge(ctx, mesh, t, i)? {
                    Outcome::Accepted => {
                        accepted += 1;
                        break;
                    }
                    Outcome::Refused(reason) => {
                        trace!(triangle = t.index(), edge = i, %reason, "swap refused")
                    }
                }
            }
        }
        mesh.sweep_and_compact()?;
        trace!(round, accepted, "swap round");
        total += accepted;
        if accepted == 0 {
            break;
        }
    }

    Ok(total)
}

/// One sweep of edge splits.
fn split_phase<I, S, F>(
    ctx: &mut MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
) -> Result<usize>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    ctx.begin_phase();
    let mut accepted = 0;
    for t in mesh.traversal_order() {
        for i in 0..3 {
            if !mesh.is_live(t) {
                break;
            }
            match split_edge(ctx, mesh, t, i)? {
                Outcome::Accepted => accepted += 1,
                Outcome::Refused(reason) => {
                    trace!(triangle = t.index(), edge = i, %reason, "split refused")
                }
            }
        }
    }
    Ok(accepted)
}

/// One sweep of vertex collapses, smallest keys first.
fn collapse_phase<I, S, F>(
    ctx: &mut MeshOptimizationContext<'_, I, S, F>,
    mesh: &mut SurfaceMesh<I>,
) -> Result<usize>
where
    I: MeshIndex,
    S: Surface,
    F: SizeField,
{
    ctx.begin_phase();
    let order: Vec<TriangleId<I>> = mesh.traversal_order().into_iter().rev().collect();
    let mut accepted = 0;
    for t in order {
        for k in 0..3 {
            if !mesh.is_live(t) {
                break;
            }
            match collapse_vertex(ctx, mesh, t, k)? {
                Outcome::Accepted => accepted += 1,
                Outcome::Refused(reason) => {
                    trace!(triangle = t.index(), vertex = k, %reason, "collapse refused")
                }
            }
        }
    }
    Ok(accepted)
}
