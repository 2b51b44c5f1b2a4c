//! Background size field contract.
//!
//! A size field answers "how long should an edge be here?". The optimizer
//! queries it once per vertex (the answer is cached on the vertex) and, for the
//! Delaunay swap criterion, asks for a full metric at the midpoint of the edge
//! under consideration.
//!
//! Every answer is clamped by [`SizeBounds`] before use. For metrics the clamp
//! acts on the principal sizes.

use nalgebra::{Matrix3, Point2, Point3, Vector3};

use crate::surface::EntityDim;

/// A location at which the background size is queried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeQuery {
    /// Tag of the entity being meshed.
    pub entity: usize,
    /// Dimension of that entity.
    pub dimension: EntityDim,
    /// Parametric location.
    pub uv: Point2<f64>,
    /// Physical location (the surface image of `uv`).
    pub position: Point3<f64>,
}

/// A background element-size field.
///
/// Implementations must be pure: the optimizer may query the same location any
/// number of times, in any order, from any worker.
pub trait SizeField {
    /// Target edge length at the queried location.
    fn size(&self, query: &SizeQuery) -> f64;

    /// Target metric at the queried location.
    ///
    /// A unit-length edge `e` under this metric satisfies `eᵀ M e = 1`. The
    /// default is the isotropic metric `I / h²`.
    fn metric(&self, query: &SizeQuery) -> Matrix3<f64> {
        let h = self.size(query);
        Matrix3::identity() / (h * h)
    }
}

impl<T: SizeField + ?Sized> SizeField for &T {
    fn size(&self, query: &SizeQuery) -> f64 {
        (**self).size(query)
    }

    fn metric(&self, query: &SizeQuery) -> Matrix3<f64> {
        (**self).metric(query)
    }
}

/// The same target size everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSize(pub f64);

impl SizeField for UniformSize {
    fn size(&self, _query: &SizeQuery) -> f64 {
        self.0
    }
}

/// A size field defined by a closure over the query.
///
/// ```
/// use surfopt::sizing::{SizeField, SizeFn, SizeQuery};
/// use surfopt::surface::EntityDim;
/// use nalgebra::{Point2, Point3};
///
/// // Finer near the origin.
/// let field = SizeFn::new(|q: &SizeQuery| 0.05 + 0.1 * q.position.coords.norm());
/// let q = SizeQuery {
///     entity: 0,
///     dimension: EntityDim::Surface,
///     uv: Point2::origin(),
///     position: Point3::origin(),
/// };
/// assert!((field.size(&q) - 0.05).abs() < 1e-12);
/// ```
pub struct SizeFn<F>(F);

impl<F> SizeFn<F>
where
    F: Fn(&SizeQuery) -> f64,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> SizeField for SizeFn<F>
where
    F: Fn(&SizeQuery) -> f64,
{
    fn size(&self, query: &SizeQuery) -> f64 {
        (self.0)(query)
    }
}

impl<F> std::fmt::Debug for SizeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeFn").finish_non_exhaustive()
    }
}

/// Global clamp and scale applied to every size sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    /// Smallest admissible size.
    pub min: f64,
    /// Largest admissible size.
    pub max: f64,
    /// Multiplier applied after clamping.
    pub factor: f64,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::MAX,
            factor: 1.0,
        }
    }
}

impl SizeBounds {
    /// Clamp a raw sample, or `None` if it is not a usable size.
    #[inline]
    pub fn apply(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() || raw <= 0.0 {
            return None;
        }
        let clamped = raw.max(self.min).min(self.max) * self.factor;
        (clamped > 0.0 && clamped.is_finite()).then_some(clamped)
    }

    /// Clamp the principal sizes of a raw metric, or `None` if it is not
    /// symmetric positive definite.
    ///
    /// An eigenvalue `λ` stands for the size `1/√λ` along its eigenvector. Each
    /// size goes through [`apply`](Self::apply) and the metric is rebuilt on the
    /// same eigenvectors, so its eigenvalues end up between
    /// `1/(max·factor)²` and `1/(min·factor)²`.
    pub fn apply_metric(&self, raw: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        if raw.iter().any(|x| !x.is_finite()) {
            return None;
        }
        let scale = raw.norm();
        if scale == 0.0 || (raw - raw.transpose()).norm() > 1e-9 * scale {
            return None;
        }

        let eigen = (*raw).symmetric_eigen();
        let mut clamped = Vector3::zeros();
        for (i, &lambda) in eigen.eigenvalues.iter().enumerate() {
            let h = self.apply(1.0 / lambda.sqrt())?;
            clamped[i] = 1.0 / (h * h);
        }
        let q = eigen.eigenvectors;
        Some(q * Matrix3::from_diagonal(&clamped) * q.transpose())
    }
}
