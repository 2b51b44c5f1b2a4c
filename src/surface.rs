//! Parametric surface evaluation.
//!
//! The optimizer never owns geometry. It sees the surface being meshed only
//! through the [`Surface`] trait: a map from parametric coordinates `(u, v)` to
//! physical points, plus the entity's tag and topological dimension.

use nalgebra::{Matrix3x2, Point2, Point3, Vector3};

/// Topological dimension of a geometric entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityDim {
    /// A model vertex.
    Point,
    /// A model curve.
    Curve,
    /// A model surface.
    Surface,
}

impl EntityDim {
    /// Dimension as an integer (0, 1 or 2).
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            EntityDim::Point => 0,
            EntityDim::Curve => 1,
            EntityDim::Surface => 2,
        }
    }
}

/// A parametric surface `(u, v) -> (x, y, z)`.
///
/// `point` must be defined everywhere inside the entity's parameter bounds and
/// must be free of side effects.
pub trait Surface {
    /// Identifier of the geometric entity, forwarded to size queries.
    fn tag(&self) -> usize {
        0
    }

    /// Topological dimension of the entity.
    fn dimension(&self) -> EntityDim {
        EntityDim::Surface
    }

    /// Physical image of a parametric location.
    fn point(&self, uv: Point2<f64>) -> Point3<f64>;

    /// Partial derivatives `(dP/du, dP/dv)` at a parametric location.
    ///
    /// The default uses central differences on [`Surface::point`].
    fn derivatives(&self, uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        const H: f64 = 1e-6;
        let pu = self.point(Point2::new(uv.x + H, uv.y)) - self.point(Point2::new(uv.x - H, uv.y));
        let pv = self.point(Point2::new(uv.x, uv.y + H)) - self.point(Point2::new(uv.x, uv.y - H));
        (pu / (2.0 * H), pv / (2.0 * H))
    }

    /// Jacobian of the parametrization, columns `dP/du` and `dP/dv`.
    fn jacobian(&self, uv: Point2<f64>) -> Matrix3x2<f64> {
        let (du, dv) = self.derivatives(uv);
        Matrix3x2::from_columns(&[du, dv])
    }
}

impl<S: Surface + ?Sized> Surface for &S {
    fn tag(&self) -> usize {
        (**self).tag()
    }

    fn dimension(&self) -> EntityDim {
        (**self).dimension()
    }

    fn point(&self, uv: Point2<f64>) -> Point3<f64> {
        (**self).point(uv)
    }

    fn derivatives(&self, uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (**self).derivatives(uv)
    }
}

/// An affine plane `origin + u * u_axis + v * v_axis`.
#[derive(Debug, Clone, Copy)]
pub struct PlanarSurface {
    /// Entity tag.
    pub tag: usize,
    /// Image of `(0, 0)`.
    pub origin: Point3<f64>,
    /// Direction and scale of the `u` parameter.
    pub u_axis: Vector3<f64>,
    /// Direction and scale of the `v` parameter.
    pub v_axis: Vector3<f64>,
}

impl PlanarSurface {
    /// The `z = 0` plane with `(u, v) = (x, y)`.
    pub fn xy() -> Self {
        Self {
            tag: 0,
            origin: Point3::origin(),
            u_axis: Vector3::x(),
            v_axis: Vector3::y(),
        }
    }

    /// Set the entity tag.
    pub fn with_tag(mut self, tag: usize) -> Self {
        self.tag = tag;
        self
    }
}

impl Surface for PlanarSurface {
    fn tag(&self) -> usize {
        self.tag
    }

    fn point(&self, uv: Point2<f64>) -> Point3<f64> {
        self.origin + self.u_axis * uv.x + self.v_axis * uv.y
    }

    fn derivatives(&self, _uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (self.u_axis, self.v_axis)
    }
}

/// A surface defined by a closure.
///
/// ```
/// use surfopt::surface::{ParametricSurface, Surface};
/// use nalgebra::{Point2, Point3};
///
/// // Unit cylinder around the z axis, u = angle, v = height.
/// let cylinder = ParametricSurface::new(|uv: Point2<f64>| {
///     Point3::new(uv.x.cos(), uv.x.sin(), uv.y)
/// });
/// let p = cylinder.point(Point2::new(0.0, 2.0));
/// assert!((p.x - 1.0).abs() < 1e-12 && (p.z - 2.0).abs() < 1e-12);
/// ```
#[derive(Clone)]
pub struct ParametricSurface<F> {
    tag: usize,
    map: F,
}

impl<F> ParametricSurface<F>
where
    F: Fn(Point2<f64>) -> Point3<f64>,
{
    /// Wrap a parametrization.
    pub fn new(map: F) -> Self {
        Self { tag: 0, map }
    }

    /// Set the entity tag.
    pub fn with_tag(mut self, tag: usize) -> Self {
        self.tag = tag;
        self
    }
}

impl<F> Surface for ParametricSurface<F>
where
    F: Fn(Point2<f64>) -> Point3<f64>,
{
    fn tag(&self) -> usize {
        self.tag
    }

    fn point(&self, uv: Point2<f64>) -> Point3<f64> {
        (self.map)(uv)
    }
}

impl<F> std::fmt::Debug for ParametricSurface<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParametricSurface")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_surface_maps_uv_to_xy() {
        let plane = PlanarSurface::xy().with_tag(4);
        let p = plane.point(Point2::new(0.25, -1.5));
        assert_eq!(p, Point3::new(0.25, -1.5, 0.0));
        assert_eq!(plane.tag(), 4);
        assert_eq!(plane.dimension().as_u8(), 2);
    }

    #[test]
    fn test_finite_difference_derivatives() {
        let cylinder =
            ParametricSurface::new(|uv: Point2<f64>| Point3::new(uv.x.cos(), uv.x.sin(), uv.y));
        let (du, dv) = cylinder.derivatives(Point2::new(0.0, 0.0));
        assert!((du - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
        assert!((dv - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_jacobian_columns() {
        let plane = PlanarSurface {
            tag: 0,
            origin: Point3::origin(),
            u_axis: Vector3::new(2.0, 0.0, 0.0),
            v_axis: Vector3::new(0.0, 0.0, 3.0),
        };
        let j = plane.jacobian(Point2::origin());
        assert_eq!(j.column(0).into_owned(), Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(j.column(1).into_owned(), Vector3::new(0.0, 0.0, 3.0));
    }
}
