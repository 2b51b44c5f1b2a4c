//! Triangle shape measures and metric predicates.

use nalgebra::{Matrix2, Matrix3, Matrix3x2, Point2, Point3};

/// `2√3`, normalizes [`shape_quality`] to 1 for an equilateral triangle.
const RHO_NORMALIZATION: f64 = 3.464_101_615_137_754_6;

/// Signed area of a parametric triangle (positive when counter-clockwise).
#[inline]
pub fn signed_area_uv(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    0.5 * (b - a).perp(&(c - a))
}

/// Inradius over longest edge, scaled so the equilateral triangle scores 1.
///
/// Returns 0 for degenerate triangles.
pub fn shape_quality(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> f64 {
    let a = (p1 - p0).norm();
    let b = (p2 - p1).norm();
    let c = (p0 - p2).norm();
    let perimeter = a + b + c;
    let longest = a.max(b).max(c);
    if perimeter <= 0.0 || longest <= 0.0 {
        return 0.0;
    }
    let twice_area = (p1 - p0).cross(&(p2 - p0)).norm();
    let inradius = twice_area / perimeter;
    (RHO_NORMALIZATION * inradius / longest).min(1.0)
}

/// Circumradius of a physical triangle; `f64::MAX` when degenerate.
pub fn circumradius(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> f64 {
    let a = (p1 - p0).norm();
    let b = (p2 - p1).norm();
    let c = (p0 - p2).norm();
    let twice_area = (p1 - p0).cross(&(p2 - p0)).norm();
    if twice_area <= f64::EPSILON * (a * b).max(f64::MIN_POSITIVE) {
        return f64::MAX;
    }
    a * b * c / (2.0 * twice_area)
}

/// Express a physical-space metric in the parameter plane: `Jᵀ M J`.
#[inline]
pub fn pull_back_metric(jacobian: &Matrix3x2<f64>, metric: &Matrix3<f64>) -> Matrix2<f64> {
    jacobian.transpose() * metric * jacobian
}

/// Circumcenter and squared circumradius of `abc` measured in `metric`.
///
/// Returns `None` when the triangle is flat under the metric.
pub fn circumcircle_aniso(
    metric: &Matrix2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
) -> Option<(Point2<f64>, f64)> {
    let ab = b - a;
    let ac = c - a;
    let m_ab = metric * ab;
    let m_ac = metric * ac;

    // Equal metric distance to a, b and c, with the origin moved to a.
    let system = Matrix2::new(2.0 * m_ab.x, 2.0 * m_ab.y, 2.0 * m_ac.x, 2.0 * m_ac.y);
    let scale = system.norm_squared();
    if scale == 0.0 || !scale.is_finite() || system.determinant().abs() <= 1e-12 * scale {
        return None;
    }
    let rhs = nalgebra::Vector2::new(ab.dot(&m_ab), ac.dot(&m_ac));
    let offset = system.try_inverse()? * rhs;
    let radius_sq = offset.dot(&(metric * offset));
    Some((a + offset, radius_sq))
}

/// Whether `p` lies strictly inside the metric circumcircle of `abc`.
///
/// Points within a relative `1e-10` of the circle count as outside, so
/// cocircular configurations are stable. `None` when the circumcircle is
/// undefined.
pub fn in_circumcircle_aniso(
    metric: &Matrix2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    p: &Point2<f64>,
) -> Option<bool> {
    let (center, radius_sq) = circumcircle_aniso(metric, a, b, c)?;
    let d = p - center;
    Some(d.dot(&(metric * d)) < radius_sq * (1.0 - 1e-10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_equilateral_quality_is_one() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.5, 3f64.sqrt() / 2.0, 0.0);
        assert!((shape_quality(&p0, &p1, &p2) - 1.0).abs() < 1e-12);
        assert!((circumradius(&p0, &p1, &p2) - 1.0 / 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sliver_quality_is_small() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.5, 0.01, 0.0);
        assert!(shape_quality(&p0, &p1, &p2) < 0.05);
        assert_eq!(shape_quality(&p0, &p0, &p2), 0.0);
        assert_eq!(circumradius(&p0, &p1, &Point3::new(2.0, 0.0, 0.0)), f64::MAX);
    }

    #[test]
    fn test_signed_area_orientation() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        assert!((signed_area_uv(&a, &b, &c) - 0.5).abs() < 1e-15);
        assert!((signed_area_uv(&a, &c, &b) + 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_isotropic_circumcircle() {
        let m = Matrix2::identity();
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        let (center, r2) = circumcircle_aniso(&m, &a, &b, &c).unwrap();
        assert!((center - Point2::new(0.5, 0.5)).norm() < 1e-12);
        assert!((r2 - 0.5).abs() < 1e-12);

        assert_eq!(in_circumcircle_aniso(&m, &a, &b, &c, &Point2::new(0.9, 0.9)), Some(true));
        assert_eq!(in_circumcircle_aniso(&m, &a, &b, &c, &Point2::new(1.2, 1.2)), Some(false));
    }

    #[test]
    fn test_stretched_metric_changes_verdict() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        let p = Point2::new(1.3, 0.3);
        assert_eq!(in_circumcircle_aniso(&Matrix2::identity(), &a, &b, &c, &p), Some(false));
        // Distances along u count ten times less: the circle stretches along u.
        let stretched = Matrix2::new(0.01, 0.0, 0.0, 1.0);
        assert_eq!(in_circumcircle_aniso(&stretched, &a, &b, &c, &p), Some(true));
    }

    #[test]
    fn test_cocircular_point_is_outside() {
        let m = Matrix2::identity();
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(1.0, 1.0);
        assert_eq!(in_circumcircle_aniso(&m, &a, &b, &c, &Point2::new(0.0, 1.0)), Some(false));
    }

    #[test]
    fn test_collinear_has_no_circumcircle() {
        let m = Matrix2::identity();
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(2.0, 0.0);
        assert!(circumcircle_aniso(&m, &a, &b, &c).is_none());
    }

    #[test]
    fn test_pull_back_of_identity_is_first_fundamental_form() {
        let j =
            Matrix3x2::from_columns(&[Vector3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 1.0)]);
        let g = pull_back_metric(&j, &Matrix3::identity());
        assert_eq!(g, Matrix2::new(4.0, 0.0, 0.0, 2.0));
    }
}
