//! Miscellaneous utilities: the 2D cross-product algebra used by the solver
//! and transform interpolation used by continuous collision detection.

use crate::math::{Isometry, Real, Rotation, Translation, Vector};

/// The scalar cross products of the 2D solver algebra.
///
/// In 2D the angular velocity is a scalar, so `ω × v` yields a vector and
/// `v × w` yields a scalar. Keeping these as a trait keeps the solver code
/// spelled the same way at every call site.
pub(crate) trait WCross<Rhs>: Sized {
    type Result;
    fn gcross(self, rhs: Rhs) -> Self::Result;
}

impl WCross<Vector<Real>> for Real {
    type Result = Vector<Real>;

    #[inline]
    fn gcross(self, rhs: Vector<Real>) -> Self::Result {
        Vector::new(-self * rhs.y, self * rhs.x)
    }
}

impl WCross<Vector<Real>> for Vector<Real> {
    type Result = Real;

    #[inline]
    fn gcross(self, rhs: Vector<Real>) -> Self::Result {
        self.x * rhs.y - self.y * rhs.x
    }
}

/// Orthonormal basis completion: in 2D a single tangent.
pub(crate) trait WBasis: Sized {
    fn orthonormal_basis(&self) -> [Self; 1];
}

impl WBasis for Vector<Real> {
    #[inline]
    fn orthonormal_basis(&self) -> [Self; 1] {
        [Vector::new(-self.y, self.x)]
    }
}

/// Operations on rigid transforms used by swept-shape queries.
pub(crate) trait IsometryOps {
    /// The transform obtained by advancing `self` by the fraction `t` of the
    /// displacement `(dp, dangle)`.
    fn lerp_towards(&self, dp: &Vector<Real>, dangle: Real, t: Real) -> Isometry<Real>;
}

impl IsometryOps for Isometry<Real> {
    #[inline]
    fn lerp_towards(&self, dp: &Vector<Real>, dangle: Real, t: Real) -> Isometry<Real> {
        let tra = Translation::from(self.translation.vector + dp * t);
        let rot = Rotation::new(dangle * t) * self.rotation;
        Isometry::from_parts(tra, rot)
    }
}

/// Returns the element of the pair that is not `elt`.
#[inline]
pub(crate) fn select_other<T: PartialEq + Copy>(pair: (T, T), elt: T) -> T {
    if pair.0 == elt {
        pair.1
    } else {
        pair.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_cross_is_quarter_turn() {
        let v = 2.0f32.gcross(Vector::new(1.0, 0.0));
        assert_eq!(v, Vector::new(0.0, 2.0));
        let s = Vector::new(1.0, 0.0).gcross(Vector::new(0.0, 3.0));
        assert_eq!(s, 3.0);
    }

    #[test]
    fn lerp_towards_advances_both_parts() {
        let start = Isometry::new(Vector::new(1.0, 0.0), 0.0);
        let mid = start.lerp_towards(&Vector::new(2.0, 2.0), std::f32::consts::PI, 0.5);
        assert!((mid.translation.vector - Vector::new(2.0, 1.0)).norm() < 1.0e-6);
        assert!((mid.rotation.angle() - std::f32::consts::FRAC_PI_2).abs() < 1.0e-6);
    }
}
