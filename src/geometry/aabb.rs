//! Axis-aligned bounding boxes.

use crate::math::{Point, Real, Vector};

/// An axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AABB {
    /// The smallest corner of this AABB.
    pub mins: Point<Real>,
    /// The largest corner of this AABB.
    pub maxs: Point<Real>,
}

impl AABB {
    /// Builds an AABB from its two extremal corners.
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Self {
        Self { mins, maxs }
    }

    /// The AABB containing a single point.
    pub fn from_point(pt: Point<Real>) -> Self {
        Self { mins: pt, maxs: pt }
    }

    /// The center of this AABB.
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// The half-extents of this AABB.
    pub fn half_extents(&self) -> Vector<Real> {
        (self.maxs - self.mins) / 2.0
    }

    /// The smallest AABB containing both `self` and `other`.
    pub fn merged(&self, other: &AABB) -> AABB {
        AABB {
            mins: Point::new(self.mins.x.min(other.mins.x), self.mins.y.min(other.mins.y)),
            maxs: Point::new(self.maxs.x.max(other.maxs.x), self.maxs.y.max(other.maxs.y)),
        }
    }

    /// This AABB, grown by `amount` on every side.
    pub fn loosened(&self, amount: Real) -> AABB {
        let margin = Vector::repeat(amount);
        AABB {
            mins: self.mins - margin,
            maxs: self.maxs + margin,
        }
    }

    /// Do `self` and `other` overlap?
    pub fn intersects(&self, other: &AABB) -> bool {
        self.mins.x <= other.maxs.x
            && self.maxs.x >= other.mins.x
            && self.mins.y <= other.maxs.y
            && self.maxs.y >= other.mins.y
    }

    /// Does this AABB contain the given point?
    pub fn contains_point(&self, pt: &Point<Real>) -> bool {
        pt.x >= self.mins.x && pt.x <= self.maxs.x && pt.y >= self.mins.y && pt.y <= self.maxs.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_covers_both() {
        let a = AABB::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let b = AABB::new(Point::new(-1.0, 0.5), Point::new(0.5, 2.0));
        let m = a.merged(&b);
        assert_eq!(m.mins, Point::new(-1.0, 0.0));
        assert_eq!(m.maxs, Point::new(1.0, 2.0));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = AABB::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let b = AABB::new(Point::new(1.0, 0.0), Point::new(2.0, 1.0));
        assert!(a.intersects(&b));
    }
}
