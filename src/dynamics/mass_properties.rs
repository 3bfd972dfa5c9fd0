//! Mass, center of mass, and angular inertia of rigid bodies.

use crate::geometry::Shape;
use crate::math::{Isometry, Point, Real};

/// The mass properties of a rigid body or of a collider's shape.
///
/// Stored in inverse form: a zero inverse mass or inverse inertia models an
/// immovable degree of freedom.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// The center of mass, in local space.
    pub local_com: Point<Real>,
    /// The inverse of the mass.
    pub inv_mass: Real,
    /// The inverse of the angular inertia about the center of mass.
    pub inv_principal_inertia: Real,
}

impl MassProperties {
    /// Initializes the mass properties from the given center of mass, mass,
    /// and angular inertia about the center of mass.
    ///
    /// A zero mass or inertia maps to a zero inverse.
    pub fn new(local_com: Point<Real>, mass: Real, principal_inertia: Real) -> Self {
        assert!(mass >= 0.0, "The mass must be non-negative.");
        assert!(
            principal_inertia >= 0.0,
            "The angular inertia must be non-negative."
        );
        Self {
            local_com,
            inv_mass: inv(mass),
            inv_principal_inertia: inv(principal_inertia),
        }
    }

    /// Properties with zero mass and inertia.
    pub fn zero() -> Self {
        Self {
            local_com: Point::origin(),
            inv_mass: 0.0,
            inv_principal_inertia: 0.0,
        }
    }

    /// The mass of this set of properties.
    pub fn mass(&self) -> Real {
        inv(self.inv_mass)
    }

    /// The angular inertia about the center of mass.
    pub fn principal_inertia(&self) -> Real {
        inv(self.inv_principal_inertia)
    }

    /// The mass properties of the given shape with the given density.
    pub fn from_shape(shape: &Shape, density: Real) -> Self {
        match shape {
            Shape::Circle(c) => {
                let mass = density * std::f32::consts::PI * c.radius * c.radius;
                let inertia = mass * c.radius * c.radius / 2.0;
                Self::new(Point::origin(), mass, inertia)
            }
            Shape::Polygon(p) => {
                // Standard polygon decomposition into triangles fanned from
                // the origin.
                let vertices = p.vertices();
                let mut area = 0.0;
                let mut com = na::Vector2::zeros();
                let mut inertia = 0.0;

                for i in 0..vertices.len() {
                    let v1 = vertices[i].coords;
                    let v2 = vertices[(i + 1) % vertices.len()].coords;
                    let cross = v1.x * v2.y - v2.x * v1.y;
                    area += cross / 2.0;
                    com += (v1 + v2) * (cross / 6.0);
                    inertia += cross * (v1.dot(&v1) + v1.dot(&v2) + v2.dot(&v2)) / 12.0;
                }

                let mass = density * area;
                let com = com / area;
                // Move the origin-relative inertia to the center of mass.
                let inertia = density * inertia - mass * com.norm_squared();
                Self::new(Point::from(com), mass, inertia)
            }
            Shape::Capsule(c) => {
                let r = c.radius;
                let h = c.half_length;
                let rect_mass = density * 4.0 * h * r;
                let disc_mass = density * std::f32::consts::PI * r * r;
                let mass = rect_mass + disc_mass;

                let rect_inertia = rect_mass * (4.0 * h * h + 4.0 * r * r) / 12.0;
                // Each half-disc: inertia about its own centroid plus the
                // parallel-axis term for its offset from the capsule center.
                let disc_inertia = disc_mass * (r * r / 2.0 + h * h);
                Self::new(Point::origin(), mass, rect_inertia + disc_inertia)
            }
            Shape::Segment(s) => {
                // A thin rod with linear density.
                let length = (s.b - s.a).norm();
                let mass = density * length;
                let com = na::center(&s.a, &s.b);
                let inertia = mass * length * length / 12.0;
                Self::new(com, mass, inertia)
            }
            Shape::Ellipse(e) => {
                let mass = density * std::f32::consts::PI * e.radius_x * e.radius_y;
                let inertia = mass * (e.radius_x * e.radius_x + e.radius_y * e.radius_y) / 4.0;
                Self::new(Point::origin(), mass, inertia)
            }
            Shape::Link(l) => Self::from_shape(&Shape::Segment(l.segment), density),
        }
    }

    /// These mass properties, expressed in a frame related to the current
    /// one by `pos`.
    pub fn transformed(&self, pos: &Isometry<Real>) -> Self {
        Self {
            local_com: pos * self.local_com,
            inv_mass: self.inv_mass,
            // 2D angular inertia is invariant under rotation; the
            // translation part is accounted for when summing.
            inv_principal_inertia: self.inv_principal_inertia,
        }
    }

    /// The sum of two mass properties, with the parallel-axis contribution
    /// of their centers of mass.
    pub fn sum(&self, other: &Self) -> Self {
        let m1 = self.mass();
        let m2 = other.mass();
        let mass = m1 + m2;

        if mass == 0.0 {
            return Self::zero();
        }

        let com = Point::from((self.local_com.coords * m1 + other.local_com.coords * m2) / mass);
        let i1 = self.principal_inertia() + m1 * (self.local_com - com).norm_squared();
        let i2 = other.principal_inertia() + m2 * (other.local_com - com).norm_squared();
        Self::new(com, mass, i1 + i2)
    }
}

fn inv(x: Real) -> Real {
    if x == 0.0 {
        0.0
    } else {
        1.0 / x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Polygon};
    use approx::assert_relative_eq;

    #[test]
    fn circle_mass_properties() {
        let props = MassProperties::from_shape(&Shape::Circle(Circle::new(2.0)), 1.0);
        let mass = std::f32::consts::PI * 4.0;
        assert_relative_eq!(props.mass(), mass, epsilon = 1.0e-4);
        assert_relative_eq!(props.principal_inertia(), mass * 2.0, epsilon = 1.0e-3);
    }

    #[test]
    fn rectangle_mass_properties() {
        let props =
            MassProperties::from_shape(&Shape::Polygon(Polygon::rectangle(1.0, 0.5)), 2.0);
        // 2x1 rectangle with density 2.
        assert_relative_eq!(props.mass(), 4.0, epsilon = 1.0e-4);
        assert_relative_eq!(props.local_com.x, 0.0, epsilon = 1.0e-5);
        // I = m (w^2 + h^2) / 12.
        assert_relative_eq!(
            props.principal_inertia(),
            4.0 * (4.0 + 1.0) / 12.0,
            epsilon = 1.0e-3
        );
    }

    #[test]
    fn sum_applies_the_parallel_axis_theorem() {
        let c = MassProperties::new(Point::new(1.0, 0.0), 1.0, 0.0);
        let d = MassProperties::new(Point::new(-1.0, 0.0), 1.0, 0.0);
        let total = c.sum(&d);
        assert_relative_eq!(total.mass(), 2.0);
        assert_relative_eq!(total.local_com.x, 0.0);
        // Two unit point masses at distance 1 from the common center.
        assert_relative_eq!(total.principal_inertia(), 2.0, epsilon = 1.0e-5);
    }
}
