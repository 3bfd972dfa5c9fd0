//! Continuous collision detection: conservative advancement between two
//! swept shapes, and the time-of-impact resolution pass for bullet bodies.

use crate::dynamics::{IntegrationParameters, JointSet, RigidBodyHandle, RigidBodySet};
use crate::geometry::{ColliderSet, Gjk, AABB};
use crate::math::{Isometry, Real, Vector};
use crate::pipeline::{PhysicsHooks, PhysicsHooksFlags, ToiFilterContext};
use crate::utils::{IsometryOps, WCross};

/// Computes the earliest time `t` in `[0, 1]` at which two moving shapes
/// come within `distance_epsilon` of each other.
///
/// Both shapes start at their given pose and move by the displacement
/// `(dp, dangle)` over the unit time interval, interpolated linearly.
/// Returns `None` when the shapes do not touch within the interval; running
/// out of iterations also reports no impact rather than a possibly-false
/// positive.
pub fn time_of_impact(
    gjk: &Gjk,
    shape1: &crate::geometry::Shape,
    start1: &Isometry<Real>,
    dp1: &Vector<Real>,
    dangle1: Real,
    shape2: &crate::geometry::Shape,
    start2: &Isometry<Real>,
    dp2: &Vector<Real>,
    dangle2: Real,
    max_iterations: usize,
    distance_epsilon: Real,
) -> Option<Real> {
    assert!(
        max_iterations >= crate::dynamics::MIN_CCD_ITERATIONS,
        "The CCD maximum number of iterations must be at least {}.",
        crate::dynamics::MIN_CCD_ITERATIONS
    );
    assert!(
        distance_epsilon > 0.0,
        "The CCD distance epsilon must be positive."
    );

    // Bounds the surface speed added by each shape's rotation.
    let r1 = shape1.bounding_radius();
    let r2 = shape2.bounding_radius();

    let mut t = 0.0;

    for _ in 0..max_iterations {
        let pos1 = start1.lerp_towards(dp1, dangle1, t);
        let pos2 = start2.lerp_towards(dp2, dangle2, t);

        let sep = match gjk.distance(shape1, &pos1, shape2, &pos2) {
            // Already touching or overlapping at `t`.
            None => return Some(t),
            Some(sep) => sep,
        };

        if sep.distance <= distance_epsilon {
            return Some(t);
        }

        // Upper bound on how fast the separation can close, per unit of t:
        // the relative translation projected on the separating direction,
        // plus the rotational surface speed of both shapes.
        let closing_bound =
            (dp1 - dp2).dot(&sep.normal) + dangle1.abs() * r1 + dangle2.abs() * r2;
        if closing_bound <= 0.0 {
            return None;
        }

        t += sep.distance / closing_bound;
        if t > 1.0 {
            return None;
        }
    }

    log::debug!("Conservative advancement ran out of iterations; reporting no impact.");
    None
}

/// Resolves the earliest impacts of fast-moving "bullet" bodies.
///
/// After the discrete solve has integrated positions, each bullet body is
/// swept from its start-of-step pose to its end-of-step pose against every
/// collider whose swept bounds it crosses. The earliest impact rewinds the
/// involved bodies to the impact poses and cancels their closing velocity;
/// the next narrow-phase pass then produces a regular contact. A substep
/// cap bounds the work.
pub(crate) struct CcdSolver {
    bullets: Vec<RigidBodyHandle>,
}

struct ToiHit {
    toi: Real,
    body1: RigidBodyHandle,
    body2: RigidBodyHandle,
}

impl CcdSolver {
    pub fn new() -> Self {
        Self {
            bullets: Vec::new(),
        }
    }

    pub fn solve(
        &mut self,
        params: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        joints: &JointSet,
        hooks: &dyn PhysicsHooks,
    ) {
        let gjk = Gjk::new(params.gjk_max_iterations, params.gjk_distance_epsilon);

        self.bullets.clear();
        for (handle, rb) in bodies.iter() {
            if rb.is_bullet() && rb.is_dynamic() && !rb.is_sleeping() {
                self.bullets.push(handle);
            }
        }
        if self.bullets.is_empty() {
            return;
        }

        for _ in 0..params.max_ccd_substeps {
            let hit = match self.find_earliest_impact(params, &gjk, bodies, colliders, joints, hooks)
            {
                Some(hit) => hit,
                None => break,
            };

            // Rewind both bodies to their impact poses; the remaining
            // motion of this step is dropped.
            for handle in &[hit.body1, hit.body2] {
                if let Some(rb) = bodies.get_mut_internal(*handle) {
                    if rb.is_dynamic() {
                        let (dp, dangle) = displacement(rb.prev_position, rb.position);
                        rb.position = rb.prev_position.lerp_towards(&dp, dangle, hit.toi);
                        rb.update_world_mass_properties();
                        rb.update_colliders_positions(colliders);
                    }
                }
            }

            self.resolve_impact(&gjk, hit.body1, hit.body2, bodies, colliders);
            bodies.wake_up(hit.body1, true);
            bodies.wake_up(hit.body2, true);
        }
    }

    fn find_earliest_impact(
        &self,
        params: &IntegrationParameters,
        gjk: &Gjk,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        joints: &JointSet,
        hooks: &dyn PhysicsHooks,
    ) -> Option<ToiHit> {
        let mut best: Option<ToiHit> = None;

        for bullet in &self.bullets {
            let rb1 = match bodies.get(*bullet) {
                Some(rb) => rb,
                None => continue,
            };
            let (dp1, dangle1) = displacement(rb1.prev_position, rb1.position);
            if dp1.norm_squared() < 1.0e-12 && dangle1.abs() < 1.0e-6 {
                continue;
            }

            for collider1_handle in rb1.colliders() {
                let collider1 = match colliders.get(*collider1_handle) {
                    Some(c) => c,
                    None => continue,
                };
                if collider1.is_sensor() {
                    continue;
                }

                let start1 = rb1.prev_position * *collider1.position_wrt_parent();
                let swept1 = swept_aabb(collider1.shape(), &start1, &dp1, dangle1);

                for (collider2_handle, collider2) in colliders.iter() {
                    let body2 = collider2.parent();
                    if body2 == *bullet || collider2.is_sensor() {
                        continue;
                    }
                    if !collider1.collision_groups.test(collider2.collision_groups) {
                        continue;
                    }
                    if joints.is_joined(*bullet, body2)
                        && !joints.joint_collision_allowed(*bullet, body2)
                    {
                        continue;
                    }

                    let rb2 = match bodies.get(body2) {
                        Some(rb) => rb,
                        None => continue,
                    };
                    let (dp2, dangle2) = displacement(rb2.prev_position, rb2.position);

                    let start2 = rb2.prev_position * *collider2.position_wrt_parent();
                    let swept2 = swept_aabb(collider2.shape(), &start2, &dp2, dangle2);
                    if !swept1.intersects(&swept2) {
                        continue;
                    }

                    let toi = match time_of_impact(
                        gjk,
                        collider1.shape(),
                        &start1,
                        &dp1,
                        dangle1,
                        collider2.shape(),
                        &start2,
                        &dp2,
                        dangle2,
                        params.ccd_max_iterations,
                        params.ccd_distance_epsilon,
                    ) {
                        Some(toi) if toi < 1.0 => toi,
                        _ => continue,
                    };

                    // Time-of-impact listeners may veto a TOI.
                    if hooks.active_hooks().contains(PhysicsHooksFlags::FILTER_TOI) {
                        let context = ToiFilterContext {
                            collider1: *collider1_handle,
                            collider2: collider2_handle,
                            body1: *bullet,
                            body2,
                            toi,
                        };
                        if !hooks.filter_time_of_impact(&context) {
                            continue;
                        }
                    }

                    if best.as_ref().map(|b| toi < b.toi).unwrap_or(true) {
                        best = Some(ToiHit {
                            toi,
                            body1: *bullet,
                            body2,
                        });
                    }
                }
            }
        }

        best
    }

    // One impulse exchange cancelling the closing velocity of the impact
    // pair at the impact point.
    fn resolve_impact(
        &self,
        gjk: &Gjk,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
    ) {
        let (rb1, rb2) = match bodies.get2_mut_internal(body1, body2) {
            (Some(rb1), Some(rb2)) => (rb1, rb2),
            _ => return,
        };

        // Find the closest pair of points between the two bodies' shapes.
        let mut closest: Option<crate::geometry::Separation> = None;
        for c1 in rb1.colliders() {
            for c2 in rb2.colliders() {
                let (col1, col2) = match (colliders.get(*c1), colliders.get(*c2)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                };
                if let Some(sep) =
                    gjk.distance(col1.shape(), col1.position(), col2.shape(), col2.position())
                {
                    if closest
                        .as_ref()
                        .map(|c| sep.distance < c.distance)
                        .unwrap_or(true)
                    {
                        closest = Some(sep);
                    }
                }
            }
        }

        let sep = match closest {
            Some(sep) => sep,
            None => return,
        };
        let n = sep.normal;

        let dp1 = sep.point1 - rb1.world_com;
        let dp2 = sep.point2 - rb2.world_com;
        let u1 = rb1.linvel + rb1.angvel.gcross(dp1);
        let u2 = rb2.linvel + rb2.angvel.gcross(dp2);
        let vn = (u2 - u1).dot(&n);
        if vn >= 0.0 {
            return;
        }

        let gcross1 = dp1.gcross(n);
        let gcross2 = dp2.gcross(n);
        let k = rb1.effective_inv_mass
            + rb2.effective_inv_mass
            + rb1.effective_inv_inertia * gcross1 * gcross1
            + rb2.effective_inv_inertia * gcross2 * gcross2;
        if k <= 0.0 {
            return;
        }

        let impulse = n * (-vn / k);
        rb1.linvel -= impulse * rb1.effective_inv_mass;
        rb1.angvel -= rb1.effective_inv_inertia * dp1.gcross(impulse);
        rb2.linvel += impulse * rb2.effective_inv_mass;
        rb2.angvel += rb2.effective_inv_inertia * dp2.gcross(impulse);
    }
}

fn displacement(start: Isometry<Real>, end: Isometry<Real>) -> (Vector<Real>, Real) {
    let dp = end.translation.vector - start.translation.vector;
    let dangle = (end.rotation / start.rotation).angle();
    (dp, dangle)
}

fn swept_aabb(
    shape: &crate::geometry::Shape,
    start: &Isometry<Real>,
    dp: &Vector<Real>,
    dangle: Real,
) -> AABB {
    let end = start.lerp_towards(dp, dangle, 1.0);
    shape.compute_aabb(start).merged(&shape.compute_aabb(&end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Polygon, Shape};
    use approx::assert_relative_eq;

    #[test]
    fn head_on_impact_time() {
        // A radius-0.5 pentagon at (0, 1.5) dropping straight onto a
        // 20x0.5 box at the origin. This pentagon's lowest vertex sits
        // 0.47553 below its center and the box top at 0.25, so contact
        // happens after closing 1.5 - 0.47553 - 0.25 = 0.77447 at a
        // closing speed of 2.
        let gjk = Gjk::default();
        let pentagon = Shape::Polygon(Polygon::regular(5, 0.5));
        let ground = Shape::Polygon(Polygon::rectangle(10.0, 0.25));
        let start = Isometry::translation(0.0, 1.5);
        let dp = Vector::new(0.0, -2.0);

        let toi = time_of_impact(
            &gjk,
            &pentagon,
            &start,
            &dp,
            0.0,
            &ground,
            &Isometry::identity(),
            &Vector::zeros(),
            0.0,
            30,
            1.0e-4,
        )
        .expect("the pentagon hits the ground");

        assert_relative_eq!(toi, 0.77447 / 2.0, epsilon = 1.0e-3);

        // At the reported time the pentagon has translated to
        // (0, 1.5 - 2 * toi) and the shapes are within tolerance.
        let at_impact = start.lerp_towards(&dp, 0.0, toi);
        assert_relative_eq!(
            at_impact.translation.vector.y,
            1.5 - 2.0 * 0.38723,
            epsilon = 2.0e-3
        );
        match gjk.distance(&pentagon, &at_impact, &ground, &Isometry::identity()) {
            None => {}
            Some(sep) => assert!(sep.distance <= 1.0e-4 + 1.0e-5),
        }
    }

    #[test]
    fn same_direction_chase() {
        // A fast circle catching up with a slower one: the 0.3 gap closes
        // at relative speed 1.5.
        let gjk = Gjk::default();
        let fast = Shape::Circle(Circle::new(0.1));
        let slow = Shape::Circle(Circle::new(0.1));

        let toi = time_of_impact(
            &gjk,
            &fast,
            &Isometry::translation(0.0, 1.5),
            &Vector::new(2.0, 0.0),
            0.0,
            &slow,
            &Isometry::translation(0.5, 1.5),
            &Vector::new(0.5, 0.0),
            0.0,
            30,
            1.0e-4,
        )
        .expect("the fast circle catches the slow one");

        assert_relative_eq!(toi, 0.2, epsilon = 1.0e-3);
    }

    #[test]
    fn separating_motion_has_no_impact() {
        let gjk = Gjk::default();
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));

        let toi = time_of_impact(
            &gjk,
            &a,
            &Isometry::translation(0.0, 0.0),
            &Vector::new(-1.0, 0.0),
            0.0,
            &b,
            &Isometry::translation(2.0, 0.0),
            &Vector::new(1.0, 0.0),
            0.0,
            30,
            1.0e-4,
        );

        assert!(toi.is_none());
    }

    #[test]
    fn rotation_term_bounds_the_advance() {
        // A spinning bar whose tip reaches a nearby circle: the rotational
        // bound must not step past the impact.
        let gjk = Gjk::default();
        let bar = Shape::Polygon(Polygon::rectangle(1.0, 0.05));
        let ball = Shape::Circle(Circle::new(0.1));

        let toi = time_of_impact(
            &gjk,
            &bar,
            &Isometry::identity(),
            &Vector::zeros(),
            std::f32::consts::FRAC_PI_2,
            &ball,
            &Isometry::translation(0.0, 1.0),
            &Vector::zeros(),
            0.0,
            60,
            1.0e-3,
        );

        // The bar tip sweeps up towards the ball and must hit before the
        // quarter turn completes.
        let toi = toi.expect("the bar tip reaches the ball");
        assert!(toi > 0.0 && toi < 1.0);

        // At the reported time the shapes are within tolerance.
        let pos1 = Isometry::identity().lerp_towards(
            &Vector::zeros(),
            std::f32::consts::FRAC_PI_2,
            toi,
        );
        let sep = gjk.distance(&bar, &pos1, &ball, &Isometry::translation(0.0, 1.0));
        match sep {
            None => {}
            Some(sep) => assert!(sep.distance <= 1.0e-3 + 1.0e-4),
        }
    }

    #[test]
    #[should_panic]
    fn iteration_floor_is_enforced() {
        let gjk = Gjk::default();
        let a = Shape::Circle(Circle::new(0.5));
        let _ = time_of_impact(
            &gjk,
            &a,
            &Isometry::identity(),
            &Vector::zeros(),
            0.0,
            &a,
            &Isometry::translation(5.0, 0.0),
            &Vector::zeros(),
            0.0,
            2,
            1.0e-4,
        );
    }
}
