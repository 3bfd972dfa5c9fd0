//! Parameters controlling the time-stepping and the solver behavior.

use crate::geometry::{
    DEFAULT_EPA_DISTANCE_EPSILON, DEFAULT_EPA_MAX_ITERATIONS, DEFAULT_GJK_DISTANCE_EPSILON,
    DEFAULT_GJK_MAX_ITERATIONS, MIN_EPA_ITERATIONS,
};
use crate::math::Real;

/// The smallest accepted conservative-advancement iteration cap.
pub const MIN_CCD_ITERATIONS: usize = 5;

/// Parameters for a time-step of the physics engine.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// The timestep length (default: `1.0 / 60.0`).
    pub dt: Real,
    /// The number of velocity-constraint iterations per island
    /// (default: `10`).
    pub max_velocity_iterations: usize,
    /// The number of position-correction iterations per island
    /// (default: `3`).
    pub max_position_iterations: usize,
    /// The position-correction factor in `(0, 1]` applied at each position
    /// iteration. Values above `0.2` are known to make the correction
    /// oscillate (default: `0.2`).
    pub baumgarte: Real,
    /// The penetration depth the solver tolerates instead of correcting
    /// (default: `0.005`).
    pub allowed_linear_error: Real,
    /// The angular drift joints tolerate before correcting
    /// (default: 2 degrees).
    pub allowed_angular_error: Real,
    /// The maximum penetration correction applied in one position iteration
    /// (default: `0.2`).
    pub max_linear_correction: Real,
    /// The cap on the distance a body can travel in one step; larger
    /// transient velocities are clamped (default: `2.0`).
    pub max_translation: Real,
    /// The cap on the rotation of a body in one step, in radians
    /// (default: `0.5 * pi`).
    pub max_rotation: Real,
    /// A dynamic body whose linear velocity stays below this threshold
    /// accumulates idle time towards sleep (default: `0.01`).
    pub sleep_linear_velocity: Real,
    /// A dynamic body whose angular velocity stays below this threshold
    /// accumulates idle time towards sleep (default: 2 degrees/second).
    pub sleep_angular_velocity: Real,
    /// The idle time after which a body can be put to rest
    /// (default: `0.5`).
    pub sleep_time: Real,
    /// Islands smaller than this are merged during extraction
    /// (default: `128`).
    pub min_island_size: usize,
    /// The maximum number of iterations of the GJK algorithms
    /// (default: `30`).
    pub gjk_max_iterations: usize,
    /// The convergence threshold of the GJK algorithms.
    pub gjk_distance_epsilon: Real,
    /// The maximum number of EPA expansions, at least
    /// [`MIN_EPA_ITERATIONS`](crate::geometry::MIN_EPA_ITERATIONS)
    /// (default: `100`).
    pub epa_max_iterations: usize,
    /// The convergence threshold of the EPA expansion.
    pub epa_distance_epsilon: Real,
    /// The maximum number of conservative-advancement iterations, at least
    /// [`MIN_CCD_ITERATIONS`] (default: `30`).
    pub ccd_max_iterations: usize,
    /// The separation below which conservative advancement reports a
    /// time of impact.
    pub ccd_distance_epsilon: Real,
    /// The maximum number of time-of-impact resolution substeps per step
    /// (default: `4`).
    pub max_ccd_substeps: usize,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            max_velocity_iterations: 10,
            max_position_iterations: 3,
            baumgarte: 0.2,
            allowed_linear_error: 0.005,
            allowed_angular_error: 2.0_f32.to_radians(),
            max_linear_correction: 0.2,
            max_translation: 2.0,
            max_rotation: std::f32::consts::FRAC_PI_2,
            sleep_linear_velocity: 0.01,
            sleep_angular_velocity: 2.0_f32.to_radians(),
            sleep_time: 0.5,
            min_island_size: 128,
            gjk_max_iterations: DEFAULT_GJK_MAX_ITERATIONS,
            gjk_distance_epsilon: DEFAULT_GJK_DISTANCE_EPSILON,
            epa_max_iterations: DEFAULT_EPA_MAX_ITERATIONS,
            epa_distance_epsilon: DEFAULT_EPA_DISTANCE_EPSILON,
            ccd_max_iterations: 30,
            ccd_distance_epsilon: 1.0e-4,
            max_ccd_substeps: 4,
        }
    }
}

impl IntegrationParameters {
    /// The inverse of the timestep length, or zero if the timestep is zero.
    #[inline]
    pub fn inv_dt(&self) -> Real {
        if self.dt == 0.0 {
            0.0
        } else {
            1.0 / self.dt
        }
    }

    /// Checks every precondition on these parameters.
    ///
    /// Invalid configuration is a programmer error: this panics with a
    /// message naming the offending knob.
    pub fn validate(&self) {
        assert!(self.dt > 0.0, "The timestep must be positive.");
        assert!(
            self.max_velocity_iterations > 0,
            "The number of velocity iterations must be positive."
        );
        assert!(
            self.max_position_iterations > 0,
            "The number of position iterations must be positive."
        );
        assert!(
            self.baumgarte > 0.0 && self.baumgarte <= 1.0,
            "The baumgarte factor must be in (0, 1]."
        );
        assert!(
            self.allowed_linear_error > 0.0,
            "The linear tolerance must be positive."
        );
        assert!(
            self.allowed_angular_error > 0.0,
            "The angular tolerance must be positive."
        );
        assert!(
            self.max_linear_correction > 0.0,
            "The maximum linear correction must be positive."
        );
        assert!(
            self.max_translation > 0.0,
            "The maximum translation must be positive."
        );
        assert!(
            self.max_rotation > 0.0,
            "The maximum rotation must be positive."
        );
        assert!(
            self.sleep_linear_velocity >= 0.0,
            "The sleep linear velocity must be non-negative."
        );
        assert!(
            self.sleep_angular_velocity >= 0.0,
            "The sleep angular velocity must be non-negative."
        );
        assert!(self.sleep_time > 0.0, "The sleep time must be positive.");
        assert!(
            self.min_island_size > 0,
            "The minimum island size must be at least 1."
        );
        assert!(
            self.gjk_max_iterations > 0,
            "The GJK maximum number of iterations must be positive."
        );
        assert!(
            self.gjk_distance_epsilon > 0.0,
            "The GJK distance epsilon must be positive."
        );
        assert!(
            self.epa_max_iterations >= MIN_EPA_ITERATIONS,
            "The EPA maximum number of iterations must be at least {}.",
            MIN_EPA_ITERATIONS
        );
        assert!(
            self.epa_distance_epsilon > 0.0,
            "The EPA distance epsilon must be positive."
        );
        assert!(
            self.ccd_max_iterations >= MIN_CCD_ITERATIONS,
            "The CCD maximum number of iterations must be at least {}.",
            MIN_CCD_ITERATIONS
        );
        assert!(
            self.ccd_distance_epsilon > 0.0,
            "The CCD distance epsilon must be positive."
        );
        assert!(
            self.max_ccd_substeps > 0,
            "The maximum number of CCD substeps must be positive."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        IntegrationParameters::default().validate();
    }

    #[test]
    #[should_panic]
    fn ccd_iteration_floor_is_enforced() {
        let params = IntegrationParameters {
            ccd_max_iterations: 2,
            ..Default::default()
        };
        params.validate();
    }

    #[test]
    #[should_panic]
    fn negative_tolerance_is_rejected() {
        let params = IntegrationParameters {
            allowed_linear_error: -1.0,
            ..Default::default()
        };
        params.validate();
    }
}
