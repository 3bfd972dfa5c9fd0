//! Rules for combining the material coefficients of two colliders.

use crate::math::Real;

/// Rules used to combine two coefficients.
///
/// This is used to determine the effective restitution and friction
/// coefficients for a contact between two colliders.
///
/// Each collider has its own combination rule. The rule actually used for a
/// pair is `max(first_rule as usize, second_rule as usize)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum CoefficientCombineRule {
    /// The two coefficients are averaged.
    Average = 0,
    /// The geometric mean of the two coefficients. This is the default rule
    /// for friction.
    GeometricMean,
    /// The smallest coefficient is chosen.
    Min,
    /// The two coefficients are multiplied.
    Multiply,
    /// The greatest coefficient is chosen. This is the default rule for
    /// restitution.
    Max,
}

impl CoefficientCombineRule {
    pub(crate) fn combine(
        coeff1: Real,
        coeff2: Real,
        rule1: CoefficientCombineRule,
        rule2: CoefficientCombineRule,
    ) -> Real {
        match rule1.max(rule2) {
            CoefficientCombineRule::Average => (coeff1 + coeff2) / 2.0,
            CoefficientCombineRule::GeometricMean => (coeff1 * coeff2).sqrt(),
            CoefficientCombineRule::Min => coeff1.min(coeff2),
            CoefficientCombineRule::Multiply => coeff1 * coeff2,
            CoefficientCombineRule::Max => coeff1.max(coeff2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn the_greater_rule_wins() {
        let c = CoefficientCombineRule::combine(
            0.4,
            0.9,
            CoefficientCombineRule::Average,
            CoefficientCombineRule::Max,
        );
        assert_relative_eq!(c, 0.9);
    }

    #[test]
    fn geometric_mean_of_frictions() {
        let c = CoefficientCombineRule::combine(
            0.5,
            0.2,
            CoefficientCombineRule::GeometricMean,
            CoefficientCombineRule::GeometricMean,
        );
        assert_relative_eq!(c, (0.5_f32 * 0.2).sqrt());
    }
}
