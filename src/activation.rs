//! Activation functions for forward evaluation.
//!
//! Input nodes squash raw sensor magnitudes with a logistic sigmoid. Hidden and
//! output nodes use a hyperbolic tangent so that motor outputs land in `(-1, 1)`.

use serde::{Deserialize, Serialize};

use crate::gene::NodeRole;

/// Activation function types applied by runtime nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    Sigmoid,
    /// Hyperbolic tangent written in logistic form: f(x) = 2 / (1 + e^(-2x)) - 1
    Tanh,
}

impl Activation {
    /// The activation a node of the given role applies to its raw sum.
    #[inline]
    #[must_use]
    pub const fn for_role(role: NodeRole) -> Self {
        match role {
            NodeRole::Input => Self::Sigmoid,
            NodeRole::Hidden | NodeRole::Output => Self::Tanh,
        }
    }

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates. Infinite inputs saturate to the bounds of the range.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        if x.is_nan() {
            return f32::NAN;
        }

        match self {
            Self::Sigmoid => {
                // sigmoid(-88) already underflows to 0 in f32
                let clamped = x.clamp(-88.0, 88.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::Tanh => {
                // keeps e^(-2x) finite so the result is exactly ±1 at the extremes
                let clamped = x.clamp(-44.0, 44.0);
                2.0 / (1.0 + (-2.0 * clamped).exp()) - 1.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
        assert!(Activation::Sigmoid.apply(10.0) > 0.99);
        assert!(Activation::Sigmoid.apply(-10.0) < 0.01);
        assert!((Activation::Sigmoid.apply(f32::INFINITY) - 1.0).abs() < 1e-6);
        assert!(Activation::Sigmoid.apply(f32::NEG_INFINITY).abs() < 1e-6);
    }

    #[test]
    fn test_tanh_matches_std() {
        for x in [-3.0_f32, -1.0, -0.25, 0.0, 0.5, 1.0, 2.5] {
            assert!(
                (Activation::Tanh.apply(x) - x.tanh()).abs() < 1e-5,
                "tanh({x}) diverged from std"
            );
        }
    }

    #[test]
    fn test_tanh_zero_is_exact() {
        assert_eq!(Activation::Tanh.apply(0.0), 0.0);
    }

    #[test]
    fn test_tanh_saturates() {
        assert!((Activation::Tanh.apply(1e6) - 1.0).abs() < 1e-6);
        assert!((Activation::Tanh.apply(-1e6) + 1.0).abs() < 1e-6);
        assert!((Activation::Tanh.apply(f32::NEG_INFINITY) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(Activation::Sigmoid.apply(f32::NAN).is_nan());
        assert!(Activation::Tanh.apply(f32::NAN).is_nan());
    }

    #[test]
    fn test_for_role() {
        assert_eq!(Activation::for_role(NodeRole::Input), Activation::Sigmoid);
        assert_eq!(Activation::for_role(NodeRole::Hidden), Activation::Tanh);
        assert_eq!(Activation::for_role(NodeRole::Output), Activation::Tanh);
    }
}
