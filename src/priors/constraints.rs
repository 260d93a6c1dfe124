//! Parameter and support constraints
use std::fmt;
use tch::Tensor;

/// A constraint on the values of a tensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Any real number (not NaN, infinities allowed).
    Real,
    /// Strictly greater than zero.
    Positive,
}

impl Constraint {
    /// Element-wise check.
    ///
    /// # Returns
    /// A boolean tensor with the same shape as `value`.
    #[must_use]
    pub fn check(self, value: &Tensor) -> Tensor {
        match self {
            Self::Real => value.isnan().logical_not(),
            Self::Positive => value.greater(0.0),
        }
    }

    /// Whether every element of `value` satisfies the constraint.
    #[must_use]
    pub fn is_satisfied(self, value: &Tensor) -> bool {
        bool::from(self.check(value).all())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Positive => write!(f, "positive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Constraint::Real, f64::NEG_INFINITY, true)]
    #[case(Constraint::Real, -1.0, true)]
    #[case(Constraint::Real, f64::NAN, false)]
    #[case(Constraint::Positive, 1e-12, true)]
    #[case(Constraint::Positive, 0.0, false)]
    #[case(Constraint::Positive, -0.5, false)]
    fn check_scalar(#[case] constraint: Constraint, #[case] x: f64, #[case] expected: bool) {
        assert_eq!(constraint.is_satisfied(&Tensor::from(x)), expected);
    }

    #[test]
    fn check_elementwise() {
        let x = Tensor::of_slice(&[-1.0, 0.0, 2.0]);
        let flags: Vec<bool> = Constraint::Positive.check(&x).into();
        assert_eq!(flags, [false, false, true]);
    }

    #[test]
    fn display() {
        assert_eq!(Constraint::Positive.to_string(), "positive");
        assert_eq!(Constraint::Real.to_string(), "real");
    }
}
