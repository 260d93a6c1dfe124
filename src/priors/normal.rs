//! Normal distribution
use super::{ArgConstraint, Constraint, Prior};
use crate::utils::shape::{broadcast_shapes, to_usize_shape};
use crate::PriorError;
use tch::Tensor;

/// Natural log of `sqrt(2π)`.
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Normal distribution(s) with scalar events.
#[derive(Debug)]
pub struct Normal {
    /// Mean. A float tensor of shape `[BATCH_SHAPE...]`.
    loc: Tensor,
    /// Standard deviation. A float tensor of shape `[BATCH_SHAPE...]`.
    scale: Tensor,
    validate_args: bool,
}

impl Normal {
    /// Initialize from a mean and standard deviation without validation.
    ///
    /// # Errors
    /// If `loc` and `scale` cannot be broadcast together.
    pub fn new(loc: &Tensor, scale: &Tensor) -> Result<Self, PriorError> {
        let (loc_shape, scale_shape) = (loc.size(), scale.size());
        let shape = broadcast_shapes(&loc_shape, &scale_shape).ok_or(PriorError::Broadcast {
            shapes: vec![loc_shape, scale_shape],
        })?;
        Ok(Self {
            loc: loc.f_expand(&shape, false)?,
            scale: scale.f_expand(&shape, false)?,
            validate_args: false,
        })
    }

    /// Enable argument validation and check the current arguments.
    ///
    /// # Errors
    /// If `scale` is not strictly positive.
    pub fn validated(mut self) -> Result<Self, PriorError> {
        self.validate_args = true;
        self.check_args()?;
        Ok(self)
    }

    /// Mean.
    pub const fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Standard deviation.
    pub const fn scale(&self) -> &Tensor {
        &self.scale
    }
}

impl Prior for Normal {
    fn batch_shape(&self) -> Vec<usize> {
        to_usize_shape(&self.loc.size())
    }

    fn event_shape(&self) -> Vec<usize> {
        Vec::new()
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<ArgConstraint> {
        vec![
            ArgConstraint {
                name: "loc",
                constraint: Constraint::Real,
                value: &self.loc,
            },
            ArgConstraint {
                name: "scale",
                constraint: Constraint::Positive,
                value: &self.scale,
            },
        ]
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    /// `log p(x) = -0.5 * ((x-loc)/scale)^2 - ln(scale) - ln(sqrt(2π))`
    fn f_log_prob(&self, value: &Tensor) -> Result<Tensor, PriorError> {
        if self.validate_args {
            self.check_value(value)?;
        }
        let z = value.f_sub(&self.loc)?.f_div(&self.scale)?;
        Ok((z.f_square()? * -0.5).f_sub(&self.scale.f_log()?)? - LN_SQRT_2PI)
    }

    fn sample(&self, sample_shape: &[i64]) -> Tensor {
        let mut shape = sample_shape.to_vec();
        shape.extend(self.loc.size());
        tch::no_grad(|| {
            Tensor::randn(&shape, (self.loc.kind(), self.loc.device())) * &self.scale + &self.loc
        })
    }

    fn entropy(&self) -> Tensor {
        self.scale.log() + (0.5 + LN_SQRT_2PI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::{kind::FLOAT_CPU, Kind};

    fn standard() -> Normal {
        Normal::new(&Tensor::from(0.0), &Tensor::from(1.0)).unwrap()
    }

    #[test]
    fn log_prob_standard_at_zero() {
        let lp = f64::from(standard().log_prob(&Tensor::from(0.0)));
        assert!((lp + LN_SQRT_2PI).abs() < 1e-12);
    }

    #[rstest]
    #[case(0.0, 1.0, 0.3)]
    #[case(1.5, 0.01, 1.52)]
    #[case(-2.0, 3.0, 10.0)]
    fn log_prob_matches_closed_form(#[case] loc: f64, #[case] scale: f64, #[case] x: f64) {
        let d = Normal::new(&Tensor::from(loc), &Tensor::from(scale)).unwrap();
        let lp = f64::from(d.log_prob(&Tensor::from(x)));
        let z = (x - loc) / scale;
        let expected = -0.5 * z * z - scale.ln() - LN_SQRT_2PI;
        assert!((lp - expected).abs() < 1e-9, "{lp} vs {expected}");
    }

    #[test]
    fn log_prob_symmetric() {
        let d = Normal::new(&Tensor::from(0.0), &Tensor::from(2.0)).unwrap();
        let lp1 = f64::from(d.log_prob(&Tensor::from(1.3)));
        let lp2 = f64::from(d.log_prob(&Tensor::from(-1.3)));
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn batch_shape_broadcast() {
        let d = Normal::new(
            &Tensor::zeros(&[2, 1], FLOAT_CPU),
            &Tensor::ones(&[3], FLOAT_CPU),
        )
        .unwrap();
        assert_eq!(d.batch_shape(), [2, 3]);
        assert_eq!(d.event_shape(), [] as [usize; 0]);
    }

    #[test]
    fn incompatible_shapes() {
        let result = Normal::new(&Tensor::zeros(&[2], FLOAT_CPU), &Tensor::ones(&[3], FLOAT_CPU));
        assert!(matches!(result, Err(PriorError::Broadcast { .. })));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    fn validated_rejects_nonpositive_scale(#[case] scale: f64) {
        let result = Normal::new(&Tensor::from(0.0), &Tensor::from(scale))
            .unwrap()
            .validated();
        assert!(matches!(result, Err(PriorError::InvalidArgument(_))));
    }

    #[test]
    fn unvalidated_accepts_nonpositive_scale() {
        assert!(Normal::new(&Tensor::from(0.0), &Tensor::from(-1.0)).is_ok());
    }

    #[test]
    fn validated_log_prob_rejects_nan() {
        let d = standard().validated().unwrap();
        assert!(d.f_log_prob(&Tensor::from(f64::NAN)).is_err());
        assert!(d.f_log_prob(&Tensor::from(0.5)).is_ok());
    }

    #[test]
    fn unvalidated_log_prob_incompatible_shape_is_err() {
        let d =
            Normal::new(&Tensor::zeros(&[2], FLOAT_CPU), &Tensor::ones(&[2], FLOAT_CPU)).unwrap();
        let result = d.f_log_prob(&Tensor::zeros(&[3], FLOAT_CPU));
        assert!(matches!(result, Err(PriorError::Torch(_))), "{result:?}");
    }

    #[test]
    fn entropy_standard() {
        let h = f64::from(standard().entropy());
        assert!((h - (0.5 + LN_SQRT_2PI)).abs() < 1e-12);
    }

    #[test]
    fn sample_shape_and_moments() {
        tch::manual_seed(1);
        let d =
            Normal::new(&Tensor::of_slice(&[-3.0, 5.0]), &Tensor::of_slice(&[0.5, 2.0])).unwrap();
        let samples = d.sample(&[20_000]);
        assert_eq!(samples.size(), [20_000, 2]);
        assert!(!samples.requires_grad());

        let means: Vec<f64> = samples.mean_dim(&[0], false, Kind::Double).into();
        assert!((means[0] + 3.0).abs() < 0.05, "{means:?}");
        assert!((means[1] - 5.0).abs() < 0.1, "{means:?}");
    }
}
