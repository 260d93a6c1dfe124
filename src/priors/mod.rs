//! Torch prior distributions
//!
//! These types are all capable of representing a batch of distributions, with arbitrary batch
//! shape. The return values of statistics methods are tensors with the same batch shape.
mod constraints;
mod normal;
mod smoothed_box;

pub use constraints::Constraint;
pub use normal::Normal;
pub use smoothed_box::{SmoothedBoxConfig, SmoothedBoxPrior};

use crate::utils::shape::{broadcast_shapes, to_torch_shape};
use crate::PriorError;
use ndarray::ArrayD;
use tch::{Kind, Tensor};

/// A named distribution parameter together with its constraint.
#[derive(Debug)]
pub struct ArgConstraint<'a> {
    pub name: &'static str,
    pub constraint: Constraint,
    pub value: &'a Tensor,
}

/// A (batch of) prior distribution(s) over real tensors.
pub trait Prior {
    /// The batch shape of distributions.
    fn batch_shape(&self) -> Vec<usize>;

    /// The shape of a single sample (the event).
    fn event_shape(&self) -> Vec<usize>;

    /// Set of values on which the density is nonzero.
    fn support(&self) -> Constraint;

    /// Constraints on the distribution parameters.
    fn arg_constraints(&self) -> Vec<ArgConstraint>;

    /// Whether arguments and `log_prob` values are validated.
    fn validate_args(&self) -> bool;

    /// Log densities of the given values.
    ///
    /// # Args
    /// * `value` - An array with shape `[..., BATCH_SHAPE..., EVENT_SHAPE...]` where the
    ///             leading dimensions are broadcast against the batch shape.
    ///
    /// # Returns
    /// An array of log densities with the broadcast batch shape.
    ///
    /// # Errors
    /// If validation is enabled and `value` has an incompatible shape or lies outside the
    /// support.
    fn f_log_prob(&self, value: &Tensor) -> Result<Tensor, PriorError>;

    /// Log densities of the given values.
    ///
    /// # Panics
    /// If validation is enabled and `value` is rejected. See [`Prior::f_log_prob`].
    fn log_prob(&self, value: &Tensor) -> Tensor {
        self.f_log_prob(value).unwrap()
    }

    /// Sample without gradient tracking.
    ///
    /// # Returns
    /// An array of shape `[SAMPLE_SHAPE..., BATCH_SHAPE..., EVENT_SHAPE...]`.
    fn sample(&self, sample_shape: &[i64]) -> Tensor;

    /// Distribution entropies.
    ///
    /// # Returns
    /// An array of entropies with shape `[BATCH_SHAPE...]`.
    fn entropy(&self) -> Tensor;

    /// Check every parameter against its constraint.
    ///
    /// # Errors
    /// [`PriorError::InvalidArgument`] naming the first parameter that violates its constraint.
    fn check_args(&self) -> Result<(), PriorError> {
        for arg in self.arg_constraints() {
            if !arg.constraint.is_satisfied(arg.value) {
                return Err(PriorError::InvalidArgument(format!(
                    "parameter `{}` must be {}",
                    arg.name, arg.constraint
                )));
            }
        }
        Ok(())
    }

    /// Check that `value` is a valid argument to `log_prob`.
    ///
    /// # Errors
    /// If the trailing dimensions differ from the event shape, the leading dimensions do not
    /// broadcast with the batch shape, or some element lies outside the support.
    fn check_value(&self, value: &Tensor) -> Result<(), PriorError> {
        let value_shape = value.size();
        let batch = self.batch_shape();
        let event = self.event_shape();
        let shape_error = || PriorError::ValueShape {
            value: value_shape.clone(),
            batch: batch.clone(),
            event: event.clone(),
        };

        let split = value_shape
            .len()
            .checked_sub(event.len())
            .ok_or_else(shape_error)?;
        let (value_batch, value_event) = value_shape.split_at(split);
        if value_event != to_torch_shape(&event).as_slice() {
            return Err(shape_error());
        }
        broadcast_shapes(value_batch, &to_torch_shape(&batch)).ok_or_else(shape_error)?;

        let support = self.support();
        if !support.is_satisfied(value) {
            return Err(PriorError::InvalidArgument(format!(
                "value must lie in the support ({support})"
            )));
        }
        Ok(())
    }
}

/// A distribution parameter given as a scalar, an array, or a tensor.
#[derive(Debug)]
pub enum PriorParam {
    Scalar(f64),
    Tensor(Tensor),
}

impl PriorParam {
    /// Convert into a tensor. Scalars become 0-dimensional `Double` tensors.
    #[must_use]
    pub fn into_tensor(self) -> Tensor {
        match self {
            Self::Scalar(x) => Tensor::from(x),
            Self::Tensor(t) => t,
        }
    }
}

impl From<f64> for PriorParam {
    fn from(x: f64) -> Self {
        Self::Scalar(x)
    }
}

impl From<Tensor> for PriorParam {
    fn from(t: Tensor) -> Self {
        Self::Tensor(t)
    }
}

impl From<&Tensor> for PriorParam {
    fn from(t: &Tensor) -> Self {
        Self::Tensor(t.shallow_clone())
    }
}

impl From<&[f64]> for PriorParam {
    fn from(values: &[f64]) -> Self {
        Self::Tensor(Tensor::of_slice(values))
    }
}

impl<const N: usize> From<[f64; N]> for PriorParam {
    fn from(values: [f64; N]) -> Self {
        Self::Tensor(Tensor::of_slice(&values))
    }
}

impl From<Vec<f64>> for PriorParam {
    fn from(values: Vec<f64>) -> Self {
        Self::from(values.as_slice())
    }
}

impl From<&ArrayD<f64>> for PriorParam {
    fn from(array: &ArrayD<f64>) -> Self {
        let shape = to_torch_shape(array.shape());
        let values: Vec<f64> = array.iter().copied().collect();
        Self::Tensor(Tensor::of_slice(&values).reshape(&shape))
    }
}

/// The floating point kind shared by a set of parameters.
///
/// 0-dimensional tensors do not participate (like scalars in torch type promotion).
/// `Double` if any participating tensor is `Double` or none is floating point, else `Float`.
fn common_float_kind(params: &[&Tensor]) -> Kind {
    let mut kinds = params
        .iter()
        .filter(|t| t.dim() > 0)
        .map(|t| t.kind())
        .filter(|k| matches!(k, Kind::Float | Kind::Double));
    match kinds.next() {
        Some(Kind::Float) if kinds.all(|k| k == Kind::Float) => Kind::Float,
        _ => Kind::Double,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn scalar_param_is_0d_double() {
        let t = PriorParam::from(2.5).into_tensor();
        assert_eq!(t.dim(), 0);
        assert_eq!(t.kind(), Kind::Double);
    }

    #[test]
    fn ndarray_param_keeps_shape() {
        let array = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn();
        let t = PriorParam::from(&array).into_tensor();
        assert_eq!(t.size(), [2, 3]);
        assert_eq!(
            t,
            Tensor::of_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).reshape(&[2, 3])
        );
    }

    #[test]
    fn common_kind_float() {
        let a = Tensor::of_slice::<f32>(&[0.0, 1.0]);
        let s = Tensor::from(0.5);
        assert_eq!(common_float_kind(&[&a, &s]), Kind::Float);
    }

    #[test]
    fn common_kind_mixed_is_double() {
        let a = Tensor::of_slice::<f32>(&[0.0]);
        let b = Tensor::of_slice::<f64>(&[1.0]);
        assert_eq!(common_float_kind(&[&a, &b]), Kind::Double);
    }

    #[test]
    fn common_kind_integer_is_double() {
        let a = Tensor::of_slice(&[0_i64, 1]);
        assert_eq!(common_float_kind(&[&a]), Kind::Double);
    }
}
