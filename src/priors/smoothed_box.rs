//! Smoothed box prior
use super::{common_float_kind, ArgConstraint, Constraint, Normal, Prior, PriorParam};
use crate::utils::shape::{broadcast_all_shapes, broadcast_shapes, to_usize_shape};
use crate::utils::torch::BufferDef;
use crate::PriorError;
use log::{debug, trace};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::serde_as;
use tch::{Kind, Tensor};

/// `sqrt(2π)`
const SQRT_2PI: f64 = 2.506_628_274_631_000_7;

/// A smoothed approximation of a uniform prior over a box.
///
/// Has full support on the reals and is differentiable everywhere.
/// With `B = {x : a_i <= x_i <= b_i}` and the per-coordinate distance to the box
/// `d_i(x) = max(0, |x_i - c_i| - r_i)`,
///
/// ```text
/// log p(x) = sum_i [ log N(d_i(x); 0, sigma_i) - M_i ]
/// M_i      = ln(1 + (b_i - a_i) / (sqrt(2π) sigma_i))
/// ```
///
/// where `c` is the box center and `r` the box half-width.
/// The density is flat inside the box and decays like a Gaussian outside it.
#[derive(Debug)]
pub struct SmoothedBoxPrior {
    /// Lower bounds. A float tensor of shape `[BATCH_SHAPE..., EVENT_SIZE]`.
    a: Tensor,
    /// Upper bounds. Same shape as `a`, `a < b` element-wise.
    b: Tensor,
    /// Tail spread. Same shape as `a`.
    sigma: Tensor,
    /// Zero-mean normal tails with scale `sigma`.
    tails: Normal,
    log_transform: bool,
    validate_args: bool,
}

impl SmoothedBoxPrior {
    /// Create a smoothed box prior with argument validation disabled.
    ///
    /// A 0-dimensional lower bound `a` is treated as a length-1 vector.
    /// `a`, `b` and `sigma` are broadcast to a common shape; the last dimension is the event.
    ///
    /// # Args
    /// * `a` - Lower box bounds.
    /// * `b` - Upper box bounds.
    /// * `sigma` - Spread of the Gaussian tails outside the box.
    /// * `log_transform` - Evaluate `log_prob(x)` at `exp(x)`.
    ///
    /// # Errors
    /// [`PriorError::Broadcast`] if the parameters do not broadcast together and
    /// [`PriorError::InvalidArgument`] unless `a < b` element-wise.
    pub fn new<A, B, S>(a: A, b: B, sigma: S, log_transform: bool) -> Result<Self, PriorError>
    where
        A: Into<PriorParam>,
        B: Into<PriorParam>,
        S: Into<PriorParam>,
    {
        let a = a.into().into_tensor();
        let a = if a.dim() < 1 { a.reshape(&[-1]) } else { a };
        let b = b.into().into_tensor();
        let sigma = sigma.into().into_tensor();

        let kind = common_float_kind(&[&a, &b, &sigma]);
        let shapes = [a.size(), b.size(), sigma.size()];
        let shape = broadcast_all_shapes(&shapes).ok_or_else(|| PriorError::Broadcast {
            shapes: shapes.to_vec(),
        })?;
        let device = a.device();
        let broadcast = |t: &Tensor| -> Result<Tensor, PriorError> {
            Ok(t.to_kind(kind)
                .to_device(device)
                .f_expand(&shape, false)?
                .contiguous())
        };
        let (a, b, sigma) = (broadcast(&a)?, broadcast(&b)?, broadcast(&sigma)?);

        check_ordered(&a, &b)?;
        let prior = Self::from_parts(a, b, sigma, log_transform, false)?;
        debug!(
            "smoothed box prior: batch shape {:?}, event shape {:?}, {:?}",
            prior.batch_shape(),
            prior.event_shape(),
            kind
        );
        Ok(prior)
    }

    /// Enable argument validation and check the current arguments.
    ///
    /// With validation enabled, [`Prior::f_log_prob`] also checks its input.
    ///
    /// # Errors
    /// [`PriorError::InvalidArgument`] if `sigma` is not strictly positive.
    pub fn validated(mut self) -> Result<Self, PriorError> {
        self.validate_args = true;
        self.check_args()?;
        Ok(self)
    }

    /// Assemble from already broadcast and ordered buffers.
    fn from_parts(
        a: Tensor,
        b: Tensor,
        sigma: Tensor,
        log_transform: bool,
        validate_args: bool,
    ) -> Result<Self, PriorError> {
        let tails = Normal::new(&sigma.zeros_like(), &sigma)?;
        Ok(Self {
            a,
            b,
            sigma,
            tails,
            log_transform,
            validate_args,
        })
    }

    /// Lower box bounds, shape `[BATCH_SHAPE..., EVENT_SIZE]`.
    pub const fn a(&self) -> &Tensor {
        &self.a
    }

    /// Upper box bounds.
    pub const fn b(&self) -> &Tensor {
        &self.b
    }

    /// Spread of the Gaussian tails.
    pub const fn sigma(&self) -> &Tensor {
        &self.sigma
    }

    /// Whether `log_prob(x)` is evaluated at `exp(x)`.
    pub const fn log_transform(&self) -> bool {
        self.log_transform
    }

    // Not cached: every evaluation builds its own autograd graph through the buffers.

    /// Box center `(a + b) / 2`.
    pub fn center(&self) -> Tensor {
        (&self.a + &self.b) / 2.0
    }

    /// Box half-width `(b - a) / 2`.
    pub fn half_width(&self) -> Tensor {
        (&self.b - &self.a) / 2.0
    }

    /// Per-coordinate log normalizing constant `ln(1 + (b - a) / (sqrt(2π) sigma))`.
    pub fn log_normalizer(&self) -> Tensor {
        ((&self.b - &self.a) / (&self.sigma * SQRT_2PI)).log1p()
    }

    /// A copy of this prior with buffers broadcast to a new batch shape.
    ///
    /// # Errors
    /// If the current batch shape does not broadcast to `batch_shape`.
    pub fn expand(&self, batch_shape: &[i64]) -> Result<Self, PriorError> {
        let current = self.a.size();
        let mut shape = batch_shape.to_vec();
        shape.extend(current.last());
        if broadcast_shapes(&shape, &current).as_ref() != Some(&shape) {
            return Err(PriorError::Broadcast {
                shapes: vec![current, shape],
            });
        }
        trace!("expanding smoothed box prior from {:?} to {:?}", current, shape);
        Self::from_parts(
            self.a.f_expand(&shape, false)?,
            self.b.f_expand(&shape, false)?,
            self.sigma.f_expand(&shape, false)?,
            self.log_transform,
            self.validate_args,
        )
    }

    /// Log density of values in the box's own space.
    ///
    /// # Errors
    /// If `x` does not broadcast against the buffers.
    fn box_log_prob(&self, x: &Tensor) -> Result<Tensor, PriorError> {
        let distance = x
            .f_sub(&self.center())?
            .f_abs()?
            .f_sub(&self.half_width())?
            .f_clamp_min(0.0)?;
        let kind = distance.kind();
        Ok(self
            .tails
            .f_log_prob(&distance)?
            .f_sub(&self.log_normalizer())?
            .f_sum_dim_intlist(&[-1], false, kind)?)
    }
}

/// Check `a < b` element-wise (NaN bounds fail).
fn check_ordered(a: &Tensor, b: &Tensor) -> Result<(), PriorError> {
    let unordered = (b - a).greater(0.0).logical_not();
    if !bool::from(unordered.any()) {
        return Ok(());
    }
    let flags: Vec<bool> = unordered.flatten(0, -1).into();
    let index = flags.iter().position(|&f| f).unwrap_or_default();
    let a_values: Vec<f64> = a.to_kind(Kind::Double).flatten(0, -1).into();
    let b_values: Vec<f64> = b.to_kind(Kind::Double).flatten(0, -1).into();
    Err(PriorError::InvalidArgument(format!(
        "must have a < b element-wise; at flat index {} a = {} and b = {}",
        index, a_values[index], b_values[index]
    )))
}

impl Prior for SmoothedBoxPrior {
    fn batch_shape(&self) -> Vec<usize> {
        let shape = self.a.size();
        to_usize_shape(&shape[..shape.len() - 1])
    }

    fn event_shape(&self) -> Vec<usize> {
        to_usize_shape(&self.a.size()[self.a.dim() - 1..])
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<ArgConstraint> {
        vec![
            ArgConstraint {
                name: "sigma",
                constraint: Constraint::Positive,
                value: &self.sigma,
            },
            ArgConstraint {
                name: "a",
                constraint: Constraint::Real,
                value: &self.a,
            },
            ArgConstraint {
                name: "b",
                constraint: Constraint::Real,
                value: &self.b,
            },
        ]
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn f_log_prob(&self, value: &Tensor) -> Result<Tensor, PriorError> {
        if self.validate_args {
            self.check_value(value)?;
        }
        if self.log_transform {
            self.box_log_prob(&value.f_exp()?)
        } else {
            self.box_log_prob(value)
        }
    }

    /// Exact samples from the smoothed box density.
    ///
    /// Each coordinate lands uniformly in the box with probability
    /// `(b - a) / ((b - a) + sqrt(2π) sigma)` and otherwise in one of the two half-normal
    /// tails. Samples are in the box's own space even if `log_transform` is set.
    fn sample(&self, sample_shape: &[i64]) -> Tensor {
        let mut shape = sample_shape.to_vec();
        shape.extend(self.a.size());
        let kind = self.a.kind();
        let options = (kind, self.a.device());
        tch::no_grad(|| {
            let width = &self.b - &self.a;
            let tail_mass = &self.sigma * SQRT_2PI;
            let box_prob = &width / (&width + &tail_mass);
            let in_box = (box_prob - Tensor::rand(&shape, options))
                .greater(0.0)
                .to_kind(kind);

            let uniform = &self.a + &width * Tensor::rand(&shape, options);
            let offset = Tensor::randn(&shape, options) * &self.sigma;
            let above = offset.greater(0.0).to_kind(kind);
            let tail = &self.a + &offset + above * &width;

            &tail + in_box * (uniform - &tail)
        })
    }

    /// `sum_i [ln Z_i + sqrt(2π) sigma_i / (2 Z_i)]` with `Z_i = (b_i - a_i) + sqrt(2π) sigma_i`.
    fn entropy(&self) -> Tensor {
        let tail_mass = &self.sigma * SQRT_2PI;
        let z = &self.b - &self.a + &tail_mass;
        (z.log() + tail_mass / (&z * 2.0)).sum_dim_intlist(&[-1], false, self.a.kind())
    }
}

/// Configuration for [`SmoothedBoxPrior`] with a scalar tail spread.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothedBoxConfig {
    /// Spread of the Gaussian tails outside the box.
    pub sigma: f64,
    /// Evaluate `log_prob(x)` at `exp(x)`.
    pub log_transform: bool,
    /// Validate parameters on construction and values in `log_prob`.
    pub validate_args: bool,
}

impl Default for SmoothedBoxConfig {
    fn default() -> Self {
        Self {
            sigma: 0.01,
            log_transform: false,
            validate_args: false,
        }
    }
}

impl SmoothedBoxConfig {
    /// Build a prior over the box `[a, b]`.
    ///
    /// # Errors
    /// See [`SmoothedBoxPrior::new`] and [`SmoothedBoxPrior::validated`].
    pub fn build_prior<A, B>(&self, a: A, b: B) -> Result<SmoothedBoxPrior, PriorError>
    where
        A: Into<PriorParam>,
        B: Into<PriorParam>,
    {
        let prior = SmoothedBoxPrior::new(a, b, self.sigma, self.log_transform)?;
        if self.validate_args {
            prior.validated()
        } else {
            Ok(prior)
        }
    }
}

/// Persistent state of a [`SmoothedBoxPrior`].
#[serde_as]
#[derive(Serialize, Deserialize)]
struct SmoothedBoxState {
    #[serde_as(as = "BufferDef")]
    a: Tensor,
    #[serde_as(as = "BufferDef")]
    b: Tensor,
    #[serde_as(as = "BufferDef")]
    sigma: Tensor,
    log_transform: bool,
    validate_args: bool,
}

impl From<&SmoothedBoxPrior> for SmoothedBoxState {
    fn from(prior: &SmoothedBoxPrior) -> Self {
        Self {
            a: prior.a.shallow_clone(),
            b: prior.b.shallow_clone(),
            sigma: prior.sigma.shallow_clone(),
            log_transform: prior.log_transform,
            validate_args: prior.validate_args,
        }
    }
}

/// Restoring from state re-runs construction checks.
impl TryFrom<SmoothedBoxState> for SmoothedBoxPrior {
    type Error = PriorError;

    fn try_from(state: SmoothedBoxState) -> Result<Self, Self::Error> {
        let prior = Self::new(state.a, state.b, state.sigma, state.log_transform)?;
        if state.validate_args {
            prior.validated()
        } else {
            Ok(prior)
        }
    }
}

impl Serialize for SmoothedBoxPrior {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SmoothedBoxState::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SmoothedBoxPrior {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let state = SmoothedBoxState::deserialize(deserializer)?;
        Self::try_from(state).map_err(de::Error::custom)
    }
}
