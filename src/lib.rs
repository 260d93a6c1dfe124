//! Smoothed box priors for gradient-based inference with torch.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
mod error;
pub mod priors;
pub mod utils;

pub use error::PriorError;
pub use priors::{Constraint, Normal, Prior, PriorParam, SmoothedBoxConfig, SmoothedBoxPrior};
