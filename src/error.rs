//! Error type
use tch::TchError;
use thiserror::Error;

/// Error constructing or evaluating a prior.
#[derive(Error, Debug)]
pub enum PriorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("shapes {shapes:?} cannot be broadcast together")]
    Broadcast { shapes: Vec<Vec<i64>> },
    #[error("value shape {value:?} incompatible with batch shape {batch:?} and event shape {event:?}")]
    ValueShape {
        value: Vec<i64>,
        batch: Vec<usize>,
        event: Vec<usize>,
    },
    #[error(transparent)]
    Torch(#[from] TchError),
}
