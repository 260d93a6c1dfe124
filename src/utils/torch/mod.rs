//! Utilities for working with tch [`Tensor`].

mod serialize;

pub use serialize::{BufferDef, ByteOrder, FloatKind};
