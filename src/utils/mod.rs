//! Utilities
pub mod shape;
pub mod torch;
