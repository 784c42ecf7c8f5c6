//! Untracked tensor operations.
//!
//! These are the forward kernels; [`crate::autodiff::ops`] wraps them
//! with graph recording.

mod activation;
mod elementwise;
mod reduce;

pub use activation::{relu, relu_mask, softmax};
pub use elementwise::{add, apply, apply_binary, apply_inplace, mul, scale};
pub use reduce::{dot, sum};
