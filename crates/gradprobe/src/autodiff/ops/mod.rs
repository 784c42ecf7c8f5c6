//! Tracked tensor operations with automatic differentiation.
//!
//! Each operation runs the untracked kernel from [`crate::operations`] and,
//! when any input requires grad, records a backward function in the graph.

mod add;
mod mul;
mod relu;
mod softmax;
mod sum;

pub use add::{AddBackward, tracked_add};
pub use mul::{MulBackward, tracked_mul};
pub use relu::{ReluBackward, tracked_relu};
pub use softmax::{SoftmaxBackward, tracked_softmax};
pub use sum::{SumBackward, tracked_sum};

use super::tensor::TrackedTensor;
use crate::error::TensorError;

impl TrackedTensor<f64> {
    /// Element-wise product, see [`tracked_mul`].
    pub fn mul(&self, other: &Self) -> Result<Self, TensorError> {
        tracked_mul(self, other)
    }

    /// Element-wise sum, see [`tracked_add`].
    pub fn add(&self, other: &Self) -> Result<Self, TensorError> {
        tracked_add(self, other)
    }

    pub fn relu(&self) -> Self {
        tracked_relu(self)
    }

    pub fn softmax(&self) -> Self {
        tracked_softmax(self)
    }

    pub fn sum(&self) -> Self {
        tracked_sum(self)
    }
}
