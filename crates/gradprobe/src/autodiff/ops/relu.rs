//! Tracked ReLU.

use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tensor::TrackedTensor;
use crate::autodiff::version::VersionCounter;
use crate::error::TensorError;
use crate::operations::{mul, relu, relu_mask};
use crate::tensor::DenseTensor;

/// Backward function for `relu(x)`.
///
/// Saves the output; `relu(x) > 0` exactly where `x > 0`.
#[derive(Debug)]
pub struct ReluBackward {
    saved_result: SavedTensor<f64>,
    input_id: Option<NodeId>,
}

impl GradFn<f64> for ReluBackward {
    fn name(&self) -> &'static str {
        "ReluBackward0"
    }

    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let mask = relu_mask(self.saved_result.unpack()?);
        Ok(vec![(id, mul(grad_output, &mask)?)])
    }

    fn next_edges(&self) -> Vec<Option<NodeId>> {
        vec![self.input_id]
    }

    fn saved_tensors(&self) -> Vec<&SavedTensor<f64>> {
        vec![&self.saved_result]
    }

    fn saved_tensors_mut(&mut self) -> Vec<&mut SavedTensor<f64>> {
        vec![&mut self.saved_result]
    }
}

/// Tracked rectified linear unit.
pub fn tracked_relu(input: &TrackedTensor<f64>) -> TrackedTensor<f64> {
    let result = relu(input.tensor());

    if !input.requires_grad() {
        return TrackedTensor::new(result);
    }

    let version = VersionCounter::new();
    let backward = ReluBackward {
        saved_result: SavedTensor::new(&result, &version, "output 0 of ReluBackward0"),
        input_id: input.grad_edge(),
    };
    TrackedTensor::from_grad_fn(result, Box::new(backward), version)
}
