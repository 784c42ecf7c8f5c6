//! Tracked element-wise addition.

use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::autodiff::version::VersionCounter;
use crate::error::TensorError;
use crate::operations::add;
use crate::tensor::DenseTensor;

/// Backward function for `a + b`; passes the gradient through to both sides.
#[derive(Debug)]
pub struct AddBackward {
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl GradFn<f64> for AddBackward {
    fn name(&self) -> &'static str {
        "AddBackward0"
    }

    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        Ok(self
            .inputs()
            .into_iter()
            .map(|id| (id, grad_output.clone()))
            .collect())
    }

    fn next_edges(&self) -> Vec<Option<NodeId>> {
        vec![self.input_a_id, self.input_b_id]
    }
}

/// Tracked element-wise sum.
///
/// # Errors
///
/// Returns [`TensorError::IncompatibleShapes`] if the shapes differ.
pub fn tracked_add(
    a: &TrackedTensor<f64>,
    b: &TrackedTensor<f64>,
) -> Result<TrackedTensor<f64>, TensorError> {
    let result = add(a.tensor(), b.tensor())?;

    if !a.requires_grad() && !b.requires_grad() {
        return Ok(TrackedTensor::new(result));
    }

    let backward = AddBackward {
        input_a_id: a.grad_edge(),
        input_b_id: b.grad_edge(),
    };
    Ok(TrackedTensor::from_grad_fn(
        result,
        Box::new(backward),
        VersionCounter::new(),
    ))
}
