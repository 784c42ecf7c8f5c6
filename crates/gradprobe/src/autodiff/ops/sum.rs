//! Tracked sum reduction.

use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::autodiff::version::VersionCounter;
use crate::error::TensorError;
use crate::operations::sum;
use crate::tensor::DenseTensor;

/// Backward function for `sum(x)`; broadcasts the scalar gradient back.
#[derive(Debug)]
pub struct SumBackward {
    input_shape: Vec<usize>,
    input_id: Option<NodeId>,
}

impl GradFn<f64> for SumBackward {
    fn name(&self) -> &'static str {
        "SumBackward0"
    }

    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let &[g] = grad_output.data() else {
            return Err(TensorError::ShapeMismatch {
                expected: 1,
                actual: grad_output.len(),
            });
        };
        let mut grad: DenseTensor<f64> = DenseTensor::zeros(&self.input_shape);
        grad.fill(g);
        Ok(vec![(id, grad)])
    }

    fn next_edges(&self) -> Vec<Option<NodeId>> {
        vec![self.input_id]
    }
}

/// Tracked sum of all elements, producing a rank-0 tensor.
///
/// ```
/// use gradprobe::autodiff::{TrackedTensor, backward, clear_graph};
/// use gradprobe::Tensor;
///
/// clear_graph();
/// let x = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
/// let loss = x.mul(&x).unwrap().sum();
/// backward(&loss, None, false).unwrap();
/// assert_eq!(x.grad().unwrap().data(), &[2.0, 4.0, 6.0]);
/// ```
pub fn tracked_sum(input: &TrackedTensor<f64>) -> TrackedTensor<f64> {
    let result = sum(input.tensor());

    if !input.requires_grad() {
        return TrackedTensor::new(result);
    }

    let backward = SumBackward {
        input_shape: input.shape().to_vec(),
        input_id: input.grad_edge(),
    };
    TrackedTensor::from_grad_fn(result, Box::new(backward), VersionCounter::new())
}
