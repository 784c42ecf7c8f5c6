//! Tracked softmax.

use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tensor::TrackedTensor;
use crate::autodiff::version::VersionCounter;
use crate::error::TensorError;
use crate::operations::{apply_binary, dot, softmax};
use crate::tensor::DenseTensor;

/// Backward function for `softmax(x)` over all elements.
///
/// With `s = softmax(x)`: `dx = s * (g - <g, s>)`.
#[derive(Debug)]
pub struct SoftmaxBackward {
    saved_result: SavedTensor<f64>,
    input_id: Option<NodeId>,
}

impl GradFn<f64> for SoftmaxBackward {
    fn name(&self) -> &'static str {
        "SoftmaxBackward0"
    }

    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let s = self.saved_result.unpack()?;
        let inner = dot(grad_output, s)?;
        let grad = apply_binary(grad_output, s, |g, si| si * (g - inner))?;
        Ok(vec![(id, grad)])
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

/// Tracked softmax over all elements of the tensor.
pub fn tracked_softmax(input: &TrackedTensor<f64>) -> TrackedTensor<f64> {
    let result = softmax(input.tensor());

    if !input.requires_grad() {
        return TrackedTensor::new(result);
    }

    let version = VersionCounter::new();
    let backward = SoftmaxBackward {
        saved_result: SavedTensor::new(&result, &version, "output 0 of SoftmaxBackward0"),
        input_id: input.grad_edge(),
    };
    TrackedTensor::from_grad_fn(result, Box::new(backward), version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;
    use crate::autodiff::backward::backward;
    use crate::autodiff::tensor::clear_graph;
    use approx::assert_relative_eq;

    #[test]
    fn test_softmax_gradient_uniform_input() {
        clear_graph();
        let x = TrackedTensor::leaf(Tensor::ones(&[3]));
        let s = tracked_softmax(&x);

        let seed = Tensor::from_vec(vec![0.0, 1.0, 0.0], &[3]).unwrap();
        backward(&s, Some(&seed), false).unwrap();

        // s = 1/3 everywhere: ds_1/dx_i = s_1 (delta_i1 - s_i)
        let grad = x.grad().unwrap();
        assert_relative_eq!(grad.data()[0], -1.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(grad.data()[1], 2.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(grad.data()[2], -1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_softmax_gradient_sums_to_zero() {
        clear_graph();
        let x = TrackedTensor::leaf(Tensor::from_vec(vec![0.3, -1.2, 2.5, 0.0], &[4]).unwrap());
        let s = tracked_softmax(&x);
        let seed = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4]).unwrap();
        backward(&s, Some(&seed), false).unwrap();

        let total: f64 = x.grad().unwrap().data().iter().sum();
        assert_relative_eq!(total, 0.0, epsilon = 1e-12);
    }
}
