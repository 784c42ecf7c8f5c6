//! Tracked element-wise multiplication.

use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tensor::TrackedTensor;
use crate::autodiff::version::VersionCounter;
use crate::error::TensorError;
use crate::operations::mul;
use crate::tensor::DenseTensor;

/// Backward function for `a * b`.
///
/// d(a*b)/da = b and d(a*b)/db = a, so each operand is saved for the
/// other's gradient.
#[derive(Debug)]
pub struct MulBackward {
    saved_a: SavedTensor<f64>,
    saved_b: SavedTensor<f64>,
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl GradFn<f64> for MulBackward {
    fn name(&self) -> &'static str {
        "MulBackward0"
    }

    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let mut result = Vec::with_capacity(2);
        if let Some(id) = self.input_a_id {
            result.push((id, mul(grad_output, self.saved_b.unpack()?)?));
        }
        if let Some(id) = self.input_b_id {
            result.push((id, mul(grad_output, self.saved_a.unpack()?)?));
        }
        Ok(result)
    }

    fn next_edges(&self) -> Vec<Option<NodeId>> {
        vec![self.input_a_id, self.input_b_id]
    }

    fn saved_tensors(&self) -> Vec<&SavedTensor<f64>> {
        vec![&self.saved_a, &self.saved_b]
    }

    fn saved_tensors_mut(&mut self) -> Vec<&mut SavedTensor<f64>> {
        vec![&mut self.saved_a, &mut self.saved_b]
    }
}

/// Tracked element-wise product.
///
/// # Errors
///
/// Returns [`TensorError::IncompatibleShapes`] if the shapes differ.
///
/// # Example
///
/// ```
/// use gradprobe::autodiff::{TrackedTensor, backward, clear_graph, tracked_mul};
/// use gradprobe::Tensor;
///
/// clear_graph();
/// let a = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let b = TrackedTensor::leaf(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
/// let c = tracked_mul(&a, &b).unwrap();
/// assert_eq!(c.data(), &[3.0, 8.0]);
///
/// backward(&c, Some(&Tensor::ones(&[2])), false).unwrap();
/// assert_eq!(a.grad().unwrap().data(), &[3.0, 4.0]);
/// ```
pub fn tracked_mul(
    a: &TrackedTensor<f64>,
    b: &TrackedTensor<f64>,
) -> Result<TrackedTensor<f64>, TensorError> {
    let result = mul(a.tensor(), b.tensor())?;

    if !a.requires_grad() && !b.requires_grad() {
        return Ok(TrackedTensor::new(result));
    }

    let backward = MulBackward {
        saved_a: a.save(),
        saved_b: b.save(),
        input_a_id: a.grad_edge(),
        input_b_id: b.grad_edge(),
    };
    Ok(TrackedTensor::from_grad_fn(
        result,
        Box::new(backward),
        VersionCounter::new(),
    ))
}
