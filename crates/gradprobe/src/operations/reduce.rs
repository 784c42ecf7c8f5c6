//! Reductions.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::ops::Add;

use super::elementwise::mul;

/// Sum of all elements as a rank-0 tensor.
///
/// ```
/// use gradprobe::Tensor;
/// use gradprobe::operations::sum;
///
/// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// let s = sum(&t);
/// assert_eq!(s.shape(), &[] as &[usize]);
/// assert_eq!(s.data(), &[6.0]);
/// ```
pub fn sum<ElT: Scalar + Add<Output = ElT>>(tensor: &DenseTensor<ElT>) -> DenseTensor<ElT> {
    let total = tensor
        .data()
        .iter()
        .fold(ElT::zero(), |acc, &x| acc + x);
    DenseTensor::from_vec(vec![total], &[]).expect("rank-0 tensor holds one element")
}

/// Inner product of two real tensors of the same shape.
pub fn dot(a: &DenseTensor<f64>, b: &DenseTensor<f64>) -> Result<f64, TensorError> {
    Ok(mul(a, b)?.data().iter().sum())
}
