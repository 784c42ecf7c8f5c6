//! Activation functions over `f64` tensors.

use crate::tensor::DenseTensor;

use super::elementwise::apply;

/// Rectified linear unit, `max(x, 0)`.
///
/// ```
/// use gradprobe::Tensor;
/// use gradprobe::operations::relu;
///
/// let t = Tensor::from_vec(vec![-1.0, 0.0, 2.0], &[3]).unwrap();
/// assert_eq!(relu(&t).data(), &[0.0, 0.0, 2.0]);
/// ```
pub fn relu(tensor: &DenseTensor<f64>) -> DenseTensor<f64> {
    apply(tensor, |x| if x > 0.0 { x } else { 0.0 })
}

/// Derivative mask of ReLU: 1 where the input is positive, else 0.
///
/// Zero maps to 0, matching the subgradient most frameworks pick.
pub fn relu_mask(tensor: &DenseTensor<f64>) -> DenseTensor<f64> {
    apply(tensor, |x| if x > 0.0 { 1.0 } else { 0.0 })
}

/// Softmax over all elements.
///
/// Shifted by the maximum before exponentiating.
pub fn softmax(tensor: &DenseTensor<f64>) -> DenseTensor<f64> {
    let max = tensor
        .data()
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let exp = apply(tensor, |x| (x - max).exp());
    let total: f64 = exp.data().iter().sum();
    apply(&exp, |x| x / total)
}
