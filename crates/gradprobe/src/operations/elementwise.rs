//! Element-wise tensor operations.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::ops::{Add, Mul};

/// Apply a function to each element, returning a new tensor.
///
/// # Example
///
/// ```
/// use gradprobe::Tensor;
/// use gradprobe::operations::apply;
///
/// let t = Tensor::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
/// let ts = apply(&t, |x: f64| x.sqrt());
/// assert_eq!(ts.data(), &[1.0, 2.0, 3.0]);
/// ```
pub fn apply<ElT: Scalar, F>(tensor: &DenseTensor<ElT>, f: F) -> DenseTensor<ElT>
where
    F: Fn(ElT) -> ElT,
{
    let mut out = tensor.clone();
    apply_inplace(&mut out, f);
    out
}

/// Apply a function to each element in-place.
pub fn apply_inplace<ElT: Scalar, F>(tensor: &mut DenseTensor<ElT>, f: F)
where
    F: Fn(ElT) -> ElT,
{
    for x in tensor.data_mut() {
        *x = f(*x);
    }
}

/// Combine two tensors of identical shape element-wise.
///
/// No broadcasting: shapes must match exactly.
///
/// # Example
///
/// ```
/// use gradprobe::Tensor;
/// use gradprobe::operations::apply_binary;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();
/// let c = apply_binary(&a, &b, |x, y| x - y).unwrap();
/// assert_eq!(c.data(), &[-3.0, -3.0, -3.0]);
/// ```
pub fn apply_binary<ElT: Scalar, F>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
    f: F,
) -> Result<DenseTensor<ElT>, TensorError>
where
    F: Fn(ElT, ElT) -> ElT,
{
    if a.shape() != b.shape() {
        return Err(TensorError::IncompatibleShapes {
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }
    let data: Vec<ElT> = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| f(x, y))
        .collect();
    DenseTensor::from_vec(data, a.shape())
}

/// Element-wise sum `a + b`.
pub fn add<ElT: Scalar + Add<Output = ElT>>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
) -> Result<DenseTensor<ElT>, TensorError> {
    apply_binary(a, b, |x, y| x + y)
}

/// Element-wise (Hadamard) product `a * b`.
pub fn mul<ElT: Scalar + Mul<Output = ElT>>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
) -> Result<DenseTensor<ElT>, TensorError> {
    apply_binary(a, b, |x, y| x * y)
}

/// Multiply every element by `alpha`.
pub fn scale<ElT: Scalar + Mul<Output = ElT>>(
    tensor: &DenseTensor<ElT>,
    alpha: ElT,
) -> DenseTensor<ElT> {
    apply(tensor, |x| x * alpha)
}
