//! N-dimensional tensor type.
//!
//! ```text
//! Tensor<ElT, StoreT: TensorStorage>
//! └── DenseTensor<ElT> = Tensor<ElT, Dense<ElT>>
//! ```

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::storage::{Dense, TensorStorage};
use crate::strides::{cartesian_to_linear, compute_strides};
use std::fmt;
use std::marker::PhantomData;

/// A n-dimensional tensor stored in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<ElT: Scalar, StoreT: TensorStorage<ElT> = Dense<ElT>> {
    storage: StoreT,
    shape: Vec<usize>,
    strides: Vec<usize>,
    _phantom: PhantomData<ElT>,
}

/// Dense tensor, the only layout the autodiff engine works with.
pub type DenseTensor<ElT> = Tensor<ElT, Dense<ElT>>;

/// Number of elements held by a tensor of `shape`; `[]` holds one.
#[inline]
pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product::<usize>().max(1)
}

impl<ElT: Scalar, StoreT: TensorStorage<ElT>> Tensor<ElT, StoreT> {
    /// Create a zero-initialized tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradprobe::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::zeros(&[2, 3, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4]);
    /// assert_eq!(t.len(), 24);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            storage: StoreT::zeros(element_count(shape)),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
            _phantom: PhantomData,
        }
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let mut t = Self::zeros(shape);
        t.fill(ElT::one());
        t
    }

    /// Create tensor from column-major data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradprobe::{DenseTensor, Tensor};
    ///
    /// let t: DenseTensor<f64> = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0));
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected = element_count(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            storage: StoreT::from_vec(data),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
            _phantom: PhantomData,
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Size of the element buffer in bytes.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.len() * ElT::BYTES
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn data(&self) -> &[ElT] {
        self.storage.as_slice()
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        self.storage.as_mut_slice()
    }

    /// Consume the tensor, returning its column-major elements.
    pub fn into_vec(self) -> Vec<ElT> {
        self.storage.into_vec()
    }

    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&ElT> {
        self.data().get(i)
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        self.checked_offset(indices)
            .ok()
            .and_then(|linear| self.get_linear(linear))
    }

    /// Set element by cartesian indices.
    ///
    /// # Errors
    ///
    /// Returns error if indices are out of bounds or wrong number of indices.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> Result<(), TensorError> {
        let linear = self.checked_offset(indices)?;
        self.data_mut()[linear] = value;
        Ok(())
    }

    /// Fill all elements with a value.
    pub fn fill(&mut self, value: ElT) {
        self.data_mut().fill(value);
    }

    /// Copy of this tensor with a new shape holding the same element count.
    ///
    /// ```
    /// use gradprobe::Tensor;
    ///
    /// let t: gradprobe::DenseTensor<f64> = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let flat = t.reshape(&[6]).unwrap();
    /// assert_eq!(flat.shape(), &[6]);
    /// assert!(t.reshape(&[4]).is_err());
    /// ```
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        let new_len = element_count(new_shape);
        if new_len != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected: self.len(),
                actual: new_len,
            });
        }
        Self::from_vec(self.data().to_vec(), new_shape)
    }

    fn checked_offset(&self, indices: &[usize]) -> Result<usize, TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        if let Some((&index, &dim_size)) = indices
            .iter()
            .zip(self.shape.iter())
            .find(|&(&idx, &dim)| idx >= dim)
        {
            return Err(TensorError::IndexOutOfBounds { index, dim_size });
        }
        Ok(cartesian_to_linear(indices, &self.strides))
    }
}

impl DenseTensor<f64> {
    /// Write the values part of the printed form, e.g. `[ 1.0000, -2.5000]`.
    ///
    /// Positive entries get a leading space when any entry is negative so the
    /// columns line up.
    pub(crate) fn fmt_values(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ndim() == 0 {
            return write!(f, "{:.4}", self.data()[0]);
        }
        let pad = self.data().iter().any(|x| x.is_sign_negative());
        write!(f, "[")?;
        for (i, x) in self.data().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if pad && !x.is_sign_negative() {
                write!(f, " ")?;
            }
            write!(f, "{x:.4}")?;
        }
        write!(f, "]")?;
        if self.ndim() > 1 {
            write!(f, ", shape={:?}", self.shape())?;
        }
        Ok(())
    }
}

impl fmt::Display for DenseTensor<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(")?;
        self.fmt_values(f)?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;

    fn check_zeros<T: Scalar>() {
        let t: Tensor<T> = Tensor::zeros(&[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.strides(), &[1, 2]);
        assert!(t.data().iter().all(|&x| x == T::zero()));
    }

    #[test]
    fn test_zeros_f64() {
        check_zeros::<f64>();
    }

    #[test]
    fn test_zeros_c64() {
        check_zeros::<c64>();
    }

    #[test]
    fn test_from_vec_column_major() {
        let t: DenseTensor<f64> =
            Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.get(&[0, 0]), Some(&1.0));
        assert_eq!(t.get(&[1, 0]), Some(&2.0));
        assert_eq!(t.get(&[0, 2]), Some(&5.0));
        assert_eq!(t.get(&[1, 2]), Some(&6.0));
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let result = Tensor::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[2, 3]);
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let t: Tensor<f64> = Tensor::zeros(&[2, 3]);
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0]), None);
    }

    #[test]
    fn test_set_errors() {
        let mut t: Tensor<f64> = Tensor::zeros(&[2, 3]);
        t.set(&[1, 2], 42.0).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(&42.0));
        assert!(matches!(
            t.set(&[0, 3], 1.0),
            Err(TensorError::IndexOutOfBounds {
                index: 3,
                dim_size: 3
            })
        ));
        assert!(matches!(
            t.set(&[0], 1.0),
            Err(TensorError::WrongNumberOfIndices { .. })
        ));
    }

    #[test]
    fn test_scalar_tensor() {
        let t: Tensor<f64> = Tensor::ones(&[]);
        assert_eq!(t.ndim(), 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.nbytes(), 8);
    }

    #[test]
    fn test_display() {
        let t = DenseTensor::from_vec(vec![1.0, -0.5, 0.25], &[3]).unwrap();
        assert_eq!(t.to_string(), "tensor([ 1.0000, -0.5000,  0.2500])");

        let s = DenseTensor::from_vec(vec![2.0], &[]).unwrap();
        assert_eq!(s.to_string(), "tensor(2.0000)");

        let m = DenseTensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        assert_eq!(m.to_string(), "tensor([1.0000, 2.0000], shape=[1, 2])");
    }
}
