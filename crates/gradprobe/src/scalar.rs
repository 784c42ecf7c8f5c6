//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;

pub use faer::c64;

/// Element type of a tensor.
///
/// Built on faer's `ComplexField` so both real and complex tensors share
/// one storage layer. Differentiable operations are only provided for `f64`.
pub trait Scalar: ComplexField + Copy + Debug + Default + 'static {
    /// The real type associated with this scalar.
    type Real: Scalar;

    /// Size of one element in bytes, used for blob layouts.
    const BYTES: usize = std::mem::size_of::<Self>();

    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;
}

impl Scalar for f64 {
    type Real = f64;

    fn one() -> Self {
        1.0
    }
}

impl Scalar for c64 {
    type Real = f64;

    fn one() -> Self {
        c64::new(1.0, 0.0)
    }
}
