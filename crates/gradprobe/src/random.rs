//! Random tensor construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::scalar::{Scalar, c64};
use crate::storage::Dense;
use crate::tensor::{Tensor, element_count};

/// Element types that can be drawn at random.
pub trait Sample: Scalar {
    /// Draw from the uniform distribution on [0, 1).
    fn uniform<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Draw from the standard normal distribution.
    fn normal<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl Sample for f64 {
    fn uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl Sample for c64 {
    fn uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        c64::new(rng.sample(StandardUniform), rng.sample(StandardUniform))
    }

    // Real and imaginary parts are N(0, 1/2) so E|z|^2 = 1.
    fn normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

impl<ElT: Sample> Tensor<ElT, Dense<ElT>> {
    fn sampled<R, F>(shape: &[usize], rng: &mut R, draw: F) -> Self
    where
        R: Rng + ?Sized,
        F: Fn(&mut R) -> ElT,
    {
        let data: Vec<ElT> = (0..element_count(shape)).map(|_| draw(rng)).collect();
        Self::from_vec(data, shape).expect("shape and data length should match")
    }

    /// Uniform random values in [0, 1) from the thread-local RNG.
    ///
    /// ```
    /// use gradprobe::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::random(&[2, 3]);
    /// assert!(t.data().iter().all(|v| (0.0..1.0).contains(v)));
    /// ```
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Uniform random values in [0, 1) from a caller-supplied RNG.
    pub fn random_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::sampled(shape, rng, |r| ElT::uniform(r))
    }

    /// Standard normal values from the thread-local RNG.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Standard normal values from a caller-supplied RNG.
    ///
    /// ```
    /// use gradprobe::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1: Tensor<f64> = Tensor::randn_with_rng(&[3], &mut StdRng::seed_from_u64(7));
    /// let t2: Tensor<f64> = Tensor::randn_with_rng(&[3], &mut StdRng::seed_from_u64(7));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::sampled(shape, rng, |r| ElT::normal(r))
    }
}
