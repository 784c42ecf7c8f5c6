//! The smoke scenarios.

use std::io::Write;

use gradprobe::autodiff::{TrackedTensor, backward, clear_graph, restore_graph, walk_graph};
use gradprobe::{DenseTensor, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SmokeConfig;
use crate::error::SmokeError;

/// What [`relu_add`] observed.
#[derive(Debug, Clone)]
pub struct ReluAddReport {
    pub x: DenseTensor<f64>,
    pub y: DenseTensor<f64>,
    /// Rendered `z.grad_fn.next_functions`.
    pub next_functions: String,
    pub x_grad: DenseTensor<f64>,
}

/// What [`saved_replay`] observed.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub grad_a: DenseTensor<f64>,
    /// Gradient of `b` from its own graph.
    pub grad_b: DenseTensor<f64>,
    /// Gradient of `b` after loading `a`'s saved tensors into `b`'s graph.
    pub grad_b_replayed: DenseTensor<f64>,
    pub restored_nodes: usize,
}

/// `z = relu(x * y) + y` on two random vectors, then `z.backward(ones)`.
pub fn relu_add<R, W>(len: usize, rng: &mut R, out: &mut W) -> Result<ReluAddReport, SmokeError>
where
    R: Rng + ?Sized,
    W: Write + ?Sized,
{
    let x = TrackedTensor::randn_with_rng(&[len], true, rng);
    let y = TrackedTensor::randn_with_rng(&[len], true, rng);
    writeln!(out, "x = {x}")?;
    writeln!(out, "y = {y}")?;

    let z = x.mul(&y)?.relu().add(&y)?;
    let next_functions = z
        .grad_fn()
        .map(|f| f.next_functions().to_string())
        .unwrap_or_default();
    writeln!(out, "z.grad_fn.next_functions = {next_functions}")?;

    backward(&z, Some(&Tensor::ones(&[len])), false)?;
    let x_grad = x.grad().unwrap_or_else(|| Tensor::zeros(&[len]));
    writeln!(out, "x.grad = {x_grad}")?;

    Ok(ReluAddReport {
        x: x.tensor().clone(),
        y: y.tensor().clone(),
        next_functions,
        x_grad,
    })
}

fn forward(t: &TrackedTensor<f64>) -> Result<TrackedTensor<f64>, SmokeError> {
    Ok(t.mul(t)?.softmax())
}

/// Serialize one graph's saved tensors and replay them through another.
///
/// With `a = [1, 2, 3]` and `b = [1, 1, 1]`, both run `softmax(t * t)`.
/// After `b`'s graph is loaded with `a`'s saved tensors and `b` is given
/// `a`'s values, backward through `b`'s graph reproduces `a`'s gradient.
pub fn saved_replay<W>(out: &mut W) -> Result<ReplayReport, SmokeError>
where
    W: Write + ?Sized,
{
    let seed: DenseTensor<f64> = Tensor::from_vec(vec![0.0, 1.0, 0.0], &[3])?;
    let a = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3])?);
    let mut b = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, 1.0, 1.0], &[3])?);

    let za = forward(&a)?;
    let walk = walk_graph(&za)?;
    writeln!(out, "graph of za:")?;
    for entry in &walk.entries {
        writeln!(out, "  {entry}")?;
    }
    backward(&za, Some(&seed), false)?;

    let zb = forward(&b)?;
    backward(&zb, Some(&seed), true)?;

    let missing = || gradprobe::TensorError::InvalidOperation("leaf gradient missing".into());
    let grad_a = a.grad().ok_or_else(missing)?;
    let grad_b = b.grad().ok_or_else(missing)?;
    writeln!(out, "a.grad = {grad_a}")?;
    writeln!(out, "b.grad = {grad_b}")?;

    let restored_nodes = restore_graph(&zb, &walk.blobs)?;
    b.set_data(a.tensor().clone())?;
    b.zero_grad();
    backward(&zb, Some(&seed), true)?;

    let grad_b_replayed = b.grad().ok_or_else(missing)?;
    writeln!(out, "b.grad after replay = {grad_b_replayed}")?;

    Ok(ReplayReport {
        grad_a,
        grad_b,
        grad_b_replayed,
        restored_nodes,
    })
}

/// Run both scenarios, each on a fresh graph.
pub fn run<W>(config: &SmokeConfig, out: &mut W) -> Result<(), SmokeError>
where
    W: Write + ?Sized,
{
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    clear_graph();
    log::info!("scenario relu_add (len={})", config.len);
    relu_add(config.len, &mut rng, out)?;

    clear_graph();
    log::info!("scenario saved_replay");
    saved_replay(out)?;

    clear_graph();
    Ok(())
}
