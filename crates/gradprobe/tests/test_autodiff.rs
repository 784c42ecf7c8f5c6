//! Integration tests for the autodiff module.
//!
//! Checks analytic gradients against central differences and exercises
//! graph walking, blob serialization, and replay.

use approx::assert_relative_eq;
use gradprobe::autodiff::{
    TrackedTensor, backward, clear_graph, restore_graph, walk_graph, with_graph_f64,
};
use gradprobe::operations::{add, mul, relu, softmax, sum};
use gradprobe::{DenseTensor, Tensor, TensorError};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vector(values: &[f64]) -> DenseTensor<f64> {
    Tensor::from_vec(values.to_vec(), &[values.len()]).unwrap()
}

/// Compute numerical gradient using central difference.
///
/// grad_i ≈ (f(x + eps*e_i) - f(x - eps*e_i)) / (2*eps)
fn numerical_gradient<F>(f: F, x: &[f64], eps: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for i in 0..x.len() {
        x_plus[i] = x[i] + eps;
        x_minus[i] = x[i] - eps;

        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * eps);

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }
    grad
}

#[test]
fn test_numerical_gradient_relu_add() {
    init_logger();
    let eps = 1e-6;
    // Keep x*y away from the ReLU kink.
    let x_data = [0.7, -1.3, 2.1, -0.4];
    let y_data = [1.5, 0.9, -0.6, -2.2];
    let w_data = [1.0, 2.0, -1.0, 0.5];

    // f(x, y) = <w, relu(x*y) + y>
    let f = |x: &[f64], y: &[f64]| {
        let z = add(&relu(&mul(&vector(x), &vector(y)).unwrap()), &vector(y)).unwrap();
        z.data().iter().zip(&w_data).map(|(a, b)| a * b).sum::<f64>()
    };

    clear_graph();
    let x = TrackedTensor::leaf(vector(&x_data));
    let y = TrackedTensor::leaf(vector(&y_data));
    let z = x.mul(&y).unwrap().relu().add(&y).unwrap();
    backward(&z, Some(&vector(&w_data)), false).unwrap();

    let num_x = numerical_gradient(|xv| f(xv, &y_data), &x_data, eps);
    let num_y = numerical_gradient(|yv| f(&x_data, yv), &y_data, eps);

    let grad_x = x.grad().unwrap();
    let grad_y = y.grad().unwrap();
    for i in 0..4 {
        assert_relative_eq!(grad_x.data()[i], num_x[i], epsilon = 1e-6);
        assert_relative_eq!(grad_y.data()[i], num_y[i], epsilon = 1e-6);
    }
}

#[test]
fn test_numerical_gradient_softmax_of_square() {
    let eps = 1e-6;
    let t_data = [0.3, -0.8, 1.1];
    let seed = [0.0, 1.0, 0.0];

    let f = |t: &[f64]| {
        let s = softmax(&mul(&vector(t), &vector(t)).unwrap());
        s.data()[1]
    };

    clear_graph();
    let t = TrackedTensor::leaf(vector(&t_data));
    let s = t.mul(&t).unwrap().softmax();
    backward(&s, Some(&vector(&seed)), false).unwrap();

    let numerical = numerical_gradient(f, &t_data, eps);
    let grad = t.grad().unwrap();
    for i in 0..3 {
        assert_relative_eq!(grad.data()[i], numerical[i], epsilon = 1e-6);
    }
}

#[test]
fn test_numerical_gradient_sum_loss() {
    let eps = 1e-6;
    let x_data = [0.5, -1.5, 2.0, 0.25, -0.75, 1.0];

    let f = |x: &[f64]| {
        let t: DenseTensor<f64> = Tensor::from_vec(x.to_vec(), &[2, 3]).unwrap();
        let sq = mul(&t, &t).unwrap();
        sum(&softmax(&sq)).data()[0] + sum(&relu(&t)).data()[0]
    };

    clear_graph();
    let x = TrackedTensor::leaf(Tensor::from_vec(x_data.to_vec(), &[2, 3]).unwrap());
    let loss = x
        .mul(&x)
        .unwrap()
        .softmax()
        .sum()
        .add(&x.relu().sum())
        .unwrap();
    backward(&loss, None, false).unwrap();

    let numerical = numerical_gradient(f, &x_data, eps);
    let grad = x.grad().unwrap();
    assert_eq!(grad.shape(), &[2, 3]);
    for i in 0..6 {
        assert_relative_eq!(grad.data()[i], numerical[i], epsilon = 1e-6);
    }
}

#[test]
fn test_randn_relu_add_matches_mask() {
    clear_graph();
    let mut rng = StdRng::seed_from_u64(42);
    let x = TrackedTensor::randn_with_rng(&[3], true, &mut rng);
    let y = TrackedTensor::randn_with_rng(&[3], true, &mut rng);
    let z = x.mul(&y).unwrap().relu().add(&y).unwrap();

    assert_eq!(
        z.grad_fn().unwrap().next_functions().to_string(),
        "((<ReluBackward0>, 0), (<AccumulateGrad>, 0))"
    );

    backward(&z, Some(&Tensor::ones(&[3])), false).unwrap();
    let grad = x.grad().unwrap();
    for i in 0..3 {
        let expected = if x.data()[i] * y.data()[i] > 0.0 {
            y.data()[i]
        } else {
            0.0
        };
        assert_eq!(grad.data()[i], expected);
    }
}

#[test]
fn test_walk_serialize_restore_replay() {
    init_logger();
    clear_graph();

    let mut a = TrackedTensor::leaf(vector(&[1.0, 2.0, 3.0]));
    let mut b = TrackedTensor::leaf(vector(&[1.0, 1.0, 1.0]));
    let seed = vector(&[0.0, 1.0, 0.0]);

    let za = a.mul(&a).unwrap().softmax();
    let walk = walk_graph(&za).unwrap();
    let names: Vec<_> = walk.entries.iter().map(|e| e.name).collect();
    assert_eq!(
        names,
        vec!["SoftmaxBackward0", "MulBackward0", "AccumulateGrad", "AccumulateGrad"]
    );
    backward(&za, Some(&seed), false).unwrap();
    let grad_a = a.grad().unwrap();

    let zb = b.mul(&b).unwrap().softmax();
    backward(&zb, Some(&seed), true).unwrap();
    let grad_b = b.grad().unwrap();
    assert_relative_eq!(grad_b.data()[0], -2.0 / 9.0, epsilon = 1e-12);
    assert_relative_eq!(grad_b.data()[1], 4.0 / 9.0, epsilon = 1e-12);
    assert_relative_eq!(grad_b.data()[2], -2.0 / 9.0, epsilon = 1e-12);

    assert_eq!(restore_graph(&zb, &walk.blobs).unwrap(), 2);
    b.set_data(a.tensor().clone()).unwrap();
    b.zero_grad();
    backward(&zb, Some(&seed), true).unwrap();

    let replayed = b.grad().unwrap();
    for i in 0..3 {
        assert_relative_eq!(replayed.data()[i], grad_a.data()[i], epsilon = 1e-12);
    }

    // The first graph was released; the leaf values stayed intact.
    assert!(matches!(
        backward(&za, Some(&seed), false),
        Err(TensorError::BackwardTwice)
    ));
    assert!(a.fill_(0.0).is_err());
}

#[test]
fn test_graph_is_per_thread() {
    clear_graph();
    let _x = TrackedTensor::leaf(vector(&[1.0]));
    let here = with_graph_f64(|g| g.len());

    let there = std::thread::spawn(|| with_graph_f64(|g| g.len()))
        .join()
        .unwrap();
    assert_eq!(here, 1);
    assert_eq!(there, 0);
}
