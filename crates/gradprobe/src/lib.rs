//! gradprobe - tape-based reverse-mode autodiff over dense tensors.
//!
//! A small, inspectable autograd engine: element-wise operations record
//! backward functions in a thread-local graph, saved tensors are guarded by
//! version counters, and the graph can be walked, serialized, and replayed.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Tracked API (autodiff module)
//!     → TrackedTensor, tracked ops, backward, walk_graph / restore_graph
//!
//! Level 2: Untracked kernels (operations module)
//!     → add, mul, relu, softmax, sum, dot
//!
//! Level 3: Storage
//!     → Tensor<ElT, Dense<ElT>> (column-major)
//! ```
//!
//! # Example
//!
//! ```
//! use gradprobe::autodiff::{TrackedTensor, backward, clear_graph};
//! use gradprobe::{DenseTensor, Tensor};
//!
//! clear_graph();
//! let x = TrackedTensor::randn(&[3], true);
//! let y = TrackedTensor::randn(&[3], true);
//! let z = x.mul(&y).unwrap().relu().add(&y).unwrap();
//!
//! let ones: DenseTensor<f64> = Tensor::ones(&[3]);
//! backward(&z, Some(&ones), false).unwrap();
//!
//! // dz/dx = y where x*y > 0, else 0
//! let grad = x.grad().unwrap();
//! for i in 0..3 {
//!     let expected = if x.data()[i] * y.data()[i] > 0.0 { y.data()[i] } else { 0.0 };
//!     assert_eq!(grad.data()[i], expected);
//! }
//! ```

pub mod autodiff;
pub mod error;
pub mod operations;
pub mod random;
pub mod scalar;
pub mod storage;
pub mod strides;
pub mod tensor;

pub use error::TensorError;
pub use random::Sample;
pub use scalar::{Scalar, c64};
pub use storage::{Dense, TensorStorage};
pub use tensor::{DenseTensor, Tensor};
