//! Tape-based reverse-mode automatic differentiation.
//!
//! Recorded operations live in a thread-local computation graph. Each
//! non-leaf node holds a [`GradFn`] with the tensors it saved for backward;
//! leaves that require grad collect their gradients in the graph as well.
//!
//! # Architecture
//!
//! ```text
//! TrackedTensor<f64>  ──registers in──►  ComputationGraph (thread_local)
//!        │                                      │
//!        ▼                                      ▼
//!   DenseTensor<f64>                    Vec<Node<f64>>  +  leaf Gradients
//!   VersionCounter                             │
//!                                              ▼
//!                                   MulBackward0, ReluBackward0, ...
//!                                              │
//!                                         SavedTensor ── blob
//! ```
//!
//! # Example
//!
//! ```
//! use gradprobe::autodiff::{TrackedTensor, backward, clear_graph};
//! use gradprobe::Tensor;
//!
//! clear_graph();
//! let x = TrackedTensor::leaf(Tensor::from_vec(vec![1.0, -2.0, 3.0], &[3]).unwrap());
//! let y = TrackedTensor::leaf(Tensor::from_vec(vec![2.0, 2.0, 2.0], &[3]).unwrap());
//! let z = x.mul(&y).unwrap().relu().add(&y).unwrap();
//!
//! assert_eq!(
//!     z.grad_fn().unwrap().next_functions().to_string(),
//!     "((<ReluBackward0>, 0), (<AccumulateGrad>, 0))"
//! );
//!
//! backward(&z, Some(&Tensor::ones(&[3])), false).unwrap();
//! assert_eq!(x.grad().unwrap().data(), &[2.0, 0.0, 2.0]);
//! ```

mod backward;
mod gradients;
mod graph;
mod introspect;
mod ops;
mod saved_tensor;
mod tensor;
mod version;

pub use backward::backward;
pub use gradients::Gradients;
pub use graph::{ComputationGraph, GradFn, Node, NodeId, NodeRef, clear_graph_f64, with_graph_f64};
pub use introspect::{
    ACCUMULATE_GRAD, Edge, EdgeTarget, GradFnRef, GraphEntry, GraphWalk, NextFunctions,
    restore_graph, walk_graph,
};
pub use ops::{
    AddBackward, MulBackward, ReluBackward, SoftmaxBackward, SumBackward, tracked_add,
    tracked_mul, tracked_relu, tracked_softmax, tracked_sum,
};
pub use saved_tensor::{BLOB_PREFIX_BYTES, SavedTensor};
pub use tensor::{TrackedTensor, clear_graph};
pub use version::VersionCounter;
