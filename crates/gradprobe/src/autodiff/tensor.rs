//! TrackedTensor - Tensor with gradient tracking for automatic differentiation.

use super::graph::{GradFn, NodeId, NodeRef, clear_graph_f64, with_graph_f64};
use super::introspect::GradFnRef;
use super::saved_tensor::SavedTensor;
use super::version::VersionCounter;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use rand::Rng;
use std::fmt;

/// A tensor that tracks gradients for automatic differentiation.
///
/// A clone copies the data and refers to the same graph node, but starts
/// its own version counter: in-place writes to the copy never invalidate
/// values saved from the original.
///
/// # Example
///
/// ```
/// use gradprobe::autodiff::{TrackedTensor, clear_graph};
/// use gradprobe::Tensor;
///
/// clear_graph();
/// let a = TrackedTensor::leaf(Tensor::ones(&[3]));
/// assert!(a.requires_grad());
/// assert!(a.is_leaf());
///
/// let b: TrackedTensor<f64> = TrackedTensor::new(Tensor::ones(&[3]));
/// assert!(!b.requires_grad());
/// ```
#[derive(Debug)]
pub struct TrackedTensor<T: Scalar> {
    tensor: DenseTensor<T>,
    /// Node in computation graph (None if not tracking).
    node: Option<NodeRef<T>>,
    requires_grad: bool,
    version: VersionCounter,
}

impl<T: Scalar> Clone for TrackedTensor<T> {
    fn clone(&self) -> Self {
        Self {
            tensor: self.tensor.clone(),
            node: self.node.clone(),
            requires_grad: self.requires_grad,
            version: VersionCounter::new(),
        }
    }
}

impl<T: Scalar> TrackedTensor<T> {
    /// Wrap a tensor that does not require gradient.
    pub fn new(tensor: DenseTensor<T>) -> Self {
        Self {
            tensor,
            node: None,
            requires_grad: false,
            version: VersionCounter::new(),
        }
    }

    pub fn tensor(&self) -> &DenseTensor<T> {
        &self.tensor
    }

    pub fn into_tensor(self) -> DenseTensor<T> {
        self.tensor
    }

    pub fn node(&self) -> Option<&NodeRef<T>> {
        self.node.as_ref()
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node.as_ref().map(|n| n.id())
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Number of in-place writes made to this tensor so far.
    pub fn version(&self) -> u32 {
        self.version.current()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn ndim(&self) -> usize {
        self.tensor.ndim()
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    pub fn data(&self) -> &[T] {
        self.tensor.data()
    }

    /// Copy of the data cut off from the computation graph.
    pub fn detach(&self) -> Self {
        Self::new(self.tensor.clone())
    }

    /// Edge to this tensor for a consumer's backward function.
    pub(crate) fn grad_edge(&self) -> Option<NodeId> {
        if self.requires_grad {
            self.node_id()
        } else {
            None
        }
    }
}

// f64-specific methods that interact with the thread-local graph
impl TrackedTensor<f64> {
    /// Create a leaf tensor that requires gradient.
    pub fn leaf(tensor: DenseTensor<f64>) -> Self {
        let node = with_graph_f64(|g| g.create_leaf(true));
        Self {
            tensor,
            node: Some(node),
            requires_grad: true,
            version: VersionCounter::new(),
        }
    }

    /// Create with explicit requires_grad flag.
    pub fn with_requires_grad(tensor: DenseTensor<f64>, requires_grad: bool) -> Self {
        if requires_grad {
            Self::leaf(tensor)
        } else {
            Self::new(tensor)
        }
    }

    /// Standard normal leaf tensor from the thread-local RNG.
    pub fn randn(shape: &[usize], requires_grad: bool) -> Self {
        Self::with_requires_grad(DenseTensor::randn(shape), requires_grad)
    }

    /// Standard normal leaf tensor from a caller-supplied RNG.
    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], requires_grad: bool, rng: &mut R) -> Self {
        Self::with_requires_grad(DenseTensor::randn_with_rng(shape, rng), requires_grad)
    }

    /// Register the result of a recorded operation.
    ///
    /// `version` is the counter the result will own; ops that save their own
    /// output create it first so the saved copy can watch it.
    pub(crate) fn from_grad_fn(
        tensor: DenseTensor<f64>,
        grad_fn: Box<dyn GradFn<f64>>,
        version: VersionCounter,
    ) -> Self {
        let node = with_graph_f64(|g| g.create_node(grad_fn, true));
        Self {
            tensor,
            node: Some(node),
            requires_grad: true,
            version,
        }
    }

    /// Snapshot this tensor for a consumer's backward function.
    pub(crate) fn save(&self) -> SavedTensor<f64> {
        let origin = match self.grad_fn() {
            Some(f) => format!("output 0 of {}", f.name()),
            None => "a leaf tensor".to_string(),
        };
        SavedTensor::new(&self.tensor, &self.version, origin)
    }

    /// Whether this tensor was created by the user rather than by a recorded op.
    pub fn is_leaf(&self) -> bool {
        match self.node_id() {
            Some(id) => with_graph_f64(|g| g.get_node(id).is_none_or(|n| n.is_leaf())),
            None => true,
        }
    }

    /// Backward function that produced this tensor; `None` for leaves.
    pub fn grad_fn(&self) -> Option<GradFnRef> {
        let id = self.node_id()?;
        with_graph_f64(|g| g.grad_fn_ref(id))
    }

    /// Gradient accumulated into this leaf by backward passes.
    ///
    /// `None` for non-leaves and for leaves no backward pass has reached.
    pub fn grad(&self) -> Option<DenseTensor<f64>> {
        let id = self.node_id()?;
        with_graph_f64(|g| g.leaf_grad(id).cloned())
    }

    /// Zero the accumulated gradient in place, if there is one.
    pub fn zero_grad(&self) {
        if let Some(id) = self.node_id() {
            with_graph_f64(|g| g.zero_leaf_grad(id));
        }
    }

    fn check_inplace(&self) -> Result<(), TensorError> {
        if !self.requires_grad {
            return Ok(());
        }
        if self.is_leaf() {
            Err(TensorError::InvalidOperation(
                "a leaf tensor that requires grad is being used in an in-place operation".into(),
            ))
        } else {
            Err(TensorError::InvalidOperation(
                "in-place writes to recorded intermediate results are not supported".into(),
            ))
        }
    }

    /// Overwrite the values with `source`, counting as one in-place write.
    pub fn copy_(&mut self, source: &DenseTensor<f64>) -> Result<(), TensorError> {
        self.check_inplace()?;
        if source.shape() != self.shape() {
            return Err(TensorError::IncompatibleShapes {
                lhs: self.shape().to_vec(),
                rhs: source.shape().to_vec(),
            });
        }
        self.tensor.data_mut().copy_from_slice(source.data());
        self.version.bump();
        Ok(())
    }

    /// Set every element to `value`, counting as one in-place write.
    pub fn fill_(&mut self, value: f64) -> Result<(), TensorError> {
        self.check_inplace()?;
        self.tensor.fill(value);
        self.version.bump();
        Ok(())
    }

    pub fn zero_(&mut self) -> Result<(), TensorError> {
        self.fill_(0.0)
    }

    /// Replace the values without recording an in-place write.
    ///
    /// Saved copies of this tensor keep their old values and stay valid.
    /// Allowed on leaves that require grad.
    pub fn set_data(&mut self, source: DenseTensor<f64>) -> Result<(), TensorError> {
        if source.shape() != self.shape() {
            return Err(TensorError::IncompatibleShapes {
                lhs: self.shape().to_vec(),
                rhs: source.shape().to_vec(),
            });
        }
        self.tensor = source;
        Ok(())
    }
}

impl fmt::Display for TrackedTensor<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(")?;
        self.tensor.fmt_values(f)?;
        match self.grad_fn() {
            Some(grad_fn) => write!(f, ", grad_fn={grad_fn}")?,
            None if self.requires_grad => write!(f, ", requires_grad=true")?,
            None => {}
        }
        write!(f, ")")
    }
}

/// Clear the computation graph (call between independent forward passes).
///
/// Tensors created before the call must not be used with the graph again.
pub fn clear_graph() {
    clear_graph_f64();
}
