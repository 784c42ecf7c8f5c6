//! Computation graph for reverse-mode automatic differentiation.

use super::gradients::Gradients;
use super::saved_tensor::SavedTensor;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::Add;

/// Unique identifier for a node in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: usize) -> Self {
        Self(index)
    }
}

/// User-facing handle to a graph node.
#[derive(Debug, Clone)]
pub struct NodeRef<T: Scalar> {
    id: NodeId,
    _phantom: PhantomData<T>,
}

impl<T: Scalar> NodeRef<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Backward function of one recorded operation.
///
/// Computes the vector-Jacobian product for each forward input that
/// requires grad, and exposes the tensors it saved so the graph can be
/// released, inspected, and serialized.
pub trait GradFn<T: Scalar>: Debug {
    /// Operation name, e.g. `MulBackward0`.
    fn name(&self) -> &'static str;

    /// Given the gradient of the output, return `(input, gradient)` pairs.
    fn backward(
        &self,
        grad_output: &DenseTensor<T>,
    ) -> Result<Vec<(NodeId, DenseTensor<T>)>, TensorError>;

    /// One entry per forward input, in argument order.
    ///
    /// `None` marks an input that does not require grad.
    fn next_edges(&self) -> Vec<Option<NodeId>>;

    /// Input nodes that receive gradient (for topological sort).
    fn inputs(&self) -> Vec<NodeId> {
        self.next_edges().into_iter().flatten().collect()
    }

    fn saved_tensors(&self) -> Vec<&SavedTensor<T>> {
        Vec::new()
    }

    fn saved_tensors_mut(&mut self) -> Vec<&mut SavedTensor<T>> {
        Vec::new()
    }

    /// Free every saved tensor.
    fn release_saved(&mut self) {
        for saved in self.saved_tensors_mut() {
            saved.release();
        }
    }
}

/// A node in the computation graph.
#[derive(Debug)]
pub struct Node<T: Scalar> {
    id: NodeId,
    /// Backward function (None for leaf nodes).
    grad_fn: Option<Box<dyn GradFn<T>>>,
    requires_grad: bool,
}

impl<T: Scalar> Node<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn grad_fn(&self) -> Option<&dyn GradFn<T>> {
        self.grad_fn.as_deref()
    }

    pub fn grad_fn_mut(&mut self) -> Option<&mut (dyn GradFn<T> + 'static)> {
        self.grad_fn.as_deref_mut()
    }

    pub fn is_leaf(&self) -> bool {
        self.grad_fn.is_none()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }
}

/// Recorded operations plus the gradients accumulated into leaves.
///
/// Node ids are indices into `nodes`; clearing the graph invalidates every
/// id handed out before.
pub struct ComputationGraph<T: Scalar> {
    nodes: Vec<Node<T>>,
    leaf_grads: Gradients<T>,
}

impl<T: Scalar + Add<Output = T>> ComputationGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            leaf_grads: Gradients::new(),
        }
    }

    fn push(&mut self, grad_fn: Option<Box<dyn GradFn<T>>>, requires_grad: bool) -> NodeRef<T> {
        let id = NodeId(self.nodes.len());
        log::trace!(
            "graph node {} <- {}",
            id.index(),
            grad_fn.as_ref().map_or("leaf", |f| f.name())
        );
        self.nodes.push(Node {
            id,
            grad_fn,
            requires_grad,
        });
        NodeRef {
            id,
            _phantom: PhantomData,
        }
    }

    /// Create a leaf node (input tensor).
    pub fn create_leaf(&mut self, requires_grad: bool) -> NodeRef<T> {
        self.push(None, requires_grad)
    }

    /// Create a computed node with backward function.
    pub fn create_node(&mut self, grad_fn: Box<dyn GradFn<T>>, requires_grad: bool) -> NodeRef<T> {
        self.push(Some(grad_fn), requires_grad)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.index())
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(id.index())
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    /// Add a gradient into a leaf's accumulator (the `AccumulateGrad` step).
    pub fn accumulate_leaf(&mut self, id: NodeId, grad: DenseTensor<T>) -> Result<(), TensorError> {
        self.leaf_grads.accumulate(id, grad)
    }

    /// Accumulated gradient of a leaf, if any backward pass reached it.
    pub fn leaf_grad(&self, id: NodeId) -> Option<&DenseTensor<T>> {
        self.leaf_grads.get(id)
    }

    /// Zero a leaf's accumulated gradient in place.
    pub fn zero_leaf_grad(&mut self, id: NodeId) {
        self.leaf_grads.zero(id);
    }

    /// Drop all nodes and accumulated gradients.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaf_grads.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T: Scalar + Add<Output = T>> Default for ComputationGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar + Add<Output = T>> Debug for ComputationGraph<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationGraph")
            .field("num_nodes", &self.nodes.len())
            .field("num_leaf_grads", &self.leaf_grads.len())
            .finish()
    }
}

thread_local! {
    static GRAPH_F64: RefCell<ComputationGraph<f64>> = RefCell::new(ComputationGraph::new());
}

/// Access the thread-local computation graph for f64.
///
/// The closure must not call back into `with_graph_f64`.
pub fn with_graph_f64<R>(f: impl FnOnce(&mut ComputationGraph<f64>) -> R) -> R {
    GRAPH_F64.with(|g| f(&mut g.borrow_mut()))
}

/// Clear the thread-local computation graph for f64.
pub fn clear_graph_f64() {
    with_graph_f64(|g| g.clear());
}
