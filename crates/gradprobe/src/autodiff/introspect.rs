//! Graph introspection: node relationships, graph walks, and saved-tensor
//! snapshots that can be replayed into another graph of the same shape.
//!
//! ```text
//! z = relu(x * y) + y
//!
//! AddBackward0
//! ├── ReluBackward0
//! │   └── MulBackward0
//! │       ├── AccumulateGrad (x)
//! │       └── AccumulateGrad (y)
//! └── AccumulateGrad (y)
//! ```

use super::graph::{ComputationGraph, NodeId, with_graph_f64};
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::scalar::Scalar;
use std::fmt;
use std::ops::{Add, Deref};

/// Name shown for the gradient sink of a leaf tensor.
pub const ACCUMULATE_GRAD: &str = "AccumulateGrad";

/// What an edge of a backward function points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTarget {
    /// Backward function of a recorded intermediate result.
    Function { id: NodeId, name: &'static str },
    /// Gradient accumulator of a leaf tensor.
    AccumulateGrad { id: NodeId },
}

impl EdgeTarget {
    pub fn id(&self) -> NodeId {
        match *self {
            EdgeTarget::Function { id, .. } | EdgeTarget::AccumulateGrad { id } => id,
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            EdgeTarget::Function { name, .. } => name,
            EdgeTarget::AccumulateGrad { .. } => ACCUMULATE_GRAD,
        }
    }
}

/// Link from a backward function to the producer of one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub target: EdgeTarget,
    /// Which output of the target this input was; always 0 for the
    /// single-output ops recorded here.
    pub input_nr: usize,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(<{}>, {})", self.target.name(), self.input_nr)
    }
}

/// Predecessor links of a backward function, one per forward input.
///
/// Displays as a tuple of `(<Name>, input_nr)` pairs with `(None, 0)` for
/// inputs that do not require grad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextFunctions(Vec<Option<Edge>>);

impl Deref for NextFunctions {
    type Target = [Option<Edge>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for NextFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, edge) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match edge {
                Some(edge) => write!(f, "{edge}")?,
                None => write!(f, "(None, 0)")?,
            }
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Detached view of one backward function in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradFnRef {
    id: NodeId,
    name: &'static str,
    next_functions: NextFunctions,
}

impl GradFnRef {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn next_functions(&self) -> &NextFunctions {
        &self.next_functions
    }
}

impl fmt::Display for GradFnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

impl<T: Scalar + Add<Output = T>> ComputationGraph<T> {
    /// Edge to `input`, or `None` if it is not in the graph.
    fn edge_to(&self, input: NodeId) -> Option<Edge> {
        let node = self.get_node(input)?;
        let target = match node.grad_fn() {
            Some(f) => EdgeTarget::Function {
                id: input,
                name: f.name(),
            },
            None if node.requires_grad() => EdgeTarget::AccumulateGrad { id: input },
            None => return None,
        };
        Some(Edge {
            target,
            input_nr: 0,
        })
    }

    /// Snapshot of the backward function at `id`; `None` for leaves.
    pub fn grad_fn_ref(&self, id: NodeId) -> Option<GradFnRef> {
        let grad_fn = self.get_node(id)?.grad_fn()?;
        let next_functions = grad_fn
            .next_edges()
            .into_iter()
            .map(|edge| edge.and_then(|input| self.edge_to(input)))
            .collect();
        Some(GradFnRef {
            id,
            name: grad_fn.name(),
            next_functions: NextFunctions(next_functions),
        })
    }

    /// Depth-first pre-order over everything reachable from `root`.
    ///
    /// Shared subgraphs are visited once per path, so the order only
    /// depends on the graph's shape.
    fn visit_order(&self, root: NodeId) -> Vec<(usize, Edge)> {
        let mut order = Vec::new();
        let mut stack: Vec<(usize, Edge)> = self
            .edge_to(root)
            .map(|edge| vec![(0, edge)])
            .unwrap_or_default();
        while let Some((depth, edge)) = stack.pop() {
            order.push((depth, edge));
            if let EdgeTarget::Function { id, .. } = edge.target {
                if let Some(grad_fn) = self.get_node(id).and_then(|n| n.grad_fn()) {
                    let children: Vec<Edge> = grad_fn
                        .next_edges()
                        .into_iter()
                        .flatten()
                        .filter_map(|input| self.edge_to(input))
                        .collect();
                    stack.extend(children.into_iter().rev().map(|e| (depth + 1, e)));
                }
            }
        }
        order
    }
}

/// One visited node of a [`walk_graph`] traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    pub depth: usize,
    pub id: NodeId,
    pub name: &'static str,
    /// Whether the node holds saved tensors that can be serialized.
    pub serializable: bool,
    pub blob_count: usize,
    /// Payload size declared by the first blob.
    pub first_blob_len: Option<usize>,
}

impl fmt::Display for GraphEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.name, indent = self.depth * 2)?;
        if self.serializable {
            write!(f, " [serializable] blobs:{}", self.blob_count)?;
            if let Some(len) = self.first_blob_len {
                write!(f, " first:{len}B")?;
            }
        }
        Ok(())
    }
}

/// Result of [`walk_graph`].
#[derive(Debug, Clone, Default)]
pub struct GraphWalk {
    pub entries: Vec<GraphEntry>,
    /// One queue of blobs per serializable node, in visit order.
    pub blobs: Vec<Vec<Vec<u8>>>,
}

/// Walk the graph behind `root`, serializing every saved tensor on the way.
///
/// Returns an empty walk for tensors without a backward function.
///
/// # Errors
///
/// Fails with [`TensorError::BackwardTwice`] if a visited node's saved
/// tensors were already released.
pub fn walk_graph(root: &TrackedTensor<f64>) -> Result<GraphWalk, TensorError> {
    let Some(root_id) = root.node_id() else {
        return Ok(GraphWalk::default());
    };
    with_graph_f64(|graph| {
        let mut walk = GraphWalk::default();
        if graph.get_node(root_id).is_none_or(|n| n.is_leaf()) {
            return Ok(walk);
        }
        for (depth, edge) in graph.visit_order(root_id) {
            let id = edge.target.id();
            let saved = graph
                .get_node(id)
                .and_then(|n| n.grad_fn())
                .map(|f| f.saved_tensors())
                .unwrap_or_default();
            let serializable = !saved.is_empty();
            let queue = saved
                .iter()
                .map(|s| s.serialize_to_blob())
                .collect::<Result<Vec<_>, _>>()?;
            let first_blob_len = queue.first().map(|blob| blob_payload_len(blob));

            walk.entries.push(GraphEntry {
                depth,
                id,
                name: edge.target.name(),
                serializable,
                blob_count: queue.len(),
                first_blob_len,
            });
            if serializable {
                walk.blobs.push(queue);
            }
        }
        log::debug!(
            "walked {} graph nodes, {} serializable",
            walk.entries.len(),
            walk.blobs.len()
        );
        Ok(walk)
    })
}

fn blob_payload_len(blob: &[u8]) -> usize {
    blob.first_chunk::<8>()
        .map_or(0, |prefix| u64::from_le_bytes(*prefix) as usize)
}

/// Load saved tensors of the graph behind `root` from `blobs`.
///
/// Visits nodes in the same order as [`walk_graph`]; each serializable node
/// consumes the next queue. The target graph must have the same structure
/// and tensor sizes as the one that produced the blobs. All queues are
/// checked before any saved tensor is overwritten.
///
/// Returns the number of nodes restored.
pub fn restore_graph(root: &TrackedTensor<f64>, blobs: &[Vec<Vec<u8>>]) -> Result<usize, TensorError> {
    let Some(root_id) = root.node_id() else {
        return Ok(0);
    };
    with_graph_f64(|graph| {
        if graph.get_node(root_id).is_none_or(|n| n.is_leaf()) {
            return Ok(0);
        }
        let targets: Vec<NodeId> = graph
            .visit_order(root_id)
            .into_iter()
            .map(|(_, edge)| edge.target.id())
            .filter(|&id| {
                graph
                    .get_node(id)
                    .and_then(|n| n.grad_fn())
                    .is_some_and(|f| !f.saved_tensors().is_empty())
            })
            .collect();

        if targets.len() > blobs.len() {
            return Err(TensorError::InvalidOperation(format!(
                "graph has {} serializable nodes but only {} blob queues were supplied",
                targets.len(),
                blobs.len()
            )));
        }

        // Validate every queue before writing, so a failed restore leaves
        // the graph untouched.
        for (&id, queue) in targets.iter().zip(blobs) {
            let Some(grad_fn) = graph.get_node(id).and_then(|n| n.grad_fn()) else {
                continue;
            };
            let saved = grad_fn.saved_tensors();
            if saved.len() != queue.len() {
                return Err(TensorError::InvalidOperation(format!(
                    "{} saves {} tensors but its blob queue holds {}",
                    grad_fn.name(),
                    saved.len(),
                    queue.len()
                )));
            }
            for (slot, blob) in saved.iter().zip(queue) {
                slot.check_blob(blob)?;
            }
        }

        for (&id, queue) in targets.iter().zip(blobs) {
            let Some(grad_fn) = graph.get_node_mut(id).and_then(|n| n.grad_fn_mut()) else {
                continue;
            };
            for (slot, blob) in grad_fn.saved_tensors_mut().iter_mut().zip(queue) {
                slot.deserialize_from_blob(blob)?;
            }
        }
        log::debug!("restored saved tensors of {} graph nodes", targets.len());
        Ok(targets.len())
    })
}
