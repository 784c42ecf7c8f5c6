//! Backward pass execution for reverse-mode automatic differentiation.

use super::gradients::Gradients;
use super::graph::{ComputationGraph, NodeId, with_graph_f64};
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::tensor::DenseTensor;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Run the backward pass from `output`, accumulating into leaf gradients.
///
/// `gradient` seeds the pass and must match the output's shape. It may be
/// omitted only for single-element outputs, in which case the seed is one.
///
/// Unless `retain_graph` is set, every saved tensor visited is released, and
/// a second pass through the same nodes fails with
/// [`TensorError::BackwardTwice`].
///
/// # Errors
///
/// - [`TensorError::InvalidOperation`] if `output` does not require grad, or
///   if `gradient` is omitted for a multi-element output.
/// - [`TensorError::IncompatibleShapes`] if `gradient` has the wrong shape.
/// - [`TensorError::BackwardTwice`] or [`TensorError::ModifiedInPlace`] from
///   unpacking saved tensors.
///
/// # Example
///
/// ```
/// use gradprobe::autodiff::{TrackedTensor, backward, clear_graph};
/// use gradprobe::Tensor;
///
/// clear_graph();
/// let x = TrackedTensor::leaf(Tensor::from_vec(vec![-1.0, 2.0], &[2]).unwrap());
/// let y = TrackedTensor::leaf(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
/// let z = x.mul(&y).unwrap().relu().add(&y).unwrap();
///
/// backward(&z, Some(&Tensor::ones(&[2])), false).unwrap();
/// assert_eq!(x.grad().unwrap().data(), &[0.0, 4.0]);
/// assert_eq!(y.grad().unwrap().data(), &[1.0, 3.0]);
/// ```
pub fn backward(
    output: &TrackedTensor<f64>,
    gradient: Option<&DenseTensor<f64>>,
    retain_graph: bool,
) -> Result<(), TensorError> {
    let root = match output.node_id() {
        Some(id) if output.requires_grad() => id,
        _ => {
            return Err(TensorError::InvalidOperation(
                "tensor does not require grad and does not have a grad_fn".to_string(),
            ));
        }
    };

    let seed = match gradient {
        Some(g) if g.shape() != output.shape() => {
            return Err(TensorError::IncompatibleShapes {
                lhs: output.shape().to_vec(),
                rhs: g.shape().to_vec(),
            });
        }
        Some(g) => g.clone(),
        None if output.len() == 1 => DenseTensor::ones(output.shape()),
        None => {
            return Err(TensorError::InvalidOperation(format!(
                "grad can be implicitly created only for single-element outputs, got {} elements",
                output.len()
            )));
        }
    };

    with_graph_f64(|graph| run_backward(graph, root, seed, retain_graph))
}

fn run_backward(
    graph: &mut ComputationGraph<f64>,
    root: NodeId,
    seed: DenseTensor<f64>,
    retain_graph: bool,
) -> Result<(), TensorError> {
    let order = topological_order(graph, root)?;
    log::debug!(
        "backward from node {} over {} nodes (retain_graph={})",
        root.index(),
        order.len(),
        retain_graph
    );

    let mut pending = Gradients::new();
    pending.accumulate(root, seed)?;

    for node_id in order {
        let Some(grad_output) = pending.remove(node_id) else {
            continue;
        };
        let Some(node) = graph.get_node(node_id) else {
            continue;
        };

        match node.grad_fn() {
            Some(grad_fn) => {
                let input_grads = grad_fn.backward(&grad_output)?;
                log::trace!("{} -> {} input grads", grad_fn.name(), input_grads.len());
                for (input_id, input_grad) in input_grads {
                    pending.accumulate(input_id, input_grad)?;
                }
                if !retain_graph {
                    if let Some(grad_fn) = graph.get_node_mut(node_id).and_then(|n| n.grad_fn_mut())
                    {
                        grad_fn.release_saved();
                    }
                }
            }
            None if node.requires_grad() => graph.accumulate_leaf(node_id, grad_output)?,
            None => {}
        }
    }

    Ok(())
}

/// Nodes reachable from `root`, each ordered before all of its inputs.
///
/// Shared inputs (diamonds) are visited once, after every consumer has
/// contributed its gradient.
fn topological_order(graph: &ComputationGraph<f64>, root: NodeId) -> Result<Vec<NodeId>, TensorError> {
    let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index_of: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut stack = vec![root];
    index_of.insert(root, dag.add_node(root));

    while let Some(node_id) = stack.pop() {
        let Some(grad_fn) = graph.get_node(node_id).and_then(|n| n.grad_fn()) else {
            continue;
        };
        let consumer = index_of[&node_id];
        for input_id in grad_fn.inputs() {
            let input = *index_of.entry(input_id).or_insert_with(|| {
                stack.push(input_id);
                dag.add_node(input_id)
            });
            // Edge from consumer to input (backward direction)
            dag.update_edge(consumer, input, ());
        }
    }

    let sorted = toposort(&dag, None).map_err(|cycle| {
        TensorError::InvalidOperation(format!(
            "computation graph has a cycle through node {}",
            dag[cycle.node_id()].index()
        ))
    })?;
    Ok(sorted.into_iter().map(|idx| dag[idx]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;
    use crate::autodiff::tensor::clear_graph;

    fn leaf(values: &[f64]) -> TrackedTensor<f64> {
        TrackedTensor::leaf(Tensor::from_vec(values.to_vec(), &[values.len()]).unwrap())
    }

    #[test]
    fn test_chain_rule() {
        clear_graph();
        let x = leaf(&[1.0, -2.0, 3.0]);
        let loss = x.mul(&x).unwrap().relu().sum();

        backward(&loss, None, false).unwrap();

        assert_eq!(x.grad().unwrap().data(), &[2.0, -4.0, 6.0]);
    }

    #[test]
    fn test_diamond_accumulates_shared_input() {
        clear_graph();
        let x = leaf(&[1.0, -1.0, 2.0]);
        let y = leaf(&[3.0, 5.0, -4.0]);
        // xy = [3, -5, -8]; relu mask = [1, 0, 0]
        let z = x.mul(&y).unwrap().relu().add(&y).unwrap();

        backward(&z, Some(&Tensor::ones(&[3])), false).unwrap();

        assert_eq!(x.grad().unwrap().data(), &[3.0, 0.0, 0.0]);
        assert_eq!(y.grad().unwrap().data(), &[2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_second_backward_without_retain_fails() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let loss = x.mul(&x).unwrap().sum();

        backward(&loss, None, false).unwrap();
        assert!(matches!(
            backward(&loss, None, false),
            Err(TensorError::BackwardTwice)
        ));
    }

    #[test]
    fn test_retain_graph_accumulates() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let loss = x.mul(&x).unwrap().sum();

        backward(&loss, None, true).unwrap();
        backward(&loss, None, true).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[4.0, 8.0]);

        x.zero_grad();
        backward(&loss, None, false).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[2.0, 4.0]);
    }

    #[test]
    fn test_modified_saved_input_is_detected() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let mut w = TrackedTensor::new(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
        let loss = x.mul(&w).unwrap().sum();

        w.fill_(0.0).unwrap();

        match backward(&loss, None, false) {
            Err(TensorError::ModifiedInPlace {
                current, expected, ..
            }) => {
                assert_eq!(current, 1);
                assert_eq!(expected, 0);
            }
            other => panic!("expected ModifiedInPlace, got {:?}", other),
        }
    }

    #[test]
    fn test_seed_shape_must_match() {
        clear_graph();
        let x = leaf(&[1.0, 2.0, 3.0]);
        let y = x.relu();
        assert!(matches!(
            backward(&y, Some(&Tensor::ones(&[2])), false),
            Err(TensorError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn test_implicit_seed_requires_single_element() {
        clear_graph();
        let x = leaf(&[1.0, 2.0, 3.0]);
        let y = x.relu();
        assert!(matches!(
            backward(&y, None, false),
            Err(TensorError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_untracked_output_rejected() {
        let t = TrackedTensor::new(Tensor::ones(&[1]));
        assert!(matches!(
            backward(&t, None, false),
            Err(TensorError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_backward_on_leaf_stores_seed() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let seed = Tensor::from_vec(vec![0.5, 0.25], &[2]).unwrap();
        backward(&x, Some(&seed), false).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[0.5, 0.25]);
    }

    #[test]
    fn test_untracked_operand_gets_no_grad() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let c = TrackedTensor::new(Tensor::from_vec(vec![2.0, 2.0], &[2]).unwrap());
        let loss = x.add(&c).unwrap().sum();
        backward(&loss, None, false).unwrap();
        assert_eq!(x.grad().unwrap().data(), &[1.0, 1.0]);
        assert!(c.grad().is_none());
    }
}
