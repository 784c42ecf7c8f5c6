//! Gradient storage container.

use super::graph::NodeId;
use crate::error::TensorError;
use crate::operations::{apply_binary, apply_inplace};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::collections::HashMap;
use std::ops::Add;

/// Gradients keyed by [`NodeId`].
///
/// Used twice: for gradients still flowing during a backward pass, and as
/// the per-leaf accumulator that persists across backward calls.
#[derive(Debug)]
pub struct Gradients<T: Scalar> {
    grads: HashMap<NodeId, DenseTensor<T>>,
}

impl<T: Scalar + Add<Output = T>> Gradients<T> {
    pub fn new() -> Self {
        Self {
            grads: HashMap::new(),
        }
    }

    /// Add `grad` into the entry for `id`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IncompatibleShapes`] if an existing entry has a
    /// different shape.
    pub fn accumulate(&mut self, id: NodeId, grad: DenseTensor<T>) -> Result<(), TensorError> {
        match self.grads.get_mut(&id) {
            Some(existing) => *existing = apply_binary(existing, &grad, |a, b| a + b)?,
            None => {
                self.grads.insert(id, grad);
            }
        }
        Ok(())
    }

    /// Reset an entry to zeros, keeping its shape.
    pub fn zero(&mut self, id: NodeId) {
        if let Some(grad) = self.grads.get_mut(&id) {
            apply_inplace(grad, |_| T::zero());
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&DenseTensor<T>> {
        self.grads.get(&id)
    }

    /// Remove and return gradient (for passing to backward functions).
    pub fn remove(&mut self, id: NodeId) -> Option<DenseTensor<T>> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn clear(&mut self) {
        self.grads.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &DenseTensor<T>)> {
        self.grads.iter()
    }
}

impl<T: Scalar + Add<Output = T>> Default for Gradients<T> {
    fn default() -> Self {
        Self::new()
    }
}
