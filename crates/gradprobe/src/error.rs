//! Error types for gradprobe.

use thiserror::Error;

/// Errors that can occur in tensor and autodiff operations.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Data length does not match the element count implied by a shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Two operands of an element-wise operation have different shapes.
    #[error("incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Operation is not valid for the given tensors or graph state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Saved tensors were already released by an earlier backward pass.
    #[error(
        "trying to backward through the graph a second time, but the saved tensors have \
         already been freed; pass retain_graph = true to the first backward call"
    )]
    BackwardTwice,

    /// A tensor saved for backward was modified in place after it was saved.
    #[error(
        "one of the variables needed for gradient computation has been modified by an \
         inplace operation: {what} is at version {current}; expected version {expected} instead"
    )]
    ModifiedInPlace {
        what: String,
        current: u32,
        expected: u32,
    },

    /// Blob size prefix does not match the byte size of the saved tensor.
    #[error("blob size mismatch: saved tensor holds {expected} bytes, blob declares {actual}")]
    BlobSizeMismatch { expected: usize, actual: usize },

    /// Blob is too short to hold its size prefix or declared payload.
    #[error("malformed blob of {len} bytes")]
    MalformedBlob { len: usize },
}
