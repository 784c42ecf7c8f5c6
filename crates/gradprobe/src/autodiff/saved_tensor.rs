//! Saved tensor for backward pass.

use super::version::VersionCounter;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Byte length of the size prefix at the start of every blob.
pub const BLOB_PREFIX_BYTES: usize = std::mem::size_of::<u64>();

/// Snapshot of a forward value needed by a backward function.
///
/// Keeps the source tensor's [`VersionCounter`] and the version observed
/// when the snapshot was taken. Unpacking after the source was written in
/// place fails instead of silently producing wrong gradients.
#[derive(Debug, Clone)]
pub struct SavedTensor<T: Scalar> {
    /// Saved data; `None` once released by a non-retaining backward pass.
    data: Option<DenseTensor<T>>,
    version: VersionCounter,
    saved_version: u32,
    /// Human-readable provenance, e.g. `output 0 of MulBackward0`.
    origin: String,
}

impl<T: Scalar> SavedTensor<T> {
    /// Snapshot `tensor`, whose in-place writes are counted by `version`.
    pub fn new(tensor: &DenseTensor<T>, version: &VersionCounter, origin: impl Into<String>) -> Self {
        Self {
            data: Some(tensor.clone()),
            version: version.clone(),
            saved_version: version.current(),
            origin: origin.into(),
        }
    }

    /// Access the saved value for gradient computation.
    ///
    /// # Errors
    ///
    /// - [`TensorError::BackwardTwice`] if the data was released.
    /// - [`TensorError::ModifiedInPlace`] if the source tensor was written in
    ///   place after being saved.
    pub fn unpack(&self) -> Result<&DenseTensor<T>, TensorError> {
        let data = self.data.as_ref().ok_or(TensorError::BackwardTwice)?;
        let current = self.version.current();
        if current != self.saved_version {
            return Err(TensorError::ModifiedInPlace {
                what: format!("tensor of shape {:?}, which is {}", data.shape(), self.origin),
                current,
                expected: self.saved_version,
            });
        }
        Ok(data)
    }

    /// Free the saved data.
    pub fn release(&mut self) {
        self.data = None;
    }

    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }

    /// Version of the source tensor at save time.
    pub fn saved_version(&self) -> u32 {
        self.saved_version
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Overwrite the saved data in place.
    ///
    /// The saved version is left untouched, so the graph can be replayed with
    /// new values without tripping the in-place check.
    pub fn copy_data_from(&mut self, source: &DenseTensor<T>) -> Result<(), TensorError> {
        let data = self.data.as_mut().ok_or(TensorError::BackwardTwice)?;
        if data.shape() != source.shape() {
            return Err(TensorError::IncompatibleShapes {
                lhs: data.shape().to_vec(),
                rhs: source.shape().to_vec(),
            });
        }
        data.data_mut().copy_from_slice(source.data());
        Ok(())
    }
}

impl SavedTensor<f64> {
    /// Encode the saved data as a blob.
    ///
    /// Layout: payload byte length as a little-endian `u64`, then each
    /// element as a little-endian `f64` in storage order.
    pub fn serialize_to_blob(&self) -> Result<Vec<u8>, TensorError> {
        let data = self.data.as_ref().ok_or(TensorError::BackwardTwice)?;
        let mut blob = Vec::with_capacity(BLOB_PREFIX_BYTES + data.nbytes());
        blob.extend_from_slice(&(data.nbytes() as u64).to_le_bytes());
        for x in data.data() {
            blob.extend_from_slice(&x.to_le_bytes());
        }
        log::trace!("serialized {} ({} bytes)", self.origin, data.nbytes());
        Ok(blob)
    }

    /// Check that `blob` can be loaded into this saved tensor, returning
    /// its payload.
    ///
    /// # Errors
    ///
    /// - [`TensorError::MalformedBlob`] if the blob is shorter than its
    ///   size prefix or its declared payload.
    /// - [`TensorError::BlobSizeMismatch`] if the declared payload size is
    ///   not this tensor's byte size.
    /// - [`TensorError::BackwardTwice`] if the data was released.
    pub fn check_blob<'a>(&self, blob: &'a [u8]) -> Result<&'a [u8], TensorError> {
        let malformed = || TensorError::MalformedBlob { len: blob.len() };
        let (prefix, payload) = blob
            .split_first_chunk::<BLOB_PREFIX_BYTES>()
            .ok_or_else(malformed)?;
        let declared = u64::from_le_bytes(*prefix) as usize;

        let data = self.data.as_ref().ok_or(TensorError::BackwardTwice)?;
        if declared != data.nbytes() {
            return Err(TensorError::BlobSizeMismatch {
                expected: data.nbytes(),
                actual: declared,
            });
        }
        payload.get(..declared).ok_or_else(malformed)
    }

    /// Restore the saved data from a blob produced by
    /// [`serialize_to_blob`](Self::serialize_to_blob).
    ///
    /// The blob is validated with [`check_blob`](Self::check_blob) first; on
    /// error the saved data is left unchanged.
    pub fn deserialize_from_blob(&mut self, blob: &[u8]) -> Result<(), TensorError> {
        let payload = self.check_blob(blob)?;
        let data = self.data.as_mut().ok_or(TensorError::BackwardTwice)?;
        for (dst, chunk) in data.data_mut().iter_mut().zip(payload.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *dst = f64::from_le_bytes(bytes);
        }
        log::trace!("restored {} from {} byte blob", self.origin, blob.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;

    fn saved(values: Vec<f64>) -> (SavedTensor<f64>, VersionCounter) {
        let version = VersionCounter::new();
        let n = values.len();
        let t: DenseTensor<f64> = Tensor::from_vec(values, &[n]).unwrap();
        (SavedTensor::new(&t, &version, "leaf tensor"), version)
    }

    #[test]
    fn test_unpack_fresh() {
        let (s, _) = saved(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.unpack().unwrap().data(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.saved_version(), 0);
    }

    #[test]
    fn test_unpack_after_release() {
        let (mut s, _) = saved(vec![1.0]);
        s.release();
        assert!(s.is_released());
        assert!(matches!(s.unpack(), Err(TensorError::BackwardTwice)));
    }

    #[test]
    fn test_unpack_after_inplace_write() {
        let (s, version) = saved(vec![1.0, 2.0]);
        version.bump();
        match s.unpack() {
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
    fn test_copy_data_from_keeps_version() {
        let (mut s, version) = saved(vec![1.0, 2.0]);
        let replacement: DenseTensor<f64> = Tensor::from_vec(vec![7.0, 8.0], &[2]).unwrap();
        s.copy_data_from(&replacement).unwrap();
        assert_eq!(version.current(), 0);
        assert_eq!(s.unpack().unwrap().data(), &[7.0, 8.0]);

        let wrong: DenseTensor<f64> = Tensor::zeros(&[3]);
        assert!(s.copy_data_from(&wrong).is_err());
    }

    #[test]
    fn test_blob_layout() {
        let (s, _) = saved(vec![1.5, -2.0]);
        let blob = s.serialize_to_blob().unwrap();
        assert_eq!(blob.len(), BLOB_PREFIX_BYTES + 16);
        assert_eq!(&blob[..8], &16u64.to_le_bytes());
        assert_eq!(&blob[8..16], &1.5f64.to_le_bytes());
    }

    #[test]
    fn test_blob_restores_into_other_tensor() {
        let (source, _) = saved(vec![4.0, 5.0, 6.0]);
        let (mut target, _) = saved(vec![0.0, 0.0, 0.0]);
        let blob = source.serialize_to_blob().unwrap();
        target.deserialize_from_blob(&blob).unwrap();
        assert_eq!(target.unpack().unwrap().data(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_blob_size_mismatch() {
        let (source, _) = saved(vec![1.0, 2.0]);
        let (mut target, _) = saved(vec![0.0, 0.0, 0.0]);
        let blob = source.serialize_to_blob().unwrap();
        assert!(matches!(
            target.deserialize_from_blob(&blob),
            Err(TensorError::BlobSizeMismatch {
                expected: 24,
                actual: 16
            })
        ));
        assert_eq!(target.unpack().unwrap().data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_check_blob_does_not_modify() {
        let (source, _) = saved(vec![1.0, 2.0, 3.0]);
        let (target, _) = saved(vec![0.0, 0.0, 0.0]);
        let blob = source.serialize_to_blob().unwrap();
        assert_eq!(target.check_blob(&blob).unwrap().len(), 24);
        assert_eq!(target.unpack().unwrap().data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_blob_truncated() {
        let (source, _) = saved(vec![1.0, 2.0]);
        let (mut target, _) = saved(vec![0.0, 0.0]);
        let blob = source.serialize_to_blob().unwrap();
        assert!(matches!(
            target.deserialize_from_blob(&blob[..12]),
            Err(TensorError::MalformedBlob { len: 12 })
        ));
        assert!(matches!(
            target.deserialize_from_blob(&blob[..4]),
            Err(TensorError::MalformedBlob { len: 4 })
        ));
    }
}
