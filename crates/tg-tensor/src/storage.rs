use half::{bf16, f16};

use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};

/// CPU-side tensor storage, one variant per supported dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    Bool(Vec<bool>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::Bool(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
            CpuStorage::BF16(v) => v.len(),
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::Bool(_) => DType::Bool,
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::BF16(_) => DType::BF16,
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::Bool => CpuStorage::Bool(vec![false; n]),
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
            DType::BF16 => CpuStorage::BF16(vec![bf16::ZERO; n]),
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
            DType::F64 => CpuStorage::F64(vec![0.0; n]),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Returns the data as a typed slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if `T` is not the storage's element type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(self).ok_or_else(|| TensorError::DTypeMismatch {
            expected: T::DTYPE.to_string(),
            got: self.dtype().to_string(),
        })
    }

    /// Returns the data as a mutable typed slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if `T` is not the storage's element type.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let got = self.dtype();
        T::slice_mut(self).ok_or_else(|| TensorError::DTypeMismatch {
            expected: T::DTYPE.to_string(),
            got: got.to_string(),
        })
    }

    /// Returns the data as an f32 slice.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        self.as_slice::<f32>()
    }

    /// Returns the data as a mutable f32 slice.
    pub fn as_f32_slice_mut(&mut self) -> Result<&mut [f32]> {
        self.as_slice_mut::<f32>()
    }

    /// Overwrites every element with zero.
    pub fn fill_zero(&mut self) {
        match self {
            CpuStorage::Bool(v) => v.fill(false),
            CpuStorage::F16(v) => v.fill(f16::ZERO),
            CpuStorage::BF16(v) => v.fill(bf16::ZERO),
            CpuStorage::F32(v) => v.fill(0.0),
            CpuStorage::F64(v) => v.fill(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_vec() {
        let s = CpuStorage::from_f32_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zeros() {
        let s = CpuStorage::zeros(DType::F32, 5);
        assert_eq!(s.len(), 5);
        assert_eq!(s.as_f32_slice().unwrap(), &[0.0; 5]);

        let s = CpuStorage::zeros(DType::BF16, 2);
        assert_eq!(s.dtype(), DType::BF16);
        assert_eq!(s.as_slice::<bf16>().unwrap(), &[bf16::ZERO; 2]);
    }

    #[test]
    fn test_wrong_type_access() {
        let mut s = CpuStorage::zeros(DType::F64, 2);
        assert!(s.as_f32_slice().is_err());
        assert!(s.as_slice_mut::<f16>().is_err());
        assert!(s.as_slice::<f64>().is_ok());
    }

    #[test]
    fn test_mut_slice_and_fill_zero() {
        let mut s = CpuStorage::from_f32_vec(vec![1.0, 2.0]);
        let slice = s.as_f32_slice_mut().unwrap();
        slice[0] = 42.0;
        assert_eq!(s.as_f32_slice().unwrap()[0], 42.0);
        s.fill_zero();
        assert_eq!(s.as_f32_slice().unwrap(), &[0.0, 0.0]);
    }
}
