use std::fmt;

use half::{bf16, f16};

use crate::storage::CpuStorage;

/// Supported element types for tensor storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Boolean, used for tile masks.
    Bool,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 16-bit brain floating point (via the `half` crate).
    BF16,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Bool => write!(f, "bool"),
            DType::F16 => write!(f, "f16"),
            DType::BF16 => write!(f, "bf16"),
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}

/// A Rust scalar type that can live in a [`CpuStorage`].
///
/// Ties each element type to its `DType` tag and its storage variant, so that
/// kernels can be written once and instantiated per dtype.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    /// The additive zero (`false` for `bool`).
    fn zero() -> Self {
        Self::default()
    }

    fn slice(storage: &CpuStorage) -> Option<&[Self]>;

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]>;

    fn into_storage(data: Vec<Self>) -> CpuStorage;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::Bool(data)
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::F16(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::F16(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::F16(data)
    }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BF16;

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::BF16(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::BF16(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::BF16(data)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::F32(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::F32(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::F32(data)
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::F64(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::F64(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::F64(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DType::F32.to_string(), "f32");
        assert_eq!(DType::BF16.to_string(), "bf16");
    }

    #[test]
    fn test_element_storage_mapping() {
        let s = f16::into_storage(vec![f16::from_f32(1.5)]);
        assert_eq!(s.dtype(), DType::F16);
        assert!(f32::slice(&s).is_none());
        assert_eq!(f16::slice(&s).unwrap()[0].to_f32(), 1.5);
        assert!(!bool::zero());
        assert_eq!(f64::zero(), 0.0);
    }
}
