//! `tg-tensor` - Strided tensor type for the tensor-gemm workspace.
//!
//! This crate provides:
//! - A `Tensor` view (shape, signed strides, offset) over shared CPU storage
//! - Data type definitions (bool, f16, bf16, f32, f64) and the `Element` trait
//! - Shape utilities, broadcasting and generalized index-to-offset mapping
//! - A strided copy utility used to materialize non-contiguous views

pub mod copy;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use copy::{copy, CopyType};
pub use dtype::{DType, Element};
pub use error::{Result, TensorError};
pub use shape::{elem_to_loc, Shape};
pub use storage::CpuStorage;
pub use tensor::Tensor;
