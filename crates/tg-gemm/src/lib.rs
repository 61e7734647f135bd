//! `tg-gemm` - Batched matrix multiplication over strided tensors.
//!
//! This crate provides:
//! - A `GemmBackend` trait with a single-precision `SgemmBackend` and a
//!   descriptor-based `DescriptorBackend` for f16, bf16, f32 and f64
//! - Operand layout normalization (`check_transpose`) and the batched
//!   `matmul_general` / `addmm_general` executors
//! - `Matmul`, `AddMM` and `BlockMaskedMM` primitives with tensor-level
//!   `matmul`, `addmm` and `block_masked_matmul` helpers
//! - Block tile masking (`mask_matrix`, `mask_tiles`)

pub mod backend;
pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod layout;
pub mod mask;
pub mod ops;

// Re-export primary types at the crate root for convenience.
pub use backend::{GemmBackend, GemmKernel, GemmParams};
pub use config::GemmOptions;
pub use cpu::{DescriptorBackend, SgemmBackend};
pub use dispatch::{ensure_supported, select_backend};
pub use error::{GemmError, Result};
pub use executor::{addmm_general, matmul_general};
pub use layout::{check_transpose, MatrixLayout};
pub use mask::{mask_matrix, mask_tiles};
pub use ops::{addmm, block_masked_matmul, matmul, AddMM, BlockMaskedMM, Matmul, Primitive};
