use std::fmt::Debug;

use tg_tensor::{CpuStorage, DType};

use crate::error::{GemmError, Result};

/// Parameters of one GEMM call, shared by every batch slice.
///
/// Operands follow the row-major BLAS convention: a non-transposed operand
/// stores `rows` rows of `ld` elements, a transposed one stores the matrix
/// column by column with `ld` elements per column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmParams {
    pub dtype: DType,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub trans_a: bool,
    pub trans_b: bool,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
    pub alpha: f32,
    pub beta: f32,
}

impl GemmParams {
    /// `(row_stride, col_stride)` of the logical `m x k` left operand.
    pub fn a_strides(&self) -> (isize, isize) {
        matrix_strides(self.lda, self.trans_a)
    }

    /// `(row_stride, col_stride)` of the logical `k x n` right operand.
    pub fn b_strides(&self) -> (isize, isize) {
        matrix_strides(self.ldb, self.trans_b)
    }

    /// Elements one slice of A spans, counted from its first element.
    pub fn a_extent(&self) -> usize {
        matrix_extent(self.m, self.k, self.lda, self.trans_a)
    }

    pub fn b_extent(&self) -> usize {
        matrix_extent(self.k, self.n, self.ldb, self.trans_b)
    }

    pub fn out_extent(&self) -> usize {
        matrix_extent(self.m, self.n, self.ldc, false)
    }
}

fn matrix_strides(ld: usize, transposed: bool) -> (isize, isize) {
    if transposed {
        (1, ld as isize)
    } else {
        (ld as isize, 1)
    }
}

fn matrix_extent(rows: usize, cols: usize, ld: usize, transposed: bool) -> usize {
    if rows == 0 || cols == 0 {
        return 0;
    }
    if transposed {
        (cols - 1) * ld + rows
    } else {
        (rows - 1) * ld + cols
    }
}

/// Fails unless `offset + extent` fits in a buffer of `len` elements.
pub(crate) fn check_extent(operand: &str, len: usize, offset: usize, extent: usize) -> Result<()> {
    match offset.checked_add(extent) {
        Some(end) if end <= len => Ok(()),
        _ => Err(GemmError::Other(format!(
            "{operand}: slice [{offset}, {offset}+{extent}) exceeds buffer of {len} elements"
        ))),
    }
}

/// A dense GEMM provider the batched executor can dispatch to.
///
/// Backends are stateless; any per-call state lives in the [`GemmKernel`]
/// returned by [`GemmBackend::prepare`] and is released when it is dropped.
pub trait GemmBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "sgemm", "descriptor").
    fn name(&self) -> &str;

    /// Whether this backend can produce outputs of `dtype`.
    fn supports(&self, dtype: DType) -> bool;

    /// Build a kernel for `params`, valid for every batch slice of one call.
    fn prepare(&self, params: &GemmParams) -> Result<Box<dyn GemmKernel>>;
}

/// A prepared GEMM, applied once per batch slice.
pub trait GemmKernel {
    /// `out[out_offset..] = alpha * op(A) @ op(B) + beta * out[out_offset..]`
    /// for the slices starting at the given element offsets.
    fn apply(
        &mut self,
        a: &CpuStorage,
        a_offset: usize,
        b: &CpuStorage,
        b_offset: usize,
        out: &mut CpuStorage,
        out_offset: usize,
    ) -> Result<()>;
}
