use tg_tensor::{CpuStorage, DType};

use super::sgemm_slices;
use crate::backend::{GemmBackend, GemmKernel, GemmParams};
use crate::error::{GemmError, Result};

/// Single precision BLAS-style backend.
///
/// Takes row- or column-major dense f32 matrices with explicit leading
/// dimensions and alpha/beta, and runs them through `matrixmultiply::sgemm`.
/// Any other output dtype is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SgemmBackend;

impl SgemmBackend {
    pub const fn new() -> Self {
        SgemmBackend
    }
}

impl GemmBackend for SgemmBackend {
    fn name(&self) -> &str {
        "sgemm"
    }

    fn supports(&self, dtype: DType) -> bool {
        dtype == DType::F32
    }

    fn prepare(&self, params: &GemmParams) -> Result<Box<dyn GemmKernel>> {
        if !self.supports(params.dtype) {
            return Err(GemmError::UnsupportedDType {
                backend: self.name().to_string(),
                dtype: params.dtype,
            });
        }
        Ok(Box::new(SgemmKernel { params: *params }))
    }
}

struct SgemmKernel {
    params: GemmParams,
}

impl GemmKernel for SgemmKernel {
    fn apply(
        &mut self,
        a: &CpuStorage,
        a_offset: usize,
        b: &CpuStorage,
        b_offset: usize,
        out: &mut CpuStorage,
        out_offset: usize,
    ) -> Result<()> {
        let a = a.as_f32_slice()?;
        let b = b.as_f32_slice()?;
        let out = out.as_f32_slice_mut()?;
        sgemm_slices(
            &self.params,
            a.get(a_offset..).unwrap_or_default(),
            b.get(b_offset..).unwrap_or_default(),
            out.get_mut(out_offset..).unwrap_or_default(),
        )
    }
}
