use tg_tensor::DType;

use crate::backend::GemmBackend;
use crate::cpu::{DescriptorBackend, SgemmBackend};
use crate::error::{GemmError, Result};

static SGEMM: SgemmBackend = SgemmBackend::new();
static DESCRIPTOR: DescriptorBackend = DescriptorBackend::new();

/// Pick the backend that produces outputs of `dtype`: single precision goes
/// to [`SgemmBackend`], everything else to [`DescriptorBackend`].
pub fn select_backend(dtype: DType) -> &'static dyn GemmBackend {
    let backend: &'static dyn GemmBackend = match dtype {
        DType::F32 => &SGEMM,
        _ => &DESCRIPTOR,
    };
    log::debug!("selected {} backend for {} output", backend.name(), dtype);
    backend
}

/// Fail with `UnsupportedDType` unless `backend` can write `dtype`.
pub fn ensure_supported(backend: &dyn GemmBackend, dtype: DType) -> Result<()> {
    if backend.supports(dtype) {
        Ok(())
    } else {
        Err(GemmError::UnsupportedDType {
            backend: backend.name().to_string(),
            dtype,
        })
    }
}
