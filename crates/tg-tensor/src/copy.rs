//! Strided copy into freshly allocated, row-major destinations.

use half::{bf16, f16};

use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use crate::tensor::Tensor;

/// How the source is read when filling the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyType {
    /// The source holds a single distinct element, written to every position.
    Scalar,
    /// The source is broadcast to the destination's shape and gathered
    /// element by element through its strides.
    General,
}

/// Allocate `dst` as a contiguous buffer of its own shape and fill it from
/// `src`.
///
/// No dtype conversion is performed: `src` and `dst` must share a dtype.
pub fn copy(src: &Tensor, dst: &mut Tensor, ctype: CopyType) -> Result<()> {
    if src.dtype() != dst.dtype() {
        return Err(TensorError::DTypeMismatch {
            expected: dst.dtype().to_string(),
            got: src.dtype().to_string(),
        });
    }
    match ctype {
        CopyType::Scalar => {
            if src.numel() == 0 && dst.numel() != 0 {
                return Err(TensorError::Other(
                    "scalar copy from an empty tensor".to_string(),
                ));
            }
            dst.allocate();
            if dst.numel() == 0 {
                return Ok(());
            }
            match src.dtype() {
                DType::Bool => fill_scalar::<bool>(src, dst),
                DType::F16 => fill_scalar::<f16>(src, dst),
                DType::BF16 => fill_scalar::<bf16>(src, dst),
                DType::F32 => fill_scalar::<f32>(src, dst),
                DType::F64 => fill_scalar::<f64>(src, dst),
            }
        }
        CopyType::General => {
            let view = src.broadcast_to(dst.shape())?;
            dst.allocate();
            match src.dtype() {
                DType::Bool => gather::<bool>(&view, dst),
                DType::F16 => gather::<f16>(&view, dst),
                DType::BF16 => gather::<bf16>(&view, dst),
                DType::F32 => gather::<f32>(&view, dst),
                DType::F64 => gather::<f64>(&view, dst),
            }
        }
    }
}

fn fill_scalar<T: Element>(src: &Tensor, dst: &mut Tensor) -> Result<()> {
    let value = src.storage().as_slice::<T>()?[src.offset()];
    dst.storage_mut().as_slice_mut::<T>()?.fill(value);
    Ok(())
}

fn gather<T: Element>(src: &Tensor, dst: &mut Tensor) -> Result<()> {
    let data = src.storage().as_slice::<T>()?;
    let out = dst.storage_mut().as_slice_mut::<T>()?;
    for (o, loc) in out.iter_mut().zip(src.offsets()) {
        *o = data[loc];
    }
    Ok(())
}
