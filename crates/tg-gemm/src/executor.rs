//! Batched, transpose-aware GEMM over strided tensors.

use tg_tensor::{copy, elem_to_loc, CopyType, Tensor, TensorError};

use crate::backend::{GemmBackend, GemmParams};
use crate::config::GemmOptions;
use crate::dispatch::ensure_supported;
use crate::error::{GemmError, Result};
use crate::layout::check_transpose;

/// `out = alpha * A @ B + beta * out` for every batch slice of `A` and `B`.
///
/// `out` must be a dense row-major buffer of `batch * M * N` elements whose
/// dtype `backend` supports; `A` and `B` may be any strided views of the
/// same dtype. Empty products leave `out` untouched, and an empty reduction
/// (`K == 0`) zero-fills it without calling the backend.
pub fn matmul_general(
    backend: &dyn GemmBackend,
    a_pre: &Tensor,
    b_pre: &Tensor,
    out: &mut Tensor,
    options: GemmOptions,
) -> Result<()> {
    let dtype = out.dtype();
    ensure_supported(backend, dtype)?;
    let ProblemSize { batch, m, n, k } = check_operands(a_pre, b_pre, out)?;
    if !out.is_contiguous() || out.storage().len() != out.numel() {
        return Err(GemmError::Other(format!(
            "matmul output {} must be a dense row-major buffer",
            out.shape()
        )));
    }

    let a_layout = check_transpose(a_pre)?;
    let b_layout = check_transpose(b_pre)?;
    let a = &a_layout.operand;
    let b = &b_layout.operand;

    if m == 0 || n == 0 {
        return Ok(());
    }
    if k == 0 {
        out.storage_mut().fill_zero();
        return Ok(());
    }

    let params = GemmParams {
        dtype,
        m,
        n,
        k,
        trans_a: a_layout.transposed,
        trans_b: b_layout.transposed,
        lda: a_layout.leading_dim,
        ldb: b_layout.leading_dim,
        ldc: n,
        alpha: options.alpha,
        beta: options.beta,
    };
    log::trace!(
        "{}: {} x [{}x{}] @ [{}x{}] (trans_a={}, trans_b={})",
        backend.name(),
        batch,
        m,
        k,
        k,
        n,
        params.trans_a,
        params.trans_b
    );

    let mut kernel = backend.prepare(&params)?;
    let out_storage = out.storage_mut();
    for i in 0..batch {
        let a_offset = batch_offset(a, m * k * i)?;
        let b_offset = batch_offset(b, k * n * i)?;
        kernel.apply(
            a.storage(),
            a_offset,
            b.storage(),
            b_offset,
            out_storage,
            m * n * i,
        )?;
    }
    Ok(())
}

/// Seed `out` with `C`, then accumulate `alpha * A @ B` onto `beta * C`.
///
/// `C` is either a single element broadcast everywhere or anything that
/// broadcasts to `out`'s shape. With `K == 0` the result is zero whatever
/// `beta` is, since the empty reduction overwrites the seeded output.
pub fn addmm_general(
    backend: &dyn GemmBackend,
    a: &Tensor,
    b: &Tensor,
    c: &Tensor,
    out: &mut Tensor,
    options: GemmOptions,
) -> Result<()> {
    ensure_supported(backend, out.dtype())?;
    check_operands(a, b, out)?;
    let ctype = if c.data_size() == 1 {
        CopyType::Scalar
    } else {
        CopyType::General
    };
    copy(c, out, ctype)?;
    matmul_general(backend, a, b, out, options)
}

struct ProblemSize {
    batch: usize,
    m: usize,
    n: usize,
    k: usize,
}

/// Dtype, rank and shape agreement of `A @ B -> out`. Reads only `out`'s
/// shape and dtype, so it can run before `out` is seeded.
fn check_operands(a: &Tensor, b: &Tensor, out: &Tensor) -> Result<ProblemSize> {
    let dtype = out.dtype();
    for operand in [a, b] {
        if operand.dtype() != dtype {
            return Err(TensorError::DTypeMismatch {
                expected: dtype.to_string(),
                got: operand.dtype().to_string(),
            }
            .into());
        }
        if operand.ndim() < 2 {
            return Err(TensorError::Other(format!(
                "matmul operands need at least 2 dimensions, got {}",
                operand.shape()
            ))
            .into());
        }
    }

    let m = a.shape().rdim(2);
    let k = a.shape().rdim(1);
    let k2 = b.shape().rdim(2);
    let n = b.shape().rdim(1);
    if k != k2 {
        return Err(TensorError::MatmulMismatch { m, k, k2, n }.into());
    }

    let batch: usize = a.shape().dims()[..a.ndim() - 2].iter().product();
    // empty products never write, so their output shape is not checked
    if m != 0 && n != 0 && out.numel() != batch * m * n {
        return Err(TensorError::ShapeMismatch {
            expected: vec![batch, m, n],
            got: out.shape().dims().to_vec(),
        }
        .into());
    }
    Ok(ProblemSize { batch, m, n, k })
}

/// Storage offset of the `elem`-th logical element of `t`.
fn batch_offset(t: &Tensor, elem: usize) -> Result<usize> {
    let loc = t.offset() as isize + elem_to_loc(elem, t.shape().dims(), t.strides());
    usize::try_from(loc)
        .map_err(|_| GemmError::Other(format!("negative element offset {loc} in {}", t.shape())))
}
