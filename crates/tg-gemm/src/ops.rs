//! Matmul primitives and tensor-level entry points.

use std::fmt::Debug;

use tg_tensor::{Shape, Tensor, TensorError};

use crate::config::GemmOptions;
use crate::dispatch::{ensure_supported, select_backend};
use crate::error::{GemmError, Result};
use crate::executor::{addmm_general, matmul_general};
use crate::mask::mask_tiles;

/// A compute node evaluated on the CPU into a caller-supplied output.
///
/// `out` carries the result shape and dtype; its storage is replaced.
pub trait Primitive: Debug {
    fn name(&self) -> &str;

    fn eval_cpu(&self, inputs: &[Tensor], out: &mut Tensor) -> Result<()>;
}

fn check_arity(op: &dyn Primitive, inputs: &[Tensor], allowed: &[usize]) -> Result<()> {
    if allowed.contains(&inputs.len()) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(GemmError::InvalidArity {
        op: op.name().to_string(),
        expected,
        got: inputs.len(),
    })
}

/// `out = A @ B` over inputs `[A, B]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matmul;

impl Primitive for Matmul {
    fn name(&self) -> &str {
        "Matmul"
    }

    fn eval_cpu(&self, inputs: &[Tensor], out: &mut Tensor) -> Result<()> {
        check_arity(self, inputs, &[2])?;
        let backend = select_backend(out.dtype());
        ensure_supported(backend, out.dtype())?;
        out.allocate();
        matmul_general(backend, &inputs[0], &inputs[1], out, GemmOptions::default())
    }
}

/// `out = alpha * A @ B + beta * C` over inputs `[A, B, C]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddMM {
    pub alpha: f32,
    pub beta: f32,
}

impl AddMM {
    pub fn new(alpha: f32, beta: f32) -> Self {
        AddMM { alpha, beta }
    }
}

impl Primitive for AddMM {
    fn name(&self) -> &str {
        "AddMM"
    }

    fn eval_cpu(&self, inputs: &[Tensor], out: &mut Tensor) -> Result<()> {
        check_arity(self, inputs, &[3])?;
        let backend = select_backend(out.dtype());
        addmm_general(
            backend,
            &inputs[0],
            &inputs[1],
            &inputs[2],
            out,
            GemmOptions::new(self.alpha, self.beta),
        )
    }
}

/// Block-sparse matmul over inputs `[A, B, out_mask]` or
/// `[A, B, out_mask, lhs_mask, rhs_mask]`.
///
/// Operand masks zero `block_size` tiles of copies of `A` and `B` before the
/// product; `out_mask` zeroes tiles of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMaskedMM {
    pub block_size: usize,
}

impl BlockMaskedMM {
    pub fn new(block_size: usize) -> Self {
        BlockMaskedMM { block_size }
    }
}

impl Primitive for BlockMaskedMM {
    fn name(&self) -> &str {
        "BlockMaskedMM"
    }

    fn eval_cpu(&self, inputs: &[Tensor], out: &mut Tensor) -> Result<()> {
        check_arity(self, inputs, &[3, 5])?;
        let backend = select_backend(out.dtype());
        ensure_supported(backend, out.dtype())?;

        let mut a = inputs[0].contiguous()?;
        let mut b = inputs[1].contiguous()?;
        if inputs.len() == 5 {
            mask_tiles(&mut a, &inputs[3], self.block_size)?;
            mask_tiles(&mut b, &inputs[4], self.block_size)?;
        }

        out.allocate();
        matmul_general(backend, &a, &b, out, GemmOptions::default())?;
        mask_tiles(out, &inputs[2], self.block_size)
    }
}

/// Broadcast the batch dimensions of `a` and `b` against each other and
/// return both views along with the output shape.
fn broadcast_operands(a: &Tensor, b: &Tensor) -> Result<(Tensor, Tensor, Shape)> {
    if a.ndim() < 2 || b.ndim() < 2 {
        return Err(GemmError::Other(format!(
            "matmul requires at least 2D operands, got {} and {}",
            a.shape(),
            b.shape()
        )));
    }
    let (m, k) = (a.shape().rdim(2), a.shape().rdim(1));
    let (k2, n) = (b.shape().rdim(2), b.shape().rdim(1));
    if k != k2 {
        return Err(TensorError::MatmulMismatch { m, k, k2, n }.into());
    }

    let a_batch = Shape::from_slice(&a.shape().dims()[..a.ndim() - 2]);
    let b_batch = Shape::from_slice(&b.shape().dims()[..b.ndim() - 2]);
    let batch = Shape::broadcast_shape(&a_batch, &b_batch)?;
    let with_matrix = |rows: usize, cols: usize| {
        let mut dims = batch.dims().to_vec();
        dims.extend([rows, cols]);
        Shape::new(dims)
    };

    Ok((
        a.broadcast_to(&with_matrix(m, k))?,
        b.broadcast_to(&with_matrix(k, n))?,
        with_matrix(m, n),
    ))
}

/// `A @ B` with numpy-style batch broadcasting, in the operands' dtype.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let (a, b, shape) = broadcast_operands(a, b)?;
    let mut out = Tensor::zeros_with(shape, a.dtype());
    Matmul.eval_cpu(&[a, b], &mut out)?;
    Ok(out)
}

/// `alpha * A @ B + beta * C`, with `C` broadcast to the product's shape.
pub fn addmm(c: &Tensor, a: &Tensor, b: &Tensor, alpha: f32, beta: f32) -> Result<Tensor> {
    let (a, b, shape) = broadcast_operands(a, b)?;
    let mut out = Tensor::zeros_with(shape, a.dtype());
    AddMM::new(alpha, beta).eval_cpu(&[a, b, c.clone()], &mut out)?;
    Ok(out)
}

/// `A @ B` with `block_size` tiles zeroed according to `out_mask` and,
/// optionally, `(lhs_mask, rhs_mask)` applied to the operands first.
pub fn block_masked_matmul(
    a: &Tensor,
    b: &Tensor,
    block_size: usize,
    out_mask: &Tensor,
    operand_masks: Option<(&Tensor, &Tensor)>,
) -> Result<Tensor> {
    let (a, b, shape) = broadcast_operands(a, b)?;
    let mut out = Tensor::zeros_with(shape, a.dtype());
    let mut inputs = vec![a, b, out_mask.clone()];
    if let Some((lhs, rhs)) = operand_masks {
        inputs.push(lhs.clone());
        inputs.push(rhs.clone());
    }
    BlockMaskedMM::new(block_size).eval_cpu(&inputs, &mut out)?;
    Ok(out)
}
