//! Descriptor-driven GEMM backend.
//!
//! Each call describes its operands with dtype-tagged [`ArrayDescriptor`]s,
//! builds a [`MatMulFilter`] from them, applies the filter once per batch
//! slice and releases it afterwards. Half precision inputs are widened into
//! scratch buffers owned by the filter.
//!
//! Batch broadcasting is not handled here: every slice is described by the
//! same descriptors, so callers must pass compatible shapes.

use half::{bf16, f16};
use tg_tensor::{CpuStorage, DType, Element};

use super::{dgemm_slices, sgemm_slices};
use crate::backend::{GemmBackend, GemmKernel, GemmParams};
use crate::error::{GemmError, Result};

pub const MAX_TENSOR_DIMENSION: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLayout {
    /// `size = [cols, rows]`, `stride = [1, ld]`.
    RowMajorMatrix,
}

/// Shape, stride and element type of one operand.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    pub layout: DataLayout,
    pub size: [usize; MAX_TENSOR_DIMENSION],
    pub stride: [usize; MAX_TENSOR_DIMENSION],
    pub data_type: DType,
    /// Element type of a lookup table, for table-encoded data types.
    pub table_data_type: Option<DType>,
    pub data_scale: f32,
    pub data_bias: f32,
}

impl ArrayDescriptor {
    /// A dense row-major matrix of `count` elements stored `ld` per row.
    pub fn row_major_matrix(ld: usize, count: usize, data_type: DType) -> Self {
        let mut size = [0; MAX_TENSOR_DIMENSION];
        let mut stride = [0; MAX_TENSOR_DIMENSION];
        size[0] = ld;
        size[1] = if ld == 0 { 0 } else { count / ld };
        stride[0] = 1;
        stride[1] = ld;
        ArrayDescriptor {
            layout: DataLayout::RowMajorMatrix,
            size,
            stride,
            data_type,
            table_data_type: None,
            data_scale: 1.0,
            data_bias: 0.0,
        }
    }

    pub fn cols(&self) -> usize {
        self.size[0]
    }

    pub fn rows(&self) -> usize {
        self.size[1]
    }

    pub fn ld(&self) -> usize {
        self.stride[1]
    }

    fn validate(&self, operand: &str) -> Result<()> {
        let invalid = |msg: String| Err(GemmError::InvalidDescriptor(format!("{operand}: {msg}")));
        if !data_type_supported(self.data_type) {
            return invalid(format!("unsupported data type {}", self.data_type));
        }
        if let Some(table) = self.table_data_type {
            return invalid(format!("lookup-table data ({table}) is not supported"));
        }
        if self.data_scale != 1.0 || self.data_bias != 0.0 {
            return invalid("scale and bias apply to quantized data only".to_string());
        }
        if self.stride[0] != 1 || self.ld() < self.cols() {
            return invalid(format!(
                "stride {:?} does not describe a row-major matrix",
                &self.stride[..2]
            ));
        }
        if self.size[2..].iter().any(|&d| d != 0) {
            return invalid("only two dimensions are supported".to_string());
        }
        Ok(())
    }
}

fn data_type_supported(dtype: DType) -> bool {
    matches!(dtype, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
}

/// Layer parameters for a two-input matrix multiplication.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastMatMulParams {
    pub alpha: f32,
    pub beta: f32,
    pub trans_a: bool,
    pub trans_b: bool,
    pub a_desc: ArrayDescriptor,
    pub b_desc: ArrayDescriptor,
    pub o_desc: ArrayDescriptor,
}

impl BroadcastMatMulParams {
    /// Describe the dense operands of `p`.
    pub fn from_gemm(p: &GemmParams) -> Self {
        BroadcastMatMulParams {
            alpha: p.alpha,
            beta: p.beta,
            trans_a: p.trans_a,
            trans_b: p.trans_b,
            a_desc: ArrayDescriptor::row_major_matrix(p.lda, p.m * p.k, p.dtype),
            b_desc: ArrayDescriptor::row_major_matrix(p.ldb, p.k * p.n, p.dtype),
            o_desc: ArrayDescriptor::row_major_matrix(p.n, p.m * p.n, p.dtype),
        }
    }
}

/// A validated matmul layer, ready to be applied to any number of slices.
#[derive(Debug)]
pub struct MatMulFilter {
    gemm: GemmParams,
    scratch: Scratch,
}

#[derive(Debug, Default)]
struct Scratch {
    a: Vec<f32>,
    b: Vec<f32>,
    out: Vec<f32>,
}

impl MatMulFilter {
    pub fn create(params: &BroadcastMatMulParams) -> Result<Self> {
        params.a_desc.validate("a")?;
        params.b_desc.validate("b")?;
        params.o_desc.validate("out")?;

        let dtype = params.o_desc.data_type;
        if params.a_desc.data_type != dtype || params.b_desc.data_type != dtype {
            return Err(GemmError::InvalidDescriptor(format!(
                "mixed data types: {} @ {} -> {}",
                params.a_desc.data_type, params.b_desc.data_type, dtype
            )));
        }

        let (m, k) = logical_dims(&params.a_desc, params.trans_a);
        let (k2, n) = logical_dims(&params.b_desc, params.trans_b);
        if k != k2 || params.o_desc.rows() != m || params.o_desc.cols() != n {
            return Err(GemmError::InvalidDescriptor(format!(
                "[{m}x{k}] @ [{k2}x{n}] does not produce [{}x{}]",
                params.o_desc.rows(),
                params.o_desc.cols()
            )));
        }
        if m == 0 || n == 0 || k == 0 {
            return Err(GemmError::InvalidDescriptor(format!(
                "empty matmul [{m}x{k}] @ [{k}x{n}]"
            )));
        }

        let gemm = GemmParams {
            dtype,
            m,
            n,
            k,
            trans_a: params.trans_a,
            trans_b: params.trans_b,
            lda: params.a_desc.ld(),
            ldb: params.b_desc.ld(),
            ldc: params.o_desc.ld(),
            alpha: params.alpha,
            beta: params.beta,
        };

        let scratch = match dtype {
            DType::F16 | DType::BF16 => Scratch {
                a: vec![0.0; gemm.a_extent()],
                b: vec![0.0; gemm.b_extent()],
                out: vec![0.0; gemm.out_extent()],
            },
            _ => Scratch::default(),
        };

        log::trace!("created matmul filter [{m}x{k}] @ [{k}x{n}] ({dtype})");
        Ok(MatMulFilter { gemm, scratch })
    }

    /// Multiply the slices starting at the given element offsets.
    pub fn apply_two_input(
        &mut self,
        a: &CpuStorage,
        a_offset: usize,
        b: &CpuStorage,
        b_offset: usize,
        out: &mut CpuStorage,
        out_offset: usize,
    ) -> Result<()> {
        let p = &self.gemm;
        match p.dtype {
            DType::F32 => sgemm_slices(
                p,
                tail(a.as_slice::<f32>()?, a_offset),
                tail(b.as_slice::<f32>()?, b_offset),
                tail_mut(out.as_slice_mut::<f32>()?, out_offset),
            ),
            DType::F64 => dgemm_slices(
                p,
                tail(a.as_slice::<f64>()?, a_offset),
                tail(b.as_slice::<f64>()?, b_offset),
                tail_mut(out.as_slice_mut::<f64>()?, out_offset),
            ),
            DType::F16 => self.apply_widened::<f16>(a, a_offset, b, b_offset, out, out_offset),
            DType::BF16 => self.apply_widened::<bf16>(a, a_offset, b, b_offset, out, out_offset),
            DType::Bool => Err(GemmError::InvalidDescriptor(
                "unsupported data type bool".to_string(),
            )),
        }
    }

    fn apply_widened<T: HalfFloat>(
        &mut self,
        a: &CpuStorage,
        a_offset: usize,
        b: &CpuStorage,
        b_offset: usize,
        out: &mut CpuStorage,
        out_offset: usize,
    ) -> Result<()> {
        let p = self.gemm;
        let scratch = &mut self.scratch;
        widen(tail(a.as_slice::<T>()?, a_offset), &mut scratch.a, "a")?;
        widen(tail(b.as_slice::<T>()?, b_offset), &mut scratch.b, "b")?;

        let out = tail_mut(out.as_slice_mut::<T>()?, out_offset);
        if out.len() < scratch.out.len() {
            return Err(GemmError::Other(format!(
                "out: slice of {} elements is shorter than the {} the matrix spans",
                out.len(),
                scratch.out.len()
            )));
        }
        if p.beta != 0.0 {
            widen(out, &mut scratch.out, "out")?;
        }
        sgemm_slices(&p, &scratch.a, &scratch.b, &mut scratch.out)?;
        for (o, &v) in out.iter_mut().zip(scratch.out.iter()) {
            *o = T::from_f32(v);
        }
        Ok(())
    }
}

impl Drop for MatMulFilter {
    fn drop(&mut self) {
        log::trace!(
            "destroying matmul filter [{}x{}] @ [{}x{}]",
            self.gemm.m,
            self.gemm.k,
            self.gemm.k,
            self.gemm.n
        );
    }
}

/// `(rows, cols)` of the matrix the operand contributes after `trans`.
fn logical_dims(desc: &ArrayDescriptor, trans: bool) -> (usize, usize) {
    if trans {
        (desc.cols(), desc.rows())
    } else {
        (desc.rows(), desc.cols())
    }
}

fn tail<T>(data: &[T], offset: usize) -> &[T] {
    data.get(offset..).unwrap_or_default()
}

fn tail_mut<T>(data: &mut [T], offset: usize) -> &mut [T] {
    data.get_mut(offset..).unwrap_or_default()
}

trait HalfFloat: Element {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl HalfFloat for f16 {
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }
}

impl HalfFloat for bf16 {
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }

    fn from_f32(v: f32) -> Self {
        bf16::from_f32(v)
    }
}

/// Fill all of `dst` from the front of `src`.
fn widen<T: HalfFloat>(src: &[T], dst: &mut [f32], operand: &str) -> Result<()> {
    if src.len() < dst.len() {
        return Err(GemmError::Other(format!(
            "{operand}: slice of {} elements is shorter than the {} the matrix spans",
            src.len(),
            dst.len()
        )));
    }
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d = s.to_f32();
    }
    Ok(())
}

/// Generic backend over [`MatMulFilter`], covering f16, bf16, f32 and f64.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorBackend;

impl DescriptorBackend {
    pub const fn new() -> Self {
        DescriptorBackend
    }
}

impl GemmBackend for DescriptorBackend {
    fn name(&self) -> &str {
        "descriptor"
    }

    fn supports(&self, dtype: DType) -> bool {
        data_type_supported(dtype)
    }

    fn prepare(&self, params: &GemmParams) -> Result<Box<dyn GemmKernel>> {
        let filter = MatMulFilter::create(&BroadcastMatMulParams::from_gemm(params))?;
        Ok(Box::new(filter))
    }
}

impl GemmKernel for MatMulFilter {
    fn apply(
        &mut self,
        a: &CpuStorage,
        a_offset: usize,
        b: &CpuStorage,
        b_offset: usize,
        out: &mut CpuStorage,
        out_offset: usize,
    ) -> Result<()> {
        self.apply_two_input(a, a_offset, b, b_offset, out, out_offset)
    }
}
