pub mod descriptor;
pub mod sgemm;

pub use descriptor::{
    ArrayDescriptor, BroadcastMatMulParams, DataLayout, DescriptorBackend, MatMulFilter,
};
pub use sgemm::SgemmBackend;

use crate::backend::{check_extent, GemmParams};
use crate::error::Result;

/// `matrixmultiply::sgemm` over slices that start at each operand's first
/// element.
///
/// The extents implied by `p` are checked against the slice lengths before
/// entering the unsafe call, so an inconsistent view surfaces as an error.
pub(crate) fn sgemm_slices(p: &GemmParams, a: &[f32], b: &[f32], out: &mut [f32]) -> Result<()> {
    check_extent("a", a.len(), 0, p.a_extent())?;
    check_extent("b", b.len(), 0, p.b_extent())?;
    check_extent("out", out.len(), 0, p.out_extent())?;
    let (rsa, csa) = p.a_strides();
    let (rsb, csb) = p.b_strides();
    // SAFETY: every element addressed through these strides lies within the
    // extents checked above.
    unsafe {
        matrixmultiply::sgemm(
            p.m,
            p.k,
            p.n,
            p.alpha,
            a.as_ptr(),
            rsa,
            csa,
            b.as_ptr(),
            rsb,
            csb,
            p.beta,
            out.as_mut_ptr(),
            p.ldc as isize,
            1,
        );
    }
    Ok(())
}

/// Double precision counterpart of [`sgemm_slices`].
pub(crate) fn dgemm_slices(p: &GemmParams, a: &[f64], b: &[f64], out: &mut [f64]) -> Result<()> {
    check_extent("a", a.len(), 0, p.a_extent())?;
    check_extent("b", b.len(), 0, p.b_extent())?;
    check_extent("out", out.len(), 0, p.out_extent())?;
    let (rsa, csa) = p.a_strides();
    let (rsb, csb) = p.b_strides();
    // SAFETY: see sgemm_slices.
    unsafe {
        matrixmultiply::dgemm(
            p.m,
            p.k,
            p.n,
            p.alpha as f64,
            a.as_ptr(),
            rsa,
            csa,
            b.as_ptr(),
            rsb,
            csb,
            p.beta as f64,
            out.as_mut_ptr(),
            p.ldc as isize,
            1,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::DType;

    fn params(m: usize, n: usize, k: usize) -> GemmParams {
        GemmParams {
            dtype: DType::F32,
            m,
            n,
            k,
            trans_a: false,
            trans_b: false,
            lda: k,
            ldb: n,
            ldc: n,
            alpha: 1.0,
            beta: 0.0,
        }
    }

    #[test]
    fn test_sgemm_basic() {
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [0.0f32; 4];
        sgemm_slices(&params(2, 2, 2), &a, &b, &mut c).unwrap();
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_sgemm_transposed_a() {
        // A stored column-major: logical [1,2;3,4]
        let a = [1.0, 3.0, 2.0, 4.0];
        let b = [1.0, 0.0, 0.0, 1.0];
        let mut c = [0.0f32; 4];
        let p = GemmParams {
            trans_a: true,
            lda: 2,
            ..params(2, 2, 2)
        };
        sgemm_slices(&p, &a, &b, &mut c).unwrap();
        assert_eq!(c, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sgemm_accumulates_with_beta() {
        let a = [1.0, 1.0];
        let b = [2.0, 3.0];
        let mut c = [10.0f32];
        let p = GemmParams {
            alpha: 2.0,
            beta: 0.5,
            ..params(1, 1, 2)
        };
        sgemm_slices(&p, &a, &b, &mut c).unwrap();
        // 2 * (2 + 3) + 0.5 * 10
        assert_eq!(c, [15.0]);
    }

    #[test]
    fn test_dgemm_basic() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let mut c = [0.0f64];
        let p = GemmParams {
            dtype: DType::F64,
            ..params(1, 1, 3)
        };
        dgemm_slices(&p, &a, &b, &mut c).unwrap();
        assert_eq!(c, [32.0]);
    }

    #[test]
    fn test_short_slice_is_an_error() {
        let a = [1.0, 2.0, 3.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [0.0f32; 4];
        assert!(sgemm_slices(&params(2, 2, 2), &a, &b, &mut c).is_err());
    }
}
