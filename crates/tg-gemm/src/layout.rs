use tg_tensor::{copy, CopyType, Tensor, TensorError};

use crate::error::Result;

/// How a matrix operand can be handed to a BLAS-style GEMM.
#[derive(Debug, Clone)]
pub struct MatrixLayout {
    /// True when the trailing matrix is stored column-major.
    pub transposed: bool,
    /// Stride between consecutive rows (or columns when `transposed`).
    pub leading_dim: usize,
    /// The input itself, or a row-major copy of it.
    pub operand: Tensor,
}

/// Classify the trailing two dimensions of `arr` as row-major or
/// column-major from its strides alone.
///
/// Views that are neither are copied into a fresh row-major buffer. Batch
/// strides are not inspected here; the executor walks them element-wise.
pub fn check_transpose(arr: &Tensor) -> Result<MatrixLayout> {
    let nd = arr.ndim();
    if nd < 2 {
        return Err(TensorError::Other(format!(
            "matmul operands need at least 2 dimensions, got {:?}",
            arr.shape().dims()
        ))
        .into());
    }
    let rows = arr.shape().rdim(2);
    let cols = arr.shape().rdim(1);
    let stx = arr.strides()[nd - 2];
    let sty = arr.strides()[nd - 1];

    if stx == cols as isize && sty == 1 {
        return Ok(MatrixLayout {
            transposed: false,
            leading_dim: cols,
            operand: arr.clone(),
        });
    }
    if stx == 1 && sty == rows as isize {
        return Ok(MatrixLayout {
            transposed: true,
            leading_dim: rows,
            operand: arr.clone(),
        });
    }

    log::debug!(
        "copying {} operand with strides {:?} to row-major",
        arr.shape(),
        arr.strides()
    );
    let mut arr_copy = Tensor::zeros_with(arr.shape().clone(), arr.dtype());
    copy(arr, &mut arr_copy, CopyType::General)?;
    Ok(MatrixLayout {
        transposed: false,
        leading_dim: cols,
        operand: arr_copy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::Shape;

    fn iota(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        Tensor::new((0..n).map(|v| v as f32).collect(), Shape::from_slice(shape))
    }

    #[test]
    fn test_row_major_is_not_copied() {
        let a = iota(&[3, 4]);
        let l = check_transpose(&a).unwrap();
        assert!(!l.transposed);
        assert_eq!(l.leading_dim, 4);
        assert!(l.operand.shares_storage(&a));
    }

    #[test]
    fn test_column_major_is_transposed() {
        // [3, 4] view over column-major storage: strides (1, 3)
        let a = iota(&[4, 3]).transpose_last_two().unwrap();
        assert_eq!(a.strides(), &[1, 3]);
        let l = check_transpose(&a).unwrap();
        assert!(l.transposed);
        assert_eq!(l.leading_dim, 3);
        assert!(l.operand.shares_storage(&a));
    }

    #[test]
    fn test_batched_row_major_ignores_batch_stride() {
        let base = iota(&[2, 3, 8]);
        // [2, 3, 4] matrices stored 24 elements apart
        let a = base
            .as_strided(Shape::new(vec![2, 3, 4]), vec![24, 4, 1], 0)
            .unwrap();
        let l = check_transpose(&a).unwrap();
        assert!(!l.transposed);
        assert!(l.operand.shares_storage(&base));
    }

    #[test]
    fn test_strided_view_is_materialized() {
        let base = iota(&[4, 6]);
        // every other column
        let a = base
            .as_strided(Shape::new(vec![4, 3]), vec![6, 2], 0)
            .unwrap();
        let l = check_transpose(&a).unwrap();
        assert!(!l.transposed);
        assert_eq!(l.leading_dim, 3);
        assert!(!l.operand.shares_storage(&base));
        assert!(l.operand.is_contiguous());
        assert_eq!(
            l.operand.to_vec::<f32>().unwrap(),
            a.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_rejects_vectors() {
        assert!(check_transpose(&iota(&[3])).is_err());
    }
}
