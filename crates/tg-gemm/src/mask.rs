//! Block masking: zero whole `tile x tile` blocks of a matrix.

use half::{bf16, f16};
use tg_tensor::{elem_to_loc, CpuStorage, DType, Element, Tensor, TensorError};

use crate::error::{GemmError, Result};

/// Zero every tile of the `x * y` matrix at the front of `data` whose entry
/// in `mask` is false.
///
/// Element `(i, j)` lives at `data[i * x_data_str + j * y_data_str]`, tile
/// `(ti, tj)` is read from `mask[ti * x_mask_str + tj * y_mask_str]`. Tiles on
/// the last row and column are clipped to the matrix. The caller guarantees
/// that every addressed index is in bounds.
#[allow(clippy::too_many_arguments)]
pub fn mask_matrix<T: Element>(
    data: &mut [T],
    mask: &[bool],
    tile_size: usize,
    x: usize,
    y: usize,
    x_data_str: usize,
    y_data_str: usize,
    x_mask_str: usize,
    y_mask_str: usize,
) {
    let tiles_x = x.div_ceil(tile_size);
    let tiles_y = y.div_ceil(tile_size);

    for i in 0..tiles_x {
        for j in 0..tiles_y {
            if mask[i * x_mask_str + j * y_mask_str] {
                continue;
            }
            let loc_x = i * tile_size;
            let loc_y = j * tile_size;
            let block = loc_x * x_data_str + loc_y * y_data_str;

            let size_x = tile_size.min(x - loc_x);
            let size_y = tile_size.min(y - loc_y);
            for ii in 0..size_x {
                for jj in 0..size_y {
                    data[block + ii * x_data_str + jj * y_data_str] = T::zero();
                }
            }
        }
    }
}

/// Apply a boolean tile mask to every trailing matrix of `data` in place.
///
/// `mask` is a `bool` tensor whose last two dimensions cover at least
/// `(ceil(X / tile_size), ceil(Y / tile_size))` tiles. A single mask (2D, or
/// with unit batch extents) applies to every matrix; otherwise it must hold
/// one mask per matrix of `data`.
/// Both tensors may be arbitrary views with non-negative strides.
pub fn mask_tiles(data: &mut Tensor, mask: &Tensor, tile_size: usize) -> Result<()> {
    if tile_size == 0 {
        return Err(GemmError::Other("tile size must be positive".to_string()));
    }
    if mask.dtype() != DType::Bool {
        return Err(TensorError::DTypeMismatch {
            expected: DType::Bool.to_string(),
            got: mask.dtype().to_string(),
        }
        .into());
    }
    if data.ndim() < 2 || mask.ndim() < 2 {
        return Err(GemmError::Other(format!(
            "tile masking needs matrices, got data {} and mask {}",
            data.shape(),
            mask.shape()
        )));
    }

    let x = data.shape().rdim(2);
    let y = data.shape().rdim(1);
    let mx = mask.shape().rdim(2);
    let my = mask.shape().rdim(1);
    if mx < x.div_ceil(tile_size) || my < y.div_ceil(tile_size) {
        return Err(TensorError::ShapeMismatch {
            expected: vec![x.div_ceil(tile_size), y.div_ceil(tile_size)],
            got: vec![mx, my],
        }
        .into());
    }
    if x == 0 || y == 0 {
        return Ok(());
    }

    let batch = data.numel() / (x * y);
    let mask_batch = if mx * my == 0 { 0 } else { mask.numel() / (mx * my) };
    let shared = mask.ndim() == 2 || mask_batch == 1;
    if !shared && mask_batch != batch {
        return Err(GemmError::Other(format!(
            "{mask_batch} masks for {batch} matrices"
        )));
    }

    let data_strides = non_negative(data.strides())?;
    let mask_strides = non_negative(mask.strides())?;
    let (x_data_str, y_data_str) = trailing(&data_strides);
    let (x_mask_str, y_mask_str) = trailing(&mask_strides);

    let mask_data = mask.storage().as_slice::<bool>()?;
    let mut slices = Vec::with_capacity(batch);
    for i in 0..batch {
        let data_at =
            data.offset() + elem_to_loc(i * x * y, data.shape().dims(), data.strides()) as usize;
        let mask_at = if shared {
            mask.offset()
        } else {
            mask.offset()
                + elem_to_loc(i * mx * my, mask.shape().dims(), mask.strides()) as usize
        };
        slices.push((data_at, mask_at));
    }

    let geometry = TileGeometry {
        tile_size,
        x,
        y,
        x_data_str,
        y_data_str,
        x_mask_str,
        y_mask_str,
    };
    let dtype = data.dtype();
    let storage = data.storage_mut();
    match dtype {
        DType::Bool => mask_slices::<bool>(storage, mask_data, &slices, &geometry),
        DType::F16 => mask_slices::<f16>(storage, mask_data, &slices, &geometry),
        DType::BF16 => mask_slices::<bf16>(storage, mask_data, &slices, &geometry),
        DType::F32 => mask_slices::<f32>(storage, mask_data, &slices, &geometry),
        DType::F64 => mask_slices::<f64>(storage, mask_data, &slices, &geometry),
    }
}

struct TileGeometry {
    tile_size: usize,
    x: usize,
    y: usize,
    x_data_str: usize,
    y_data_str: usize,
    x_mask_str: usize,
    y_mask_str: usize,
}

/// Mask each `(data offset, mask offset)` pair of `slices`.
fn mask_slices<T: Element>(
    storage: &mut CpuStorage,
    mask: &[bool],
    slices: &[(usize, usize)],
    g: &TileGeometry,
) -> Result<()> {
    let data = storage.as_slice_mut::<T>()?;
    for &(data_at, mask_at) in slices {
        mask_matrix(
            &mut data[data_at..],
            &mask[mask_at..],
            g.tile_size,
            g.x,
            g.y,
            g.x_data_str,
            g.y_data_str,
            g.x_mask_str,
            g.y_mask_str,
        );
    }
    Ok(())
}

fn non_negative(strides: &[isize]) -> Result<Vec<usize>> {
    strides
        .iter()
        .map(|&s| {
            usize::try_from(s).map_err(|_| {
                GemmError::Other(format!("tile masking needs non-negative strides, got {strides:?}"))
            })
        })
        .collect()
}

fn trailing(strides: &[usize]) -> (usize, usize) {
    let nd = strides.len();
    (strides[nd - 2], strides[nd - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::Shape;

    fn iota(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        Tensor::new((1..=n).map(|v| v as f32).collect(), Shape::from_slice(shape))
    }

    fn bools(values: Vec<bool>, shape: &[usize]) -> Tensor {
        Tensor::from_vec(values, Shape::from_slice(shape)).unwrap()
    }

    #[test]
    fn test_all_true_keeps_everything() {
        let mut data = iota(&[5, 5]);
        let before = data.to_vec::<f32>().unwrap();
        mask_tiles(&mut data, &bools(vec![true; 9], &[3, 3]), 2).unwrap();
        assert_eq!(data.to_vec::<f32>().unwrap(), before);
    }

    #[test]
    fn test_all_false_zeroes_everything() {
        let mut data = iota(&[5, 5]);
        mask_tiles(&mut data, &bools(vec![false; 9], &[3, 3]), 2).unwrap();
        assert_eq!(data.to_vec::<f32>().unwrap(), vec![0.0; 25]);
    }

    #[test]
    fn test_single_clipped_tile() {
        // 5x5 with 2x2 tiles: tile (2, 1) covers row 4, columns 2..4
        let mut data = iota(&[5, 5]);
        let before = data.to_vec::<f32>().unwrap();
        let mut mask = vec![true; 9];
        mask[2 * 3 + 1] = false;
        mask_tiles(&mut data, &bools(mask, &[3, 3]), 2).unwrap();

        let after = data.to_vec::<f32>().unwrap();
        for r in 0..5 {
            for c in 0..5 {
                let idx = r * 5 + c;
                if r == 4 && (2..4).contains(&c) {
                    assert_eq!(after[idx], 0.0);
                } else {
                    assert_eq!(after[idx], before[idx]);
                }
            }
        }
    }

    #[test]
    fn test_strided_data_and_mask() {
        // data is a transposed view; mask is transposed as well
        let mut data = iota(&[4, 4]).transpose_last_two().unwrap();
        let before = data.to_vec::<f32>().unwrap();
        // logical mask [[true, false], [true, true]] over a column-major buffer
        let mask = bools(vec![true, true, false, true], &[2, 2])
            .transpose_last_two()
            .unwrap();
        mask_tiles(&mut data, &mask, 2).unwrap();

        let after = data.to_vec::<f32>().unwrap();
        for r in 0..4 {
            for c in 0..4 {
                let idx = r * 4 + c;
                if r < 2 && c >= 2 {
                    assert_eq!(after[idx], 0.0);
                } else {
                    assert_eq!(after[idx], before[idx]);
                }
            }
        }
    }

    #[test]
    fn test_batched_masks() {
        let mut data = Tensor::ones(Shape::new(vec![2, 2, 2]));
        let mask = bools(vec![true, false], &[2, 1, 1]);
        mask_tiles(&mut data, &mask, 2).unwrap();
        assert_eq!(
            data.to_vec::<f32>().unwrap(),
            vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_masking_detaches_shared_storage() {
        let mut data = iota(&[2, 2]);
        let alias = data.clone();
        mask_tiles(&mut data, &bools(vec![false], &[1, 1]), 2).unwrap();
        assert_eq!(alias.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(data.to_vec::<f32>().unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_rejects_bad_masks() {
        let mut data = iota(&[4, 4]);
        assert!(mask_tiles(&mut data, &bools(vec![true; 2], &[1, 2]), 2).is_err());
        assert!(mask_tiles(&mut data, &Tensor::ones(Shape::new(vec![2, 2])), 2).is_err());
        assert!(mask_tiles(&mut data, &bools(vec![true; 4], &[2, 2]), 0).is_err());
        assert!(mask_tiles(&mut data, &bools(vec![true; 12], &[3, 2, 2]), 2).is_err());
    }

    #[test]
    fn test_mask_matrix_on_raw_slices() {
        // 3x3 matrix with padded rows (stride 4), 2x2 tiles, mask [[F, T], [T, F]]
        let mut data = vec![1.0f64; 12];
        let mask = [false, true, true, false];
        mask_matrix(&mut data, &mask, 2, 3, 3, 4, 1, 2, 1);
        assert_eq!(
            data,
            vec![
                0.0, 0.0, 1.0, 1.0, //
                0.0, 0.0, 1.0, 1.0, //
                1.0, 1.0, 0.0, 1.0,
            ]
        );
    }

    #[test]
    fn test_unit_batch_mask_is_shared() {
        let mut data = Tensor::ones(Shape::new(vec![3, 2, 2]));
        let mask = bools(vec![true, false, true, false], &[1, 2, 2]);
        mask_tiles(&mut data, &mask, 1).unwrap();
        assert_eq!(
            data.to_vec::<f32>().unwrap(),
            vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]
        );
    }
}
