use crate::error::{Result, TensorError};
use std::fmt;

/// Logical extents of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }

    /// Rank.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count; 1 for a rank-0 shape, 0 if any extent is 0.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Extent of dimension `i`. Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Extent `i` places from the end: `rdim(1)` is the column count of the
    /// trailing matrix, `rdim(2)` its row count.
    ///
    /// # Panics
    /// Panics if `i == 0` or `i > ndim()`.
    pub fn rdim(&self, i: usize) -> usize {
        self.dims[self.dims.len() - i]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Dense row-major strides, in elements.
    pub fn strides(&self) -> Vec<isize> {
        let mut strides = vec![1isize; self.dims.len()];
        let mut acc = 1isize;
        for (stride, &dim) in strides.iter_mut().zip(self.dims.iter()).rev() {
            *stride = acc;
            acc *= dim as isize;
        }
        strides
    }

    /// Whether `strides` lay this shape out densely in row-major order.
    /// Strides of unit dimensions are ignored.
    pub fn is_contiguous(&self, strides: &[isize]) -> bool {
        strides.len() == self.dims.len()
            && self
                .dims
                .iter()
                .zip(strides.iter().zip(self.strides()))
                .all(|(&d, (&s, e))| d == 1 || s == e)
    }

    /// Numpy-style broadcast of `a` against `b`: shapes are aligned from the
    /// right, missing leading dimensions count as 1, and each pair of
    /// extents must match or contain a 1.
    pub fn broadcast_shape(a: &Shape, b: &Shape) -> Result<Shape> {
        let rank = a.ndim().max(b.ndim());
        let extent = |s: &Shape, i: usize| {
            if i < rank - s.ndim() {
                1
            } else {
                s.dims[i - (rank - s.ndim())]
            }
        };

        let mut dims = Vec::with_capacity(rank);
        for i in 0..rank {
            let (da, db) = (extent(a, i), extent(b, i));
            let d = match (da, db) {
                _ if da == db => da,
                (1, _) => db,
                (_, 1) => da,
                _ => {
                    return Err(TensorError::BroadcastError {
                        a: a.dims.clone(),
                        b: b.dims.clone(),
                    })
                }
            };
            dims.push(d);
        }
        Ok(Shape::new(dims))
    }
}

/// Maps the `elem`-th element in row-major logical order to its offset in
/// storage, given arbitrary (possibly zero or negative) strides.
///
/// Indices past the last element wrap around, so a single matrix can be
/// addressed as if it repeated along a batch dimension.
pub fn elem_to_loc(elem: usize, shape: &[usize], strides: &[isize]) -> isize {
    debug_assert_eq!(shape.len(), strides.len());
    let mut rem = elem;
    let mut loc = 0isize;
    for (&dim, &stride) in shape.iter().zip(strides.iter()).rev() {
        if dim == 0 {
            return loc;
        }
        loc += (rem % dim) as isize * stride;
        rem /= dim;
    }
    loc
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}
