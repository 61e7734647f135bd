use std::sync::Arc;

use crate::copy::{copy, CopyType};
use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use crate::shape::{elem_to_loc, Shape};
use crate::storage::CpuStorage;

/// A strided view over shared CPU storage.
///
/// Cloning a tensor clones the storage handle, not the data. Writes go through
/// [`Tensor::storage_mut`], which detaches the storage first if it is shared,
/// so other views never observe them.
///
/// Every constructor checks that all addressable offsets fall inside the
/// storage, so the offsets produced by [`Tensor::offsets`] are always valid
/// indices.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<CpuStorage>,
    shape: Shape,
    strides: Vec<isize>,
    offset: usize,
}

impl Tensor {
    /// Create a new f32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Self::contiguous_over(CpuStorage::from_f32_vec(data), shape)
    }

    /// Create a contiguous tensor of any element type.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.dims().to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self::contiguous_over(T::into_storage(data), shape))
    }

    /// Create a strided view over existing storage.
    ///
    /// # Errors
    /// Fails if the stride rank does not match the shape, or if any element of
    /// the view would fall outside `storage`.
    pub fn from_storage(
        storage: Arc<CpuStorage>,
        shape: Shape,
        strides: Vec<isize>,
        offset: usize,
    ) -> Result<Self> {
        check_bounds(storage.len(), &shape, &strides, offset)?;
        Ok(Tensor {
            storage,
            shape,
            strides,
            offset,
        })
    }

    fn contiguous_over(storage: CpuStorage, shape: Shape) -> Self {
        let strides = shape.strides();
        Tensor {
            storage: Arc::new(storage),
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a zero-filled f32 tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Self::zeros_with(shape, DType::F32)
    }

    /// Create a zero-filled tensor of the given dtype.
    pub fn zeros_with(shape: Shape, dtype: DType) -> Self {
        let n = shape.numel();
        Self::contiguous_over(CpuStorage::zeros(dtype, n), shape)
    }

    /// Create an f32 tensor filled with ones with the given shape.
    pub fn ones(shape: Shape) -> Self {
        let n = shape.numel();
        Self::contiguous_over(CpuStorage::from_f32_vec(vec![1.0; n]), shape)
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Strides in elements, one per dimension.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Element offset of the first logical element into the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Mutable access to the storage, detaching it from other views first.
    pub fn storage_mut(&mut self) -> &mut CpuStorage {
        Arc::make_mut(&mut self.storage)
    }

    /// Whether `self` and `other` view the same storage allocation.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// True if the view is row-major contiguous starting at offset 0.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.shape.is_contiguous(&self.strides)
    }

    /// Number of distinct storage elements the view addresses, treating
    /// zero-stride (broadcast) dimensions as size one.
    pub fn data_size(&self) -> usize {
        self.shape
            .dims()
            .iter()
            .zip(self.strides.iter())
            .map(|(&d, &s)| if s == 0 { d.min(1) } else { d })
            .product()
    }

    /// Storage offsets of every element, in row-major logical order.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        let base = self.offset as isize;
        (0..self.numel())
            .map(move |i| (base + elem_to_loc(i, self.shape.dims(), &self.strides)) as usize)
    }

    /// Gather the logical elements into a new row-major vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let data = self.storage.as_slice::<T>()?;
        Ok(self.offsets().map(|o| data[o]).collect())
    }

    /// Replace the storage with a freshly allocated, zeroed, contiguous
    /// buffer of the same shape and dtype.
    pub fn allocate(&mut self) {
        let dtype = self.dtype();
        self.storage = Arc::new(CpuStorage::zeros(dtype, self.numel()));
        self.strides = self.shape.strides();
        self.offset = 0;
    }

    /// A new view over the same storage with a different shape and strides.
    pub fn as_strided(&self, shape: Shape, strides: Vec<isize>, offset: usize) -> Result<Tensor> {
        Tensor::from_storage(Arc::clone(&self.storage), shape, strides, offset)
    }

    /// Swap the last two dimensions without copying.
    pub fn transpose_last_two(&self) -> Result<Tensor> {
        let nd = self.ndim();
        if nd < 2 {
            return Err(TensorError::Other(format!(
                "transpose requires at least 2 dimensions, got {}",
                nd
            )));
        }
        let mut dims = self.shape.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(nd - 2, nd - 1);
        strides.swap(nd - 2, nd - 1);
        self.as_strided(Shape::new(dims), strides, self.offset)
    }

    /// Broadcast to `target` numpy-style, using zero strides for expanded
    /// dimensions.
    pub fn broadcast_to(&self, target: &Shape) -> Result<Tensor> {
        let joined = Shape::broadcast_shape(&self.shape, target)?;
        if &joined != target {
            return Err(TensorError::BroadcastError {
                a: self.shape.dims().to_vec(),
                b: target.dims().to_vec(),
            });
        }
        let pad = target.ndim() - self.ndim();
        let mut strides = vec![0isize; target.ndim()];
        for (i, (&d, &s)) in self.shape.dims().iter().zip(&self.strides).enumerate() {
            strides[pad + i] = if d == 1 && target.dim(pad + i) != 1 { 0 } else { s };
        }
        self.as_strided(target.clone(), strides, self.offset)
    }

    /// Row-major contiguous copy of this view. Returns a cheap clone when the
    /// view is already contiguous.
    pub fn contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        let mut out = Tensor::zeros_with(self.shape.clone(), self.dtype());
        copy(self, &mut out, CopyType::General)?;
        Ok(out)
    }
}

fn check_bounds(len: usize, shape: &Shape, strides: &[isize], offset: usize) -> Result<()> {
    if strides.len() != shape.ndim() {
        return Err(TensorError::StrideMismatch {
            strides: strides.len(),
            ndim: shape.ndim(),
        });
    }
    if shape.numel() == 0 {
        return Ok(());
    }
    let mut min = offset as isize;
    let mut max = offset as isize;
    for (&d, &s) in shape.dims().iter().zip(strides) {
        let span = (d as isize - 1) * s;
        if span < 0 {
            min += span;
        } else {
            max += span;
        }
    }
    if min < 0 || max >= len as isize {
        return Err(TensorError::OutOfBounds { min, max, len });
    }
    Ok(())
}
