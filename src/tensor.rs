//! Borrowed array views and the owned decode output.
//!
//! The decoder never owns its inputs: callers hand in contiguous row-major
//! slices wrapped in shape-checked views, and keep ownership for the whole
//! call. The only array allocated on the caller's behalf is the final
//! index table, [`Paths`].

use crate::error::DecodeError;

fn checked_len(dims: &[usize]) -> Result<usize, DecodeError> {
    dims.iter().try_fold(1usize, |acc, &d| {
        acc.checked_mul(d).ok_or_else(|| {
            DecodeError::InvalidArgument(format!("shape {dims:?} overflows usize"))
        })
    })
}

/// Contiguous row-major 2-D f32 view, shape `(rows, cols)`.
#[derive(Clone, Copy, Debug)]
pub struct Tensor2<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
}

impl<'a> Tensor2<'a> {
    /// Wrap a slice as a `(rows, cols)` matrix.
    ///
    /// Fails when the slice length does not equal `rows * cols`.
    pub fn new(data: &'a [f32], rows: usize, cols: usize) -> Result<Self, DecodeError> {
        let expect = checked_len(&[rows, cols])?;
        if data.len() != expect {
            return Err(DecodeError::InvalidArgument(format!(
                "shape ({rows}, {cols}) needs {expect} elements, slice holds {}",
                data.len()
            )));
        }
        Ok(Self { data, rows, cols })
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// Contiguous row-major 3-D f32 view, shape `(batch, frames, states)`.
///
/// `data[b * frames * states + t * states + s]` is the emission score of
/// state `s` at frame `t` of batch item `b`.
#[derive(Clone, Copy, Debug)]
pub struct Tensor3<'a> {
    data: &'a [f32],
    batch: usize,
    frames: usize,
    states: usize,
}

impl<'a> Tensor3<'a> {
    /// Wrap a slice as a `(batch, frames, states)` array.
    ///
    /// Fails when the slice length does not equal the shape product.
    pub fn new(
        data: &'a [f32],
        batch: usize,
        frames: usize,
        states: usize,
    ) -> Result<Self, DecodeError> {
        let expect = checked_len(&[batch, frames, states])?;
        if data.len() != expect {
            return Err(DecodeError::InvalidArgument(format!(
                "shape ({batch}, {frames}, {states}) needs {expect} elements, slice holds {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            batch,
            frames,
            states,
        })
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn states(&self) -> usize {
        self.states
    }

    /// The `(frames, states)` plane of one batch item.
    pub fn item(&self, b: usize) -> &'a [f32] {
        let stride = self.frames * self.states;
        &self.data[b * stride..(b + 1) * stride]
    }
}

/// Decoded state indices, shape `(batch, frames)` row-major.
///
/// Entries at `t >= frame_counts[b]` are zero-filled padding and carry no
/// meaning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paths {
    data: Vec<i32>,
    batch: usize,
    frames: usize,
}

impl Paths {
    /// Allocate a zero-filled table. Allocation failure is reported rather
    /// than aborting the process.
    pub(crate) fn zeroed(batch: usize, frames: usize) -> Result<Self, DecodeError> {
        let len = checked_len(&[batch, frames])?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| {
            DecodeError::OutOfResources(format!(
                "path table of {len} indices could not be allocated"
            ))
        })?;
        data.resize(len, 0);
        Ok(Self {
            data,
            batch,
            frames,
        })
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The full row of one batch item, padding included.
    pub fn item(&self, b: usize) -> &[i32] {
        &self.data[b * self.frames..(b + 1) * self.frames]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.data
    }
}
