//! Batch planning: device choice, per-item offsets, back-pointer storage.
//!
//! The planner turns normalized shapes into the layout both kernels share:
//! batch item `b` starts at `b * frames * states` in the observation and
//! back-pointer tables and at `b * frames` in the path table. Back-pointer
//! memory dominates the decode footprint, so its allocation is fallible
//! rather than aborting.

use crate::error::DecodeError;
use crate::normalize::Normalized;

/// Where a decode runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    /// Batch-parallel decoding on the rayon worker pool.
    Cpu,
    /// A specific GPU adapter, by enumeration index over all backends.
    Gpu(usize),
}

/// Execution plan for a single decode call.
pub(crate) struct Plan {
    device: Device,
    /// Elements per batch item in the observation and back-pointer tables.
    item_stride: usize,
    /// Total back-pointer entries across the batch.
    backptr_len: usize,
    /// Host back-pointer table; allocated on first use by the CPU kernel.
    /// The GPU kernel keeps its table device-side instead.
    backptr: Option<Vec<u32>>,
}

/// Lay out the decode described by `norm` on `device`.
///
/// Back-pointers are 32-bit everywhere: wide enough for any practical
/// state space, and one width keeps the CPU and GPU tables identical.
pub(crate) fn plan(norm: &Normalized<'_>, device: Device) -> Result<Plan, DecodeError> {
    let item_stride = norm.frames.checked_mul(norm.states).ok_or_else(|| {
        DecodeError::OutOfResources(format!(
            "{} x {} frame grid overflows",
            norm.frames, norm.states
        ))
    })?;
    let backptr_len = item_stride.checked_mul(norm.batch).ok_or_else(|| {
        DecodeError::OutOfResources(format!(
            "back-pointer table for {} items of {} entries overflows",
            norm.batch, item_stride
        ))
    })?;
    tracing::debug!(
        ?device,
        batch = norm.batch,
        frames = norm.frames,
        states = norm.states,
        "planned decode"
    );
    Ok(Plan {
        device,
        item_stride,
        backptr_len,
        backptr: None,
    })
}

impl Plan {
    pub(crate) fn device(&self) -> Device {
        self.device
    }

    pub(crate) fn item_stride(&self) -> usize {
        self.item_stride
    }

    /// The host back-pointer table, `batch * frames * states` entries,
    /// allocated zeroed on first use.
    pub(crate) fn host_backptr(&mut self) -> Result<&mut [u32], DecodeError> {
        if self.backptr.is_none() {
            let mut table = Vec::new();
            table.try_reserve_exact(self.backptr_len).map_err(|_| {
                DecodeError::OutOfResources(format!(
                    "back-pointer table of {} entries could not be allocated",
                    self.backptr_len
                ))
            })?;
            table.resize(self.backptr_len, 0);
            self.backptr = Some(table);
        }
        match self.backptr.as_mut() {
            Some(table) => Ok(table),
            None => Err(DecodeError::InternalError(
                "back-pointer table missing after allocation".into(),
            )),
        }
    }
}
