//! The public decode entry point.
//!
//! Runs normalization, planning, and one kernel in order. Each call is an
//! independent, synchronous decode; nothing is cached between calls.

use crate::error::DecodeError;
use crate::kernel::{cpu, gpu};
use crate::normalize::normalize;
use crate::plan::{plan, Device};
use crate::tensor::{Paths, Tensor2, Tensor3};

/// Decode the most probable hidden-state path of every sequence in a
/// batch.
///
/// `observation` holds per-frame categorical scores, shape
/// `(batch, frames, states)`. `frame_counts` gives each item's true length
/// for ragged batches and defaults to the padded length. `transition`
/// (`(states, states)`, row = source state) and `initial` default to
/// uniform distributions. With `log_probs` set, all scores are taken as
/// natural logs; otherwise they are probabilities in `[0, 1]` and are
/// log-converted once up front.
///
/// The returned table is `(batch, frames)`; positions at or beyond an
/// item's frame count are zero-filled padding. Equal-scoring predecessors
/// resolve to the smallest state index, and the CPU and GPU kernels return
/// bit-identical paths for identical inputs.
///
/// # Errors
///
/// [`DecodeError::InvalidArgument`] for shape or range violations, before
/// any kernel work; [`DecodeError::OutOfResources`] when back-pointer or
/// device memory cannot be had; [`DecodeError::DeviceError`] for GPU
/// adapter or execution failures.
///
/// # Example
///
/// ```
/// use trellis::{decode, Device, Tensor2, Tensor3};
///
/// let observation = [
///     0.25, 0.5, 0.25, // frame 0
///     0.25, 0.25, 0.5, // frame 1
///     0.33, 0.33, 0.33, // frame 2
/// ];
/// let transition = [
///     0.5, 0.25, 0.25, //
///     0.33, 0.33, 0.33, //
///     0.25, 0.25, 0.5,
/// ];
/// let initial = [0.4, 0.3, 0.3];
///
/// let paths = decode(
///     Tensor3::new(&observation, 1, 3, 3).unwrap(),
///     None,
///     Some(Tensor2::new(&transition, 3, 3).unwrap()),
///     Some(&initial),
///     false,
///     Device::Cpu,
/// )
/// .unwrap();
/// assert_eq!(paths.item(0), &[1, 2, 2]);
/// ```
pub fn decode(
    observation: Tensor3<'_>,
    frame_counts: Option<&[usize]>,
    transition: Option<Tensor2<'_>>,
    initial: Option<&[f32]>,
    log_probs: bool,
    device: Device,
) -> Result<Paths, DecodeError> {
    let span = tracing::info_span!(
        "decode",
        batch = observation.batch(),
        frames = observation.frames(),
        states = observation.states(),
        ?device,
    );
    let _guard = span.enter();

    let norm = normalize(observation, frame_counts, transition, initial, log_probs)?;
    let mut plan = plan(&norm, device)?;
    let mut paths = Paths::zeroed(norm.batch, norm.frames)?;

    match plan.device() {
        Device::Cpu => cpu::decode_batch(&norm, &mut plan, paths.as_mut_slice())?,
        Device::Gpu(index) => {
            let ctx = gpu::GpuContext::new(index)?;
            if ctx.fits_shared(norm.states) {
                gpu::decode_batch(&ctx, &norm, paths.as_mut_slice())?;
            } else {
                tracing::warn!(
                    states = norm.states,
                    "state count exceeds the gpu shared-memory budget, decoding on cpu"
                );
                cpu::decode_batch(&norm, &mut plan, paths.as_mut_slice())?;
            }
        }
    }
    Ok(paths)
}
