//! WGSL shader sources, embedded at compile time.

/// Batched Viterbi forward/traceback (one workgroup per sequence).
pub(crate) const VITERBI: &str = include_str!("viterbi.wgsl");

/// Destination-state capacity of the shader's shared-memory score buffers;
/// must match `MAX_STATES` in `viterbi.wgsl`. Two f32 buffers of this many
/// states fill the default 16 KiB workgroup-storage limit.
pub(crate) const MAX_SHARED_STATES: usize = 2048;
