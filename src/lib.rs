//! Batched Viterbi decoding over time-varying categorical distributions.
//!
//! Given per-frame state scores, a transition matrix, and an initial
//! distribution, [`decode`] returns each sequence's single most probable
//! hidden-state path under a first-order Markov model. Batches decode in
//! parallel: across items on the rayon pool ([`Device::Cpu`]), or across
//! items *and* states on a GPU ([`Device::Gpu`]) with one cooperative
//! workgroup per sequence. The two kernels are bit-identical for
//! identical inputs.
//!
//! Scores may be probabilities or natural logs (`log_probs`); absent
//! transition/initial parameters default to uniform, and ragged batches
//! are expressed with per-item frame counts rather than re-padding data.
//! Decoding is stateless and synchronous; the only process-wide resource
//! is rayon's worker pool.

pub mod error;
pub mod io;
pub mod tensor;

mod decode;
mod kernel;
mod normalize;
mod plan;

pub use decode::decode;
pub use error::DecodeError;
pub use plan::Device;
pub use tensor::{Paths, Tensor2, Tensor3};
