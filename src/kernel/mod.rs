//! Forward/traceback kernels.
//!
//! Two interchangeable implementations of one contract: fill the
//! back-pointer table with the Viterbi recurrence, then trace the best
//! path of each sequence back from the argmax of its last valid frame.
//! [`cpu`] parallelizes across batch items on the rayon pool; [`gpu`]
//! additionally parallelizes the per-frame state reduction inside a
//! cooperative workgroup. Both scan source states in ascending order and
//! break ties toward the smallest index, so their outputs are
//! bit-identical for identical inputs.

pub(crate) mod cpu;
pub(crate) mod gpu;
pub(crate) mod shaders;
