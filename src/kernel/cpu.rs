//! CPU forward/traceback kernel.
//!
//! Each batch item runs the serial first-order Viterbi recurrence to
//! completion on one worker; items are distributed across the rayon pool.
//! The running-score double buffer is thread-local, and the back-pointer
//! and path tables are partitioned by item, so workers never share
//! mutable state.

use rayon::prelude::*;

use crate::error::DecodeError;
use crate::normalize::Normalized;
use crate::plan::Plan;

/// Decode every batch item into `path`, shape `(batch, frames)`.
pub(crate) fn decode_batch(
    norm: &Normalized<'_>,
    plan: &mut Plan,
    path: &mut [i32],
) -> Result<(), DecodeError> {
    let frames = norm.frames;
    let states = norm.states;
    let stride = plan.item_stride();
    let backptr = plan.host_backptr()?;

    path.par_chunks_exact_mut(frames)
        .zip(backptr.par_chunks_exact_mut(stride))
        .enumerate()
        .for_each(|(b, (path_row, psi))| {
            let obs = &norm.observation[b * stride..(b + 1) * stride];
            let len = norm.frame_counts[b] as usize;
            decode_item(
                obs,
                &norm.transition,
                &norm.initial,
                len,
                states,
                psi,
                path_row,
            );
        });
    Ok(())
}

/// Serial Viterbi for one sequence of `len` frames.
///
/// The source scan starts at state 0 and replaces the running best only on
/// strictly greater scores, so equal scores resolve to the smallest index.
/// The GPU kernel mirrors this exact operation order.
fn decode_item(
    obs: &[f32],
    trans: &[f32],
    init: &[f32],
    len: usize,
    states: usize,
    psi: &mut [u32],
    path: &mut [i32],
) {
    let mut prev = vec![0.0f32; states];
    let mut next = vec![0.0f32; states];

    for s in 0..states {
        prev[s] = init[s] + obs[s];
    }

    for t in 1..len {
        let obs_t = &obs[t * states..(t + 1) * states];
        let psi_t = &mut psi[t * states..(t + 1) * states];
        for dst in 0..states {
            let o = obs_t[dst];
            let mut best = prev[0] + trans[dst] + o;
            let mut best_src = 0u32;
            for src in 1..states {
                let score = prev[src] + trans[src * states + dst] + o;
                if score > best {
                    best = score;
                    best_src = src as u32;
                }
            }
            next[dst] = best;
            psi_t[dst] = best_src;
        }
        std::mem::swap(&mut prev, &mut next);
    }

    let mut arg = 0usize;
    let mut best = prev[0];
    for s in 1..states {
        if prev[s] > best {
            best = prev[s];
            arg = s;
        }
    }
    path[len - 1] = arg as i32;
    for t in (0..len - 1).rev() {
        arg = psi[(t + 1) * states + arg] as usize;
        path[t] = arg as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::plan::{plan, Device};
    use crate::tensor::{Tensor2, Tensor3};

    fn run(
        obs: &[f32],
        shape: (usize, usize, usize),
        counts: Option<&[usize]>,
        trans: Option<&[f32]>,
        init: Option<&[f32]>,
    ) -> Vec<i32> {
        let (b, t, s) = shape;
        let obs = Tensor3::new(obs, b, t, s).unwrap();
        let trans = trans.map(|a| Tensor2::new(a, s, s).unwrap());
        let norm = normalize(obs, counts, trans, init, false).unwrap();
        let mut plan = plan(&norm, Device::Cpu).unwrap();
        let mut path = vec![0i32; b * t];
        decode_batch(&norm, &mut plan, &mut path).unwrap();
        path
    }

    #[test]
    fn identity_transition_holds_initial_state() {
        // Certain start in state 0 plus an identity transition pins the
        // whole path, whatever the (uniform) observations say.
        let obs = [0.5f32; 6];
        let trans = [1.0f32, 0.0, 0.0, 1.0];
        let init = [1.0f32, 0.0];
        assert_eq!(
            run(&obs, (1, 3, 2), None, Some(&trans), Some(&init)),
            vec![0, 0, 0]
        );
    }

    #[test]
    fn anti_diagonal_transition_alternates() {
        let obs = [0.5f32; 6];
        let trans = [0.0f32, 1.0, 1.0, 0.0];
        let init = [1.0f32, 0.0];
        assert_eq!(
            run(&obs, (1, 3, 2), None, Some(&trans), Some(&init)),
            vec![0, 1, 0]
        );
    }

    #[test]
    fn equal_scores_pick_smallest_state() {
        let obs = [0.5f32, 0.5, 0.0];
        assert_eq!(run(&obs, (1, 1, 3), None, None, None), vec![0]);
    }

    #[test]
    fn short_item_leaves_padding_zeroed() {
        let obs = [
            0.1f32, 0.9, // frame 0
            0.9, 0.1, // frame 1
            0.9, 0.1, // frame 2 (beyond the item's length)
        ];
        let path = run(&obs, (1, 3, 2), Some(&[2]), None, None);
        assert_eq!(path, vec![1, 0, 0]);
    }
}
