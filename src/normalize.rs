//! Parameter normalization.
//!
//! Everything the kernels consume goes through here exactly once per
//! decode: shapes are validated, absent parameters are materialized as
//! uniform distributions, and probability-domain scores are converted to
//! natural logs. Kernels downstream assume log-domain scores and never
//! synthesize defaults themselves.

use std::borrow::Cow;

use crate::error::DecodeError;
use crate::tensor::{Tensor2, Tensor3};

/// Validated, log-domain decode inputs with all defaults materialized.
#[derive(Debug)]
pub(crate) struct Normalized<'a> {
    /// `(batch, frames, states)` emission scores, natural-log domain.
    pub(crate) observation: Cow<'a, [f32]>,
    /// `(states, states)` transition scores, row = source state.
    pub(crate) transition: Cow<'a, [f32]>,
    /// Length-`states` initial scores.
    pub(crate) initial: Cow<'a, [f32]>,
    /// True per-item frame counts, each in `[1, frames]`.
    pub(crate) frame_counts: Vec<u32>,
    pub(crate) batch: usize,
    pub(crate) frames: usize,
    pub(crate) states: usize,
}

/// Validate shapes, fill in uniform defaults, and move every score array
/// into the natural-log domain.
///
/// With `log_probs` set the inputs are borrowed as-is; otherwise each
/// array is log-converted into an owned copy. `ln(0)` is `-inf`, which the
/// kernels treat as an ordinary (never-winning) score.
pub(crate) fn normalize<'a>(
    observation: Tensor3<'a>,
    frame_counts: Option<&[usize]>,
    transition: Option<Tensor2<'a>>,
    initial: Option<&'a [f32]>,
    log_probs: bool,
) -> Result<Normalized<'a>, DecodeError> {
    let batch = observation.batch();
    let frames = observation.frames();
    let states = observation.states();
    if batch == 0 || frames == 0 || states == 0 {
        return Err(DecodeError::InvalidArgument(format!(
            "observation shape ({batch}, {frames}, {states}) has an empty axis"
        )));
    }

    let frame_counts = match frame_counts {
        Some(counts) => {
            if counts.len() != batch {
                return Err(DecodeError::InvalidArgument(format!(
                    "{} frame counts for a batch of {batch}",
                    counts.len()
                )));
            }
            for (b, &len) in counts.iter().enumerate() {
                if len < 1 || len > frames {
                    return Err(DecodeError::InvalidArgument(format!(
                        "frame count {len} of item {b} outside [1, {frames}]"
                    )));
                }
            }
            counts.iter().map(|&len| len as u32).collect()
        }
        None => vec![frames as u32; batch],
    };

    if let Some(a) = transition {
        if a.rows() != states || a.cols() != states {
            return Err(DecodeError::InvalidArgument(format!(
                "transition shape ({}, {}) does not match {states} states",
                a.rows(),
                a.cols()
            )));
        }
    }
    if let Some(p) = initial {
        if p.len() != states {
            return Err(DecodeError::InvalidArgument(format!(
                "initial distribution of length {} does not match {states} states",
                p.len()
            )));
        }
    }

    // Uniform defaults match the incoming domain and are converted below
    // together with everything else.
    let uniform = if log_probs {
        -(states as f32).ln()
    } else {
        1.0 / states as f32
    };
    let square = states.checked_mul(states).ok_or_else(|| {
        DecodeError::OutOfResources(format!("{states} x {states} transition table overflows"))
    })?;

    let observation: Cow<'a, [f32]> = Cow::Borrowed(observation.data());
    let transition: Cow<'a, [f32]> = match transition {
        Some(a) => Cow::Borrowed(a.data()),
        None => Cow::Owned(vec![uniform; square]),
    };
    let initial: Cow<'a, [f32]> = match initial {
        Some(p) => Cow::Borrowed(p),
        None => Cow::Owned(vec![uniform; states]),
    };

    let (observation, transition, initial) = if log_probs {
        (observation, transition, initial)
    } else {
        (to_log(observation), to_log(transition), to_log(initial))
    };

    Ok(Normalized {
        observation,
        transition,
        initial,
        frame_counts,
        batch,
        frames,
        states,
    })
}

fn to_log(scores: Cow<'_, [f32]>) -> Cow<'_, [f32]> {
    Cow::Owned(scores.iter().map(|&p| p.ln()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs3(data: &[f32], b: usize, t: usize, s: usize) -> Tensor3<'_> {
        Tensor3::new(data, b, t, s).unwrap()
    }

    #[test]
    fn log_inputs_are_borrowed() {
        let data = [-1.0f32; 6];
        let n = normalize(obs3(&data, 1, 3, 2), None, None, None, true).unwrap();
        assert!(matches!(n.observation, Cow::Borrowed(_)));
        assert_eq!(n.frame_counts, vec![3]);
    }

    #[test]
    fn probabilities_are_logged_once() {
        let data = [1.0f32, 0.0, 0.5, 0.5, 1.0, 0.0];
        let n = normalize(obs3(&data, 1, 3, 2), None, None, None, false).unwrap();
        assert_eq!(n.observation[0], 0.0);
        assert_eq!(n.observation[1], f32::NEG_INFINITY);
        assert!((n.observation[2] - 0.5f32.ln()).abs() < 1e-7);
    }

    #[test]
    fn uniform_defaults_match_domain() {
        let data = [0.5f32; 4];
        let log_mode = normalize(obs3(&data, 1, 2, 2), None, None, None, true).unwrap();
        let prob_mode = normalize(obs3(&data, 1, 2, 2), None, None, None, false).unwrap();
        let expect = -(2f32).ln();
        for &v in log_mode.transition.iter().chain(prob_mode.transition.iter()) {
            assert!((v - expect).abs() < 1e-6);
        }
        assert_eq!(log_mode.initial.len(), 2);
        assert_eq!(log_mode.transition.len(), 4);
    }

    #[test]
    fn rejects_empty_axes() {
        let err = normalize(obs3(&[], 1, 1, 0), None, None, None, true).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_bad_frame_counts() {
        let data = [0.0f32; 6];
        let obs = obs3(&data, 1, 3, 2);
        assert!(normalize(obs, Some(&[0]), None, None, true).is_err());
        assert!(normalize(obs, Some(&[4]), None, None, true).is_err());
        assert!(normalize(obs, Some(&[1, 2]), None, None, true).is_err());
    }

    #[test]
    fn rejects_mismatched_parameters() {
        let data = [0.0f32; 6];
        let obs = obs3(&data, 1, 3, 2);
        let bad_a = [0.0f32; 6];
        let a = Tensor2::new(&bad_a, 2, 3).unwrap();
        assert!(normalize(obs, None, Some(a), None, true).is_err());
        assert!(normalize(obs, None, None, Some(&[0.0; 3]), true).is_err());
    }
}
