//! The file-batched decode command.
//!
//! Inputs are right-padded into a single ragged batch and decoded with one
//! kernel launch; each output file receives its item's valid prefix.

use std::path::PathBuf;
use std::process;

use clap::Args;

use trellis::{decode, io, Device, Tensor2, Tensor3};

#[derive(Args)]
pub struct DecodeArgs {
    /// Score tensor files, one (frames x states) F32 matrix per file
    #[arg(long = "input_files", num_args = 1.., required = true)]
    pub input_files: Vec<PathBuf>,

    /// Destination index files, one per input file
    #[arg(long = "output_files", num_args = 1.., required = true)]
    pub output_files: Vec<PathBuf>,

    /// (states x states) transition matrix file; uniform when omitted
    #[arg(long = "transition_file", value_name = "PATH")]
    pub transition_file: Option<PathBuf>,

    /// Length-states initial distribution file; uniform when omitted
    #[arg(long = "initial_file", value_name = "PATH")]
    pub initial_file: Option<PathBuf>,

    /// Scores are already natural logs
    #[arg(long = "log_probs")]
    pub log_probs: bool,

    /// GPU adapter index; decodes on the CPU pool when omitted
    #[arg(long, value_name = "INDEX")]
    pub gpu: Option<usize>,
}

pub fn cmd_decode(args: DecodeArgs) {
    if let Err(message) = run(&args) {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn run(args: &DecodeArgs) -> Result<(), String> {
    if args.input_files.len() != args.output_files.len() {
        return Err(format!(
            "{} input files but {} output files",
            args.input_files.len(),
            args.output_files.len()
        ));
    }

    let mut items = Vec::with_capacity(args.input_files.len());
    for path in &args.input_files {
        items.push(io::load_matrix(path).map_err(|e| e.to_string())?);
    }
    let states = items[0].2;
    for (path, item) in args.input_files.iter().zip(&items) {
        if item.2 != states {
            return Err(format!(
                "{}: {} states where {} has {states}",
                path.display(),
                item.2,
                args.input_files[0].display()
            ));
        }
    }

    // Right-pad every item into one batch; true lengths ride along as
    // frame counts, so nothing is decoded twice and padding is never read.
    let batch = items.len();
    let frames_max = items.iter().map(|(_, frames, _)| *frames).max().unwrap_or(0);
    let mut padded = vec![0.0f32; batch * frames_max * states];
    let mut counts = Vec::with_capacity(batch);
    for (b, (data, frames, _)) in items.iter().enumerate() {
        let start = b * frames_max * states;
        padded[start..start + data.len()].copy_from_slice(data);
        counts.push(*frames);
    }

    let transition = match &args.transition_file {
        Some(path) => Some(io::load_matrix(path).map_err(|e| e.to_string())?),
        None => None,
    };
    let initial = match &args.initial_file {
        Some(path) => Some(io::load_vector(path).map_err(|e| e.to_string())?),
        None => None,
    };

    let observation =
        Tensor3::new(&padded, batch, frames_max, states).map_err(|e| e.to_string())?;
    let transition_view = match &transition {
        Some((data, rows, cols)) => {
            Some(Tensor2::new(data, *rows, *cols).map_err(|e| e.to_string())?)
        }
        None => None,
    };
    let device = match args.gpu {
        Some(index) => Device::Gpu(index),
        None => Device::Cpu,
    };

    let paths = decode(
        observation,
        Some(&counts),
        transition_view,
        initial.as_deref(),
        args.log_probs,
        device,
    )
    .map_err(|e| e.to_string())?;

    for (b, path) in args.output_files.iter().enumerate() {
        io::save_indices(path, &paths.item(b)[..counts[b]]).map_err(|e| e.to_string())?;
    }
    tracing::info!(files = batch, ?device, "decoded");
    Ok(())
}
