mod cli;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Batched Viterbi decoding over serialized score tensors"
)]
struct Cli {
    #[command(flatten)]
    args: cli::DecodeArgs,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    cli::cmd_decode(cli.args);
}
