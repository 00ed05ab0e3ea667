//! Landfall CLI — transparent procedure migration.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "landfall",
    version,
    about = "Land procedures on remote hosts and call them as if local"
)]
struct Cli {
    #[command(subcommand)]
    command: landfall::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = landfall::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
