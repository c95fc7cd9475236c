use clap::Parser;
use compsim::cli::{self, Cli};
use std::io;

#[cfg(feature = "logging")]
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "compsim=debug" } else { "compsim=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(not(feature = "logging"))]
fn init_logging(_verbose: bool) {}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cli::execute(cli)
}
