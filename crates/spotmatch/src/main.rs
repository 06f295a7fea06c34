use std::process::ExitCode;

use spotmatch::cli::parse_cli;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spotmatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_cli();
    match spotmatch::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run aborted");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
