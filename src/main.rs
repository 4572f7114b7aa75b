use clap::Parser;
use codescope::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr: stdout is reserved for command output (and
    // may be a protocol channel for embedding consumers).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let cli = Cli::parse();
    let code = run(cli).await;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
