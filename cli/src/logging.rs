use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber. `RUST_LOG` wins over `NIBBLE_LOG`, which
/// wins over the `--verbose` default.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose {
        "nibble=debug,nibble_core=debug"
    } else {
        "nibble=warn,nibble_core=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("NIBBLE_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
