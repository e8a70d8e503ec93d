//!
//! turnstile server binary
//! -----------------------
//! Command-line entry point. Configuration comes from defaults, `TURNSTILE_*`
//! environment variables and flags, in that order of precedence.

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use turnstile::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = ServerConfig::from_env_and_args(&args);
    info!(target: "turnstile", "turnstile starting: RUST_LOG='{}', http_port={}", rust_log, config.http_port);

    turnstile::server::run(config).await
}
