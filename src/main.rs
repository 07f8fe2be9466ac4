use bootstrap_signaling::config::Config;
use bootstrap_signaling::{build_rocket, logging};

#[rocket::main]
async fn main() {
    logging::init();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::error!(message = "config.invalid", error = %e);
        std::process::exit(1);
    });

    tracing::info!(message = "bootstrap-signaling.started", port = config.port);

    if let Err(e) = build_rocket(config).launch().await {
        tracing::error!(message = "bootstrap-signaling.launch_failed", error = %e);
        std::process::exit(1);
    }
}
