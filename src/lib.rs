pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pruner;
pub mod rate_limit;
pub mod rendezvous;
pub mod room_hub;
pub mod routes;

#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

use clock::{Clock, SystemClock};
use config::Config;
use metrics::Metrics;
use rate_limit::RateLimiter;
use rendezvous::RendezvousRegistry;
use room_hub::RoomHub;
use tokio::sync::watch;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });
    build_rocket(config)
}

/// Builds the Rocket instance from an already-resolved `Config`, used both by the real
/// entrypoint and by tests that need a clean instance with specific settings.
pub fn build_rocket(config: Config) -> rocket::Rocket<rocket::Build> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let verifier = Arc::new(auth::CredentialVerifier::new(&config));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_connections_per_ip,
        config.rate_limit_messages_per_minute,
    ));
    let registry = Arc::new(RendezvousRegistry::new());
    let hub = Arc::new(RoomHub::new());
    let metrics = Arc::new(Metrics::new());
    let config = Arc::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pruner_registry = registry.clone();
    let pruner_clock = clock.clone();

    let figment = rocket::Config::figment().merge(("port", config.port));

    rocket::custom(figment)
        .manage(config)
        .manage(clock)
        .manage(verifier)
        .manage(rate_limiter)
        .manage(registry)
        .manage(hub)
        .manage(metrics)
        .manage(shutdown_tx)
        .attach(routes::Cors)
        .register(
            "/",
            rocket::catchers![
                routes::not_found,
                routes::too_many_requests,
                routes::unauthorized
            ],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::metrics_text,
                routes::bootstrap,
                routes::register,
                routes::discover,
                routes::signal::signal,
                routes::options_preflight,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Rendezvous Pruner",
            move |_rocket| {
                Box::pin(async move {
                    pruner::spawn_pruner_task(pruner_registry, pruner_clock, shutdown_rx);
                    tracing::info!(message = "pruner.started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Rendezvous Pruner Shutdown",
            |rocket| {
                Box::pin(async move {
                    if let Some(tx) = rocket.state::<watch::Sender<bool>>() {
                        let _ = tx.send(true);
                    }
                })
            },
        ))
}
