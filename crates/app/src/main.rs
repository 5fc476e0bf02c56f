//! Marquee - cinema booking engine host
//!
//! Opens the shared booking database, applies migrations, and releases lapsed
//! holds on a fixed interval until interrupted. Hold expiry is already honoured
//! at read time; the sweep only keeps stored state tidy.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use marquee_core::{BookingService, EngineConfig};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Marquee");

    let config = match EngineConfig::discover() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let interval = config.sweep_interval();

    let service = match BookingService::open(config) {
        Ok(service) => Arc::new(Mutex::new(service)),
        Err(e) => {
            error!("Failed to open booking database: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    run_sweeper(service, interval, shutdown).await;
    info!("Marquee stopped");
}

/// Sweep once per `interval` until `shutdown` resolves
async fn run_sweeper<S>(service: Arc<Mutex<BookingService>>, interval: Duration, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_once(service.clone()).await;
            }
            _ = &mut shutdown => {
                debug!("Sweeper shutting down");
                break;
            }
        }
    }
}

/// One sweep on the blocking pool. Returns the number of holds released.
async fn sweep_once(service: Arc<Mutex<BookingService>>) -> usize {
    let result = tokio::task::spawn_blocking(move || {
        let service = match service.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        service.reservations().sweep_expired()
    })
    .await;

    match result {
        Ok(Ok(released)) => released,
        Ok(Err(e)) => {
            warn!(error = %e, "Expiry sweep failed");
            0
        }
        Err(e) => {
            error!(error = %e, "Expiry sweep task panicked");
            0
        }
    }
}
