use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Loads `.env` first so `RUST_LOG` is available; falls back to `info`.
/// Safe to call more than once, later calls are ignored.
pub fn init_tracing() {
    let _ = dotenvy::dotenv();

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
