use crate::config::Settings;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Inicjalizacja logowania.
/// RUST_LOG ma pierwszeństwo, potem `logging.level`. `logging.json = true` => format JSON.
/// Drugie wywołanie (np. w testach) zwraca błąd zamiast panikować.
pub fn init(settings: &Settings) -> Result<(), TryInitError> {
    let level = settings
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "info".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = settings.logging.json.unwrap_or(false);
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
