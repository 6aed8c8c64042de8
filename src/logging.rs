//! Tracing subscriber setup used by the binary.

use std::env;

use tracing_subscriber::{EnvFilter, fmt};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true);

    let json = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // Leaves an already installed subscriber in place.
    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.with_ansi(true).try_init().is_ok()
    };

    if installed {
        tracing::info!(json, "logger initialized");
    }
}
