//! # Embedded Server - Entry Point
//! src/main.rs
//!
//! Levanta el servidor embebido en modo red para revisar la aplicación desde
//! el navegador. Los recursos estáticos se sirven desde las ubicaciones base;
//! el front filter invalida sesiones de forma diferida.

use embedded_server::config::Config;
use embedded_server::container::FilterPipeline;
use embedded_server::filter::{LazySessionInvalidationFilter, Router};
use embedded_server::server::{EmbeddedServer, ServerError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::new();
    info!(config = %config.summary(), "configuration loaded");

    if let Err(e) = run(&config) {
        error!(error = %e, cause = ?std::error::Error::source(&e).map(|s| s.to_string()), "fatal error");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), ServerError> {
    let mut server = EmbeddedServer::from_config(config)?;

    let front_filter = FilterPipeline::new()
        .with_filter(Arc::new(LazySessionInvalidationFilter::new()))
        .with_filter(Arc::new(Router::new()));
    server.set_front_filter(Arc::new(front_filter));

    server.start()?;
    info!(address = %config.address(), "serving; press Ctrl+C to stop");
    server.join();
    Ok(())
}
