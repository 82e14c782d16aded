//! # eSign Relay Service
//!
//! Binary entry point for the e-signature webhook relay.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Builds the downstream forwarder when a URL is configured
//! - Starts the HTTP server from esign-relay-api

use esign_relay_api::{start_server, AppState, ConfigError, LoggingConfig, ServiceConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Operator-specified configuration file
const CONFIG_FILE_ENV: &str = "ESR_CONFIG_FILE";

/// Prefix for configuration overrides, e.g. `ESR__SERVER__PORT=9090`
const ENV_PREFIX: &str = "ESR";

/// Single-variable downstream URL used by older deployments
const LEGACY_URL_ENV: &str = "GAS_WEBHOOK_URL";

const CONFIG_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    let loaded = load_config(std::env::var(CONFIG_FILE_ENV).ok());

    // Logging settings come from the config, so a broken config still gets
    // default logging to report itself.
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    info!("Starting eSign Relay Service");

    let mut service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    if service_config
        .relay
        .apply_legacy_url(std::env::var(LEGACY_URL_ENV).ok())
    {
        info!(variable = LEGACY_URL_ENV, "Downstream URL taken from legacy variable");
    }

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(CONFIG_EXIT_CODE);
    }

    match service_config.relay.downstream_url.as_deref() {
        Some(url) if service_config.relay.forwarding_enabled() => {
            info!(downstream_url = %url, "Forwarding enabled");
        }
        _ => warn!("No downstream URL configured; events will be acknowledged but not forwarded"),
    }

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        endpoint = %service_config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    let state = match AppState::from_config(service_config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize service");
            std::process::exit(e.exit_code());
        }
    };

    match start_server(state).await {
        Ok(summary) => info!(
            delivered = summary.delivered,
            exhausted = summary.exhausted,
            abandoned = summary.abandoned,
            "Service stopped"
        ),
        Err(e) => {
            error!("Failed to start server: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Load configuration from layered sources
///
/// Sources (applied in order, later sources override earlier ones):
///  1. /etc/esign-relay/service.yaml   system-wide defaults
///  2. ./config/service.yaml           deployment-local override
///  3. `explicit_path`                 operator-specified file (required)
///  4. Environment variables prefixed ESR__ (double-underscore separator)
///
/// Every field has a serde default, so no sources at all is a valid setup.
/// A malformed file or an uncoercible variable is a hard error.
fn load_config(explicit_path: Option<String>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/esign-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path.filter(|p| !p.is_empty()) {
        builder = builder.add_source(
            config::File::with_name(&path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Loading {
            message: e.to_string(),
        })
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn default_filter(level: &str) -> String {
    format!(
        "esign_relay_service={level},esign_relay_api={level},esign_relay_core={level},tower_http=debug"
    )
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
