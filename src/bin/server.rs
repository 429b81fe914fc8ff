use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use shout_relay::config::{ModerationSource, RelayConfig};
use shout_relay::constants::WS_PATH;
use shout_relay::core::relay::{Relay, SharedRelay};
use shout_relay::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, cooldown={}s, max_chars={}",
        config.host,
        config.port,
        config.cooldown.as_secs(),
        config.max_message_chars
    );
    if config.moderation == ModerationSource::Passthrough {
        warn!("No moderation backend configured; messages are broadcast unmoderated");
    }

    let relay: SharedRelay = match Relay::from_config(&config) {
        Ok(relay) => Arc::new(relay),
        Err(e) => {
            error!("Failed to start relay: {}", e);
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let routes = routes(relay.clone(), config.static_index.clone());

    match (config.enable_tls, &config.tls_cert_path, &config.tls_key_path) {
        (true, Some(cert), Some(key)) => {
            info!("Starting relay on wss://{}/{}", addr, WS_PATH);
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        _ => {
            info!("Starting relay on ws://{}/{}", addr, WS_PATH);
            warp::serve(routes).run(addr).await;
        }
    }
}
