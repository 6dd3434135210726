mod config;
mod erpnext;
mod parse;
mod sync;
mod types;
mod webhook;

use config::Config;
use erpnext::ErpNextClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use webhook::AppState;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadhook=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.dry_run {
        warn!("DRY_RUN mode enabled - leads and communications will NOT be written to ERPNext");
    }

    let crm = Arc::new(ErpNextClient::new(
        config.erp_url.clone(),
        config.erp_api_key.clone(),
        config.erp_api_secret.clone(),
    ));

    // Check the API credentials (with timeout to avoid blocking server startup)
    info!("Checking ERPNext credentials against {}", config.erp_url);
    match tokio::time::timeout(Duration::from_secs(10), crm.logged_user()).await {
        Ok(Ok(response)) if response.is_success() => {
            info!("ERPNext authenticated: {}", response.body);
        }
        Ok(Ok(response)) => {
            warn!(
                "ERPNext rejected credentials: {} {}",
                response.status, response.body
            );
        }
        Ok(Err(e)) => {
            warn!("ERPNext unreachable: {}", e);
        }
        Err(_) => {
            warn!("ERPNext credential check timed out after 10 seconds");
        }
    }

    let state = AppState {
        crm,
        verify_token: config.verify_token.clone(),
        lead_defaults: config.lead_defaults.clone(),
        dry_run: config.dry_run,
    };

    let app = webhook::router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
