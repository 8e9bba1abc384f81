use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rocthinc_license::LicenseStore;
use rocthinc_server::handlers::AppState;
use rocthinc_server::Config;

const BIND_ADDRESS: &str = "0.0.0.0:8787";
const DATABASE_PATH: &str = "rocthinc.db";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let store = Arc::new(LicenseStore::open(DATABASE_PATH)?);
    let state = AppState {
        store,
        webhook_secret: config.webhook_secret,
        http: rocthinc_server::export::http_client(),
    };

    let listener = tokio::net::TcpListener::bind(BIND_ADDRESS).await?;
    tracing::info!(address = BIND_ADDRESS, "rocthinc server listening");
    axum::serve(listener, rocthinc_server::app(state)).await?;
    Ok(())
}
