//! Deployment entry point for the predictive insights service.
//!
//! Resolves configuration from the environment once, then serves the REST
//! surface built by `api-rest` (CDS Hooks endpoints plus the dashboard's
//! `/api/*` routes).

use api_rest::{build_router, load_config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the predictive insights service
///
/// # Environment Variables
/// - `INSIGHTS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FHIR_BASE_URL`: FHIR API base (default: "https://app.meldrx.com/api/fhir")
/// - `FHIR_APP_ID`: tenant/app id scoping every FHIR call
/// - `AI_BACKEND_URL`: analysis backend endpoint
/// - `AI_BACKEND_TOKEN`: bearer token for the analysis backend (optional)
/// - `LAUNCH_URL`: SMART launch URL advertised on CDS cards
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("insights=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("INSIGHTS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting predictive insights REST on {}", rest_addr);

    let state = AppState::new(load_config()?)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
