use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use dotenv::dotenv;
use factoria_core::auth::{JwtVerifier, PgIdentityProvider};
use factoria_core::config::Config;
use factoria_core::extraction::{GeminiClient, GenerativeModel, InvoiceExtractor, PdfTextExtractor};
use factoria_core::invoices::{InvoiceService, PgInvoiceRepository};
use factoria_core::profiles::PgSupplierRepository;
use factoria_core::storage::LocalBlobStore;
use factoria_core::{create_router, db, AppState};
use tower_http::cors::CorsLayer;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the CORS layer from the configured origins. Unparseable origins
/// are logged and skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Factoria Core Server...");

    let config = Config::from_env()?;

    // Document store
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!("Connected to document store");

    let identity = Arc::new(PgIdentityProvider::new(
        JwtVerifier::new(&config.jwt_secret),
        pool.clone(),
    ));
    let suppliers = Arc::new(PgSupplierRepository::new(pool.clone()));
    let invoices = Arc::new(PgInvoiceRepository::new(pool));

    tokio::fs::create_dir_all(&config.blob_root).await?;
    let blobs = Arc::new(LocalBlobStore::new(config.blob_root.clone()));
    info!("Blob store rooted at {}", config.blob_root.display());

    let model: Option<Arc<dyn GenerativeModel>> = match &config.gemini {
        Some(gemini) => {
            info!("Gemini AI enabled (model: {})", gemini.model_id);
            Some(Arc::new(GeminiClient::new(gemini)?))
        }
        None => {
            warn!("GEMINI_API_KEY not set, AI extraction disabled");
            None
        }
    };

    let service = Arc::new(InvoiceService::new(
        invoices,
        suppliers.clone(),
        identity.clone(),
        blobs,
        Arc::new(PdfTextExtractor),
        InvoiceExtractor::new(model),
    ));

    let app_state = AppState {
        identity,
        suppliers,
        invoices: service,
    };

    let app = create_router(app_state).layer(cors_layer(&config.cors_origins));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
