pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod invoices;
pub mod models;
pub mod profiles;
pub mod storage;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use tower_http::trace::TraceLayer;

use crate::auth::IdentityProvider;
use crate::invoices::InvoiceService;
use crate::profiles::SupplierRepository;

/// Largest accepted request body (uploads included).
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared by every handler.
///
/// Every field is a process-wide handle built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Token verification and the user directory
    pub identity: Arc<dyn IdentityProvider>,
    /// Supplier profile store
    pub suppliers: Arc<dyn SupplierRepository>,
    /// Invoice lifecycle manager
    pub invoices: Arc<InvoiceService>,
}

/// Health check endpoint.
///
/// Always answers `200`; the per-service map shows which dependencies are
/// reachable or configured.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let document_store = if state.invoices.document_store_ok().await {
        "ok"
    } else {
        "error"
    };
    let gemini_ai = if state.invoices.ai_enabled() {
        "ok"
    } else {
        "disabled"
    };

    Json(serde_json::json!({
        "status": "healthy",
        "service": "factoria-core",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "document_store": document_store,
            "blob_store": "ok",
            "gemini_ai": gemini_ai,
        }
    }))
}

/// Creates the main application router.
///
/// `/health` is public; every other route goes through [`auth::auth_middleware`].
///
/// # Arguments
///
/// * `state` - The application state with the injected service handles
///
/// # Returns
///
/// Returns a configured Axum Router. CORS is layered on by the binary.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route("/invoices/:id/process", post(invoices::process_invoice))
        .route("/invoices/:id/status", patch(invoices::update_invoice_status))
        .route("/dashboard/stats", get(invoices::dashboard_stats))
        .route("/suppliers", get(admin::list_suppliers))
        .route("/admin/set-role", post(admin::set_role))
        .route(
            "/profile",
            get(profiles::get_profile).put(profiles::put_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::InvoiceExtractor;
    use crate::testing::{Harness, ADMIN_TOKEN, OTHER_SUPPLIER_TOKEN, SUPPLIER_TOKEN};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "factoria-test-boundary";

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn upload_request(token: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/pdf\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = filename,
            c = content
        );
        Request::builder()
            .method(Method::POST)
            .uri("/invoices")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let harness = Harness::new(InvoiceExtractor::disabled());
        let (status, body) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/health", None, None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["services"]["document_store"], "ok");
        assert_eq!(body["services"]["blob_store"], "ok");
        assert_eq!(body["services"]["gemini_ai"], "disabled");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let harness = Harness::new(InvoiceExtractor::disabled());

        let (status, body) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/invoices", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not authenticated");

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/profile", Some("forged"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_then_list_over_http() {
        let harness = Harness::new(InvoiceExtractor::disabled());

        let (status, created) = send(
            create_router(harness.state.clone()),
            upload_request(SUPPLIER_TOKEN, "factura.pdf", "contenido de prueba"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Recibida");
        let id = created["invoiceId"].as_str().unwrap().to_string();
        assert!(created["message"].as_str().unwrap().contains(&id));

        let (status, listed) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/invoices", Some(SUPPLIER_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["items"][0]["invoiceId"], id.as_str());
        assert_eq!(listed["items"][0]["processed"], false);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_over_http() {
        let harness = Harness::new(InvoiceExtractor::disabled());
        let (status, body) = send(
            create_router(harness.state.clone()),
            upload_request(SUPPLIER_TOKEN, "report.txt", "hola"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request");
    }

    #[tokio::test]
    async fn test_admin_routes_forbid_suppliers() {
        let harness = Harness::new(InvoiceExtractor::disabled());

        for (method, uri, body) in [
            (Method::POST, "/invoices/inv_x/process", None),
            (
                Method::PATCH,
                "/invoices/inv_x/status",
                Some(json!({"status": "Pagada"})),
            ),
            (Method::GET, "/dashboard/stats", None),
            (Method::GET, "/suppliers", None),
            (
                Method::POST,
                "/admin/set-role",
                Some(json!({"uid": "supplier-1", "role": "admin"})),
            ),
        ] {
            let (status, _) = send(
                create_router(harness.state.clone()),
                request(method, uri, Some(SUPPLIER_TOKEN), body),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_callers_are_recorded_and_promotion_applies_over_http() {
        let harness = Harness::new(InvoiceExtractor::disabled());

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/profile", Some(OTHER_SUPPLIER_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, listing) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/suppliers", Some(ADMIN_TOKEN), None),
        )
        .await;
        let uids: Vec<&str> = listing["suppliers"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["uid"].as_str())
            .collect();
        assert!(uids.contains(&"supplier-2"));
        assert!(uids.contains(&"admin-1"));

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/dashboard/stats", Some(OTHER_SUPPLIER_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(
                Method::POST,
                "/admin/set-role",
                Some(ADMIN_TOKEN),
                Some(json!({"uid": "supplier-2", "role": "admin"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(Method::GET, "/dashboard/stats", Some(OTHER_SUPPLIER_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_update_over_http() {
        let harness = Harness::new(InvoiceExtractor::disabled());
        let (_, created) = send(
            create_router(harness.state.clone()),
            upload_request(SUPPLIER_TOKEN, "factura.pdf", "contenido"),
        )
        .await;
        let uri = format!("/invoices/{}/status", created["invoiceId"].as_str().unwrap());

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(
                Method::PATCH,
                &uri,
                Some(ADMIN_TOKEN),
                Some(json!({"status": "Cancelada"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            create_router(harness.state.clone()),
            request(
                Method::PATCH,
                &uri,
                Some(ADMIN_TOKEN),
                Some(json!({"status": "Por Pagar"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["newStatus"], "Por Pagar");

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(
                Method::PATCH,
                "/invoices/inv_000000000000/status",
                Some(ADMIN_TOKEN),
                Some(json!({"status": "Pagada"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_process_short_text_over_http() {
        let harness = Harness::new(InvoiceExtractor::disabled());
        let (_, created) = send(
            create_router(harness.state.clone()),
            upload_request(SUPPLIER_TOKEN, "factura.pdf", "short text"),
        )
        .await;
        let uri = format!("/invoices/{}/process", created["invoiceId"].as_str().unwrap());

        let (status, _) = send(
            create_router(harness.state.clone()),
            request(Method::POST, &uri, Some(ADMIN_TOKEN), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
