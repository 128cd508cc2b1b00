use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::invoices::stats::DashboardStats;
use crate::models::invoice::UpdateStatus;
use crate::AppState;

/// Multipart field carrying the PDF.
const FILE_FIELD: &str = "file";

/// Upload endpoint handler.
///
/// Handles `POST /invoices` with a multipart body whose `file` field holds
/// the PDF. The record is created unprocessed; AI extraction is a separate
/// admin step.
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("error reading upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::Validation("no file was sent".to_string()))?;

    info!(
        "Upload from {}: {:?} ({} bytes)",
        identity.uid,
        filename,
        bytes.len()
    );

    let created = state
        .invoices
        .create(&identity, filename.as_deref(), &bytes)
        .await?;

    let message = format!(
        "Factura subida. Use /invoices/{}/process para procesarla con IA",
        created.invoice_id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "invoiceId": created.invoice_id,
            "status": created.status,
            "storagePath": created.storage_path,
            "message": message,
        })),
    ))
}

/// AI processing endpoint handler (`POST /invoices/:id/process`). Admin only.
pub async fn process_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let processed = state.invoices.process(&identity, &invoice_id).await?;

    Ok(Json(json!({
        "message": "Factura procesada exitosamente",
        "invoiceId": processed.invoice_id,
        "es_factura": processed.data.is_invoice,
        "extracted_data": processed.data,
    })))
}

/// Listing endpoint handler (`GET /invoices`).
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let items = state.invoices.list(&identity).await?;

    Ok(Json(json!({
        "total": items.len(),
        "items": items,
    })))
}

/// Status change endpoint handler (`PATCH /invoices/:id/status`). Admin only.
///
/// The role is checked before the body is looked at, so non-admins always
/// get `403` regardless of what they send.
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
    Path(invoice_id): Path<String>,
    body: Result<Json<UpdateStatus>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    identity.require_admin()?;

    let status = match body {
        Ok(Json(update)) => update.status,
        Err(rejection) => {
            warn!("Rejected status body: {}", rejection);
            return Err(ApiError::Validation(rejection.body_text()));
        }
    };

    let new_status = state
        .invoices
        .update_status(&identity, &invoice_id, status.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Estado actualizado",
        "invoiceId": invoice_id,
        "newStatus": new_status,
    })))
}

/// Dashboard aggregates endpoint handler (`GET /dashboard/stats`). Admin only.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.invoices.stats(&identity).await?;
    Ok(Json(stats))
}
