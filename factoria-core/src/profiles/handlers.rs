use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::auth::{CurrentUser, Identity};
use crate::error::ApiError;
use crate::models::{ProfileUpdate, SupplierProfile};
use crate::AppState;

/// Renders a stored profile merged with the caller's uid and role.
fn profile_view(identity: &Identity, profile: Option<&SupplierProfile>) -> Result<Value, ApiError> {
    let mut view = match profile {
        Some(p) => match serde_json::to_value(p) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(ApiError::Dependency(format!("error encoding profile: {}", e))),
        },
        None => Map::new(),
    };
    view.insert("uid".to_string(), json!(identity.uid));
    view.insert("role".to_string(), json!(identity.role));
    Ok(Value::Object(view))
}

/// `GET /profile`: the caller's own supplier profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let profile = state.suppliers.get(&identity.uid).await?;
    Ok(Json(profile_view(&identity, profile.as_ref())?))
}

/// `PUT /profile`: creates or merges the caller's supplier profile.
///
/// The body must be a non-empty JSON object; unknown keys are ignored.
pub async fn put_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    match body.as_object() {
        Some(fields) if !fields.is_empty() => {}
        Some(_) => return Err(ApiError::Validation("empty body".to_string())),
        None => return Err(ApiError::Validation("body must be a JSON object".to_string())),
    }

    let update: ProfileUpdate = serde_json::from_value(body)
        .map_err(|e| ApiError::Validation(format!("invalid profile: {}", e)))?;

    let profile = state
        .suppliers
        .upsert(&identity.uid, &update, Utc::now())
        .await?;

    info!("Profile updated for {}", identity.uid);

    Ok(Json(json!({
        "message": "Perfil actualizado",
        "profile": profile_view(&identity, Some(&profile))?,
    })))
}
