//! Admin-only directory endpoints: supplier listing and role assignment.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::user::SetRoleRequest;
use crate::models::{DirectoryUser, Role, SupplierProfile};
use crate::AppState;

/// Profile fields shown next to each directory entry; all null when the user
/// never saved a profile.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub ruc: Option<String>,
    pub razon_social: Option<String>,
    pub representante_legal: Option<String>,
    pub direccion: Option<String>,
    pub status: Option<String>,
}

impl From<SupplierProfile> for ProfileSummary {
    fn from(profile: SupplierProfile) -> Self {
        ProfileSummary {
            ruc: profile.tax_id,
            razon_social: profile.legal_name,
            representante_legal: profile.legal_representative,
            direccion: profile.address,
            status: profile.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SupplierEntry {
    #[serde(flatten)]
    pub user: DirectoryUser,
    pub profile: ProfileSummary,
}

/// `GET /suppliers`: every identity in the directory with its profile.
///
/// A profile that fails to load is logged and rendered as empty.
pub async fn list_suppliers(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    identity.require_admin()?;

    let users = state.identity.list_users().await?;
    let mut suppliers = Vec::with_capacity(users.len());

    for user in users {
        let profile = match state.suppliers.get(&user.uid).await {
            Ok(profile) => profile.map(ProfileSummary::from).unwrap_or_default(),
            Err(e) => {
                warn!("Error loading profile for {}: {}", user.uid, e);
                ProfileSummary::default()
            }
        };
        suppliers.push(SupplierEntry { user, profile });
    }

    Ok(Json(json!({
        "total": suppliers.len(),
        "suppliers": suppliers,
    })))
}

/// `POST /admin/set-role`: assigns a role claim to a user.
///
/// The subject must have signed in at least once. The new role applies from
/// their next request.
pub async fn set_role(
    State(state): State<AppState>,
    Extension(CurrentUser(identity)): Extension<CurrentUser>,
    body: Result<Json<SetRoleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    identity.require_admin()?;

    let Json(request) = body.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    let (uid, role) = match (request.uid, request.role) {
        (Some(uid), Some(role)) if !uid.trim().is_empty() => (uid, role),
        _ => return Err(ApiError::Validation("uid and role are required".to_string())),
    };
    let role: Role = role.parse().map_err(ApiError::Validation)?;

    state.identity.set_role(&uid, role).await?;
    info!("{} assigned role {} to {}", identity.uid, role, uid);

    Ok(Json(json!({
        "message": format!("Rol {} asignado a {}", role, uid),
        "uid": uid,
        "role": role,
    })))
}
