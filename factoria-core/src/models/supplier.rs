use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::extraction::types::lenient_string;

/// Status given to a profile created without an explicit one.
pub const DEFAULT_PROFILE_STATUS: &str = "activo";

/// Supplier profile, keyed by the owner's subject id.
///
/// Maps to the `suppliers` table. Upserted by its owner, read by anyone
/// resolving invoice-owner metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplierProfile {
    #[serde(skip_serializing)]
    pub uid: String,

    /// Tax id (RUC)
    #[serde(rename = "ruc")]
    pub tax_id: Option<String>,

    #[serde(rename = "razonSocial")]
    pub legal_name: Option<String>,

    #[serde(rename = "representanteLegal")]
    pub legal_representative: Option<String>,

    #[serde(rename = "direccion")]
    pub address: Option<String>,

    pub status: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// Profile upsert body. Absent fields keep their stored value.
///
/// Values are decoded leniently, so a tax id sent as a JSON number is kept
/// as its digits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "ruc", default, deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,

    #[serde(rename = "razonSocial", default, deserialize_with = "lenient_string")]
    pub legal_name: Option<String>,

    #[serde(rename = "representanteLegal", default, deserialize_with = "lenient_string")]
    pub legal_representative: Option<String>,

    #[serde(rename = "direccion", default, deserialize_with = "lenient_string")]
    pub address: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl SupplierProfile {
    /// Applies an update with merge semantics.
    ///
    /// `existing` is the stored profile, if any. A brand-new profile without a
    /// status gets [`DEFAULT_PROFILE_STATUS`].
    pub fn merged(
        uid: &str,
        existing: Option<SupplierProfile>,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> SupplierProfile {
        match existing {
            Some(current) => SupplierProfile {
                uid: current.uid,
                tax_id: update.tax_id.or(current.tax_id),
                legal_name: update.legal_name.or(current.legal_name),
                legal_representative: update
                    .legal_representative
                    .or(current.legal_representative),
                address: update.address.or(current.address),
                status: update.status.or(current.status),
                updated_at: now,
            },
            None => SupplierProfile {
                uid: uid.to_string(),
                tax_id: update.tax_id,
                legal_name: update.legal_name,
                legal_representative: update.legal_representative,
                address: update.address,
                status: Some(
                    update
                        .status
                        .unwrap_or_else(|| DEFAULT_PROFILE_STATUS.to_string()),
                ),
                updated_at: now,
            },
        }
    }
}
