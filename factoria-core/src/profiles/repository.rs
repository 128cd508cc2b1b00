use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::supplier::DEFAULT_PROFILE_STATUS;
use crate::models::{ProfileUpdate, SupplierProfile};

/// Document-store access for supplier profiles.
#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<SupplierProfile>, ApiError>;

    /// Creates or merges the profile; fields absent from `update` keep their
    /// stored value. Returns the profile as stored.
    async fn upsert(
        &self,
        uid: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<SupplierProfile, ApiError>;
}

pub struct PgSupplierRepository {
    pool: PgPool,
}

impl PgSupplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SupplierRepository for PgSupplierRepository {
    async fn get(&self, uid: &str) -> Result<Option<SupplierProfile>, ApiError> {
        let profile = sqlx::query_as::<_, SupplierProfile>(
            r#"
            SELECT uid, tax_id, legal_name, legal_representative, address, status, updated_at
            FROM suppliers
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn upsert(
        &self,
        uid: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<SupplierProfile, ApiError> {
        // COALESCE keeps stored values for fields the caller left out.
        let profile = sqlx::query_as::<_, SupplierProfile>(
            r#"
            INSERT INTO suppliers (
                uid, tax_id, legal_name, legal_representative, address, status, updated_at
            ) VALUES ($1, $2, $3, $4, $5, COALESCE($6, $7), $8)
            ON CONFLICT (uid) DO UPDATE SET
                tax_id = COALESCE(EXCLUDED.tax_id, suppliers.tax_id),
                legal_name = COALESCE(EXCLUDED.legal_name, suppliers.legal_name),
                legal_representative = COALESCE(EXCLUDED.legal_representative, suppliers.legal_representative),
                address = COALESCE(EXCLUDED.address, suppliers.address),
                status = COALESCE($6, suppliers.status),
                updated_at = EXCLUDED.updated_at
            RETURNING uid, tax_id, legal_name, legal_representative, address, status, updated_at
            "#,
        )
        .bind(uid)
        .bind(&update.tax_id)
        .bind(&update.legal_name)
        .bind(&update.legal_representative)
        .bind(&update.address)
        .bind(&update.status)
        .bind(DEFAULT_PROFILE_STATUS)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }
}
