use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::extraction::ExtractedInvoiceData;
use crate::models::{Invoice, InvoiceStatus};

const INVOICE_COLUMNS: &str = r#"
    id, supplier_uid, storage_path, original_filename, status,
    is_invoice, summary, total_amount, currency, issuer_tax_id, issuer_name,
    issue_date, due_date, invoice_number, concept, confidence,
    processed, created_at, processed_at, last_updated_at, last_updated_by
"#;

/// Document-store access for invoice records.
///
/// Writes are per record; there are no cross-record transactions and no
/// optimistic concurrency checks (last write wins).
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), ApiError>;

    async fn get(&self, id: &str) -> Result<Option<Invoice>, ApiError>;

    /// Newest first, at most `limit` records, optionally restricted to one owner.
    async fn list_recent(&self, owner: Option<&str>, limit: i64) -> Result<Vec<Invoice>, ApiError>;

    async fn all(&self) -> Result<Vec<Invoice>, ApiError>;

    /// Stores the extracted fields and flips `processed`. Returns false when
    /// the record does not exist.
    async fn mark_processed(
        &self,
        id: &str,
        data: &ExtractedInvoiceData,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, ApiError>;

    /// Returns false when the record does not exist.
    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_by: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, ApiError>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), ApiError>;
}

/// Postgres-backed invoice repository.
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, supplier_uid, storage_path, original_filename, status,
                processed, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.supplier_uid)
        .bind(&invoice.storage_path)
        .bind(&invoice.original_filename)
        .bind(invoice.status)
        .bind(invoice.processed)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Invoice>, ApiError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    async fn list_recent(&self, owner: Option<&str>, limit: i64) -> Result<Vec<Invoice>, ApiError> {
        let invoices = match owner {
            Some(uid) => {
                sqlx::query_as::<_, Invoice>(&format!(
                    "SELECT {} FROM invoices WHERE supplier_uid = $1 ORDER BY created_at DESC LIMIT $2",
                    INVOICE_COLUMNS
                ))
                .bind(uid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Invoice>(&format!(
                    "SELECT {} FROM invoices ORDER BY created_at DESC LIMIT $1",
                    INVOICE_COLUMNS
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(invoices)
    }

    async fn all(&self) -> Result<Vec<Invoice>, ApiError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices",
            INVOICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    async fn mark_processed(
        &self,
        id: &str,
        data: &ExtractedInvoiceData,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                is_invoice = $2,
                summary = $3,
                total_amount = $4,
                currency = $5,
                issuer_tax_id = $6,
                issuer_name = $7,
                issue_date = $8,
                due_date = $9,
                invoice_number = $10,
                concept = $11,
                confidence = $12,
                processed = TRUE,
                processed_at = $13
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(data.is_invoice)
        .bind(&data.summary)
        .bind(&data.total_amount)
        .bind(&data.currency)
        .bind(&data.issuer_tax_id)
        .bind(&data.issuer_name)
        .bind(&data.issue_date)
        .bind(&data.due_date)
        .bind(&data.invoice_number)
        .bind(&data.concept)
        .bind(data.confidence.unwrap_or(0))
        .bind(processed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_by: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $2, last_updated_by = $3, last_updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(updated_by)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        crate::db::ping(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_pool() -> Result<PgPool, anyhow::Error> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL not set for tests"))?;

        let pool = crate::db::create_pool(&database_url, 2).await?;
        crate::db::run_migrations(&pool).await?;
        Ok(pool)
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_insert_process_and_status_round_trip() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let repo = PgInvoiceRepository::new(pool);

        let id = format!("inv_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let invoice = Invoice::received(
            id.clone(),
            "pg-test-user".into(),
            format!("invoices/pg-test-user/{}.pdf", id),
            "factura.pdf".into(),
            Utc::now(),
        );
        repo.insert(&invoice).await.expect("insert should succeed");

        let stored = repo.get(&id).await.unwrap().expect("invoice should exist");
        assert_eq!(stored.status, InvoiceStatus::Received);
        assert!(!stored.processed);

        let data = crate::extraction::placeholder_data();
        assert!(repo.mark_processed(&id, &data, Utc::now()).await.unwrap());
        assert!(repo
            .update_status(&id, InvoiceStatus::Paid, "admin", Utc::now())
            .await
            .unwrap());

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert!(stored.processed);
        assert_eq!(stored.confidence, Some(85));
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.last_updated_by.as_deref(), Some("admin"));

        let own = repo.list_recent(Some("pg-test-user"), 100).await.unwrap();
        assert!(own.iter().all(|i| i.supplier_uid == "pg-test-user"));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_long_extracted_values_are_stored() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let repo = PgInvoiceRepository::new(pool);

        let id = format!("inv_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        repo.insert(&Invoice::received(
            id.clone(),
            "pg-test-user".into(),
            format!("invoices/pg-test-user/{}.pdf", id),
            "factura.pdf".into(),
            Utc::now(),
        ))
        .await
        .unwrap();

        let mut data = crate::extraction::placeholder_data();
        data.currency = Some("Nuevos Soles (PEN) - moneda nacional".into());
        data.issue_date = Some("primero de noviembre de dos mil veinticinco".into());
        data.issuer_tax_id = Some("RUC 20100070970 / DNI 12345678 / CE 000123456".into());
        data.invoice_number = Some("F".repeat(120));

        assert!(repo.mark_processed(&id, &data, Utc::now()).await.unwrap());

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert!(stored.processed);
        assert_eq!(stored.currency, data.currency);
        assert_eq!(stored.invoice_number, data.invoice_number);
    }
}
