use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{Identity, IdentityProvider};
use crate::error::ApiError;
use crate::extraction::{
    is_usable_text, ExtractedInvoiceData, ExtractionOutcome, InvoiceExtractor, TextExtractor,
};
use crate::invoices::repository::InvoiceRepository;
use crate::invoices::stats::{compute_stats, DashboardStats};
use crate::models::{Invoice, InvoiceListItem, InvoiceStatus};
use crate::profiles::repository::SupplierRepository;
use crate::storage::BlobStore;

/// Maximum number of records returned by a listing.
pub const LIST_LIMIT: i64 = 100;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub status: InvoiceStatus,
    pub storage_path: String,
}

/// Result of a successful AI processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedInvoice {
    pub invoice_id: String,
    pub data: ExtractedInvoiceData,
}

/// Orchestrates the invoice lifecycle: upload, on-demand AI processing,
/// status changes, listings and dashboard aggregates.
///
/// All collaborators are process-wide handles injected at startup.
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    suppliers: Arc<dyn SupplierRepository>,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
    text: Arc<dyn TextExtractor>,
    extractor: InvoiceExtractor,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        suppliers: Arc<dyn SupplierRepository>,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
        text: Arc<dyn TextExtractor>,
        extractor: InvoiceExtractor,
    ) -> Self {
        Self {
            invoices,
            suppliers,
            identity,
            blobs,
            text,
            extractor,
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.extractor.is_enabled()
    }

    pub async fn document_store_ok(&self) -> bool {
        match self.invoices.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Document store health check failed: {}", e);
                false
            }
        }
    }

    /// Stores an uploaded PDF and creates its record.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the file is empty, unnamed or not a
    /// `.pdf`, and a dependency error when storage or the document store fails.
    #[instrument(skip(self, identity, bytes), fields(uid = %identity.uid, size = bytes.len()))]
    pub async fn create(
        &self,
        identity: &Identity,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<CreatedInvoice, ApiError> {
        let filename = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::Validation("empty file name".to_string()))?;

        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(ApiError::Validation("only PDF files are allowed".to_string()));
        }
        if bytes.is_empty() {
            return Err(ApiError::Validation("empty file".to_string()));
        }

        let invoice_id = new_invoice_id();
        let storage_path = storage_path(&identity.uid, &invoice_id);

        self.blobs
            .put(&storage_path, bytes, PDF_CONTENT_TYPE)
            .await
            .map_err(|e| ApiError::Dependency(format!("error uploading to storage: {}", e)))?;

        let invoice = Invoice::received(
            invoice_id.clone(),
            identity.uid.clone(),
            storage_path.clone(),
            sanitize_filename(filename),
            Utc::now(),
        );
        self.invoices.insert(&invoice).await?;

        info!("Invoice {} uploaded to {}", invoice_id, storage_path);

        Ok(CreatedInvoice {
            invoice_id,
            status: invoice.status,
            storage_path,
        })
    }

    /// Runs AI extraction over a stored invoice. Admin only.
    ///
    /// The record is only written when extraction succeeds; on any failure it
    /// is left untouched so the call can simply be repeated.
    #[instrument(skip(self, identity), fields(uid = %identity.uid))]
    pub async fn process(
        &self,
        identity: &Identity,
        invoice_id: &str,
    ) -> Result<ProcessedInvoice, ApiError> {
        identity.require_admin()?;

        let invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("invoice {} not found", invoice_id)))?;

        let bytes = self
            .blobs
            .get(&invoice.storage_path)
            .await
            .map_err(|e| ApiError::Dependency(format!("error downloading PDF: {}", e)))?;

        let extractor = Arc::clone(&self.text);
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes))
            .await
            .map_err(|e| ApiError::Dependency(format!("text extraction task failed: {}", e)))?;

        if !is_usable_text(&text) {
            return Err(ApiError::Validation(
                "could not extract text from the PDF; it may be scanned or contain no text layer"
                    .to_string(),
            ));
        }

        let data = match self.extractor.extract(&text).await {
            ExtractionOutcome::Extracted(data) => data,
            ExtractionOutcome::Failed(failure) => {
                let resumen = failure.resumen();
                return Err(ApiError::Extraction {
                    detail: failure.error,
                    resumen,
                });
            }
        };

        let found = self
            .invoices
            .mark_processed(invoice_id, &data, Utc::now())
            .await?;
        if !found {
            return Err(ApiError::NotFound(format!("invoice {} not found", invoice_id)));
        }

        info!("Invoice {} processed", invoice_id);

        Ok(ProcessedInvoice {
            invoice_id: invoice_id.to_string(),
            data,
        })
    }

    /// Lists invoices visible to the caller, newest first.
    ///
    /// Admins see every record, enriched best-effort with the owner's e-mail
    /// and tax id; everyone else only sees their own records.
    #[instrument(skip(self, identity), fields(uid = %identity.uid))]
    pub async fn list(&self, identity: &Identity) -> Result<Vec<InvoiceListItem>, ApiError> {
        if !identity.is_admin() {
            let own = self
                .invoices
                .list_recent(Some(&identity.uid), LIST_LIMIT)
                .await?;
            return Ok(own.into_iter().map(InvoiceListItem::from).collect());
        }

        let invoices = self.invoices.list_recent(None, LIST_LIMIT).await?;
        let mut items = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let mut item = InvoiceListItem::from(invoice);
            self.enrich(&mut item).await;
            items.push(item);
        }
        Ok(items)
    }

    async fn enrich(&self, item: &mut InvoiceListItem) {
        let uid = item.invoice.supplier_uid.clone();

        match self.identity.get_user(&uid).await {
            Ok(user) => item.supplier_email = user.and_then(|u| u.email),
            Err(e) => warn!("Error resolving supplier {}: {}", uid, e),
        }
        match self.suppliers.get(&uid).await {
            Ok(profile) => item.supplier_ruc = profile.and_then(|p| p.tax_id),
            Err(e) => warn!("Error loading supplier profile {}: {}", uid, e),
        }
    }

    /// Sets an invoice's status. Admin only; any status may follow any other.
    #[instrument(skip(self, identity), fields(uid = %identity.uid))]
    pub async fn update_status(
        &self,
        identity: &Identity,
        invoice_id: &str,
        status: Option<&str>,
    ) -> Result<InvoiceStatus, ApiError> {
        identity.require_admin()?;

        let raw = status
            .ok_or_else(|| ApiError::Validation("missing 'status' field in body".to_string()))?;
        let status: InvoiceStatus = raw.parse().map_err(ApiError::Validation)?;

        let found = self
            .invoices
            .update_status(invoice_id, status, &identity.uid, Utc::now())
            .await?;
        if !found {
            return Err(ApiError::NotFound(format!("invoice {} not found", invoice_id)));
        }

        info!("Invoice {} status set to {}", invoice_id, status);
        Ok(status)
    }

    /// Dashboard aggregates over every record. Admin only.
    pub async fn stats(&self, identity: &Identity) -> Result<DashboardStats, ApiError> {
        identity.require_admin()?;
        let invoices = self.invoices.all().await?;
        Ok(compute_stats(&invoices))
    }
}

/// `inv_` followed by 12 random lowercase hex characters.
pub fn new_invoice_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("inv_{}", &hex[..12])
}

pub fn storage_path(owner_uid: &str, invoice_id: &str) -> String {
    format!("invoices/{}/{}.pdf", owner_uid, invoice_id)
}

/// Reduces an uploaded file name to a safe ASCII form.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            c
        } else {
            '_'
        };
        if !(c == '_' && cleaned.ends_with('_')) {
            cleaned.push(c);
        }
    }

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if cleaned.is_empty() {
        "factura.pdf".to_string()
    } else {
        cleaned
    }
}
