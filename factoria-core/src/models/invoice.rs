use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Invoice status enumeration.
///
/// `Recibida` is the only entry state. Any value may follow any other; the
/// status is set directly by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum InvoiceStatus {
    #[sqlx(rename = "Recibida")]
    #[serde(rename = "Recibida")]
    Received,
    #[sqlx(rename = "Por Pagar")]
    #[serde(rename = "Por Pagar")]
    PendingPayment,
    #[sqlx(rename = "Pagada")]
    #[serde(rename = "Pagada")]
    Paid,
    #[sqlx(rename = "Vencida")]
    #[serde(rename = "Vencida")]
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Received,
        InvoiceStatus::PendingPayment,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Received => "Recibida",
            InvoiceStatus::PendingPayment => "Por Pagar",
            InvoiceStatus::Paid => "Pagada",
            InvoiceStatus::Overdue => "Vencida",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = InvoiceStatus::ALL.iter().map(|s| s.as_str()).collect();
                format!("invalid status '{}', must be one of: {}", s, valid.join(", "))
            })
    }
}

/// Invoice record as stored in the `invoices` table.
///
/// Metadata fields serialize in camelCase; the AI-extracted fields keep the
/// wire names the extraction prompt asks the model for. All AI fields stay
/// `None` until the record is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Generated id, `inv_<12 hex chars>`
    #[serde(rename = "invoiceId")]
    pub id: String,

    /// Subject id of the uploading supplier
    pub supplier_uid: String,

    /// Blob store path of the PDF
    pub storage_path: String,

    pub original_filename: String,

    pub status: InvoiceStatus,

    #[serde(rename = "es_factura")]
    pub is_invoice: Option<bool>,

    #[serde(rename = "resumen")]
    pub summary: Option<String>,

    #[serde(rename = "monto_total")]
    pub total_amount: Option<String>,

    #[serde(rename = "moneda")]
    pub currency: Option<String>,

    #[serde(rename = "ruc_emisor")]
    pub issuer_tax_id: Option<String>,

    #[serde(rename = "razon_social_emisor")]
    pub issuer_name: Option<String>,

    #[serde(rename = "fecha_emision")]
    pub issue_date: Option<String>,

    #[serde(rename = "fecha_vencimiento")]
    pub due_date: Option<String>,

    #[serde(rename = "numero_factura")]
    pub invoice_number: Option<String>,

    #[serde(rename = "concepto")]
    pub concept: Option<String>,

    /// 0-100
    pub confidence: Option<i32>,

    /// Flips to true once, on a successful extraction
    pub processed: bool,

    pub created_at: DateTime<Utc>,

    pub processed_at: Option<DateTime<Utc>>,

    pub last_updated_at: Option<DateTime<Utc>>,

    pub last_updated_by: Option<String>,
}

impl Invoice {
    /// Builds a freshly uploaded record: status `Recibida`, nothing extracted.
    pub fn received(
        id: String,
        supplier_uid: String,
        storage_path: String,
        original_filename: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Invoice {
            id,
            supplier_uid,
            storage_path,
            original_filename,
            status: InvoiceStatus::Received,
            is_invoice: None,
            summary: None,
            total_amount: None,
            currency: None,
            issuer_tax_id: None,
            issuer_name: None,
            issue_date: None,
            due_date: None,
            invoice_number: None,
            concept: None,
            confidence: None,
            processed: false,
            created_at,
            processed_at: None,
            last_updated_at: None,
            last_updated_by: None,
        }
    }
}

/// Invoice as returned by the listing endpoint.
///
/// Admin listings carry the owner's e-mail and tax id when they could be
/// resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListItem {
    #[serde(flatten)]
    pub invoice: Invoice,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_ruc: Option<String>,
}

impl From<Invoice> for InvoiceListItem {
    fn from(invoice: Invoice) -> Self {
        InvoiceListItem {
            invoice,
            supplier_email: None,
            supplier_ruc: None,
        }
    }
}

/// Status change request body.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatus {
    pub status: Option<String>,
}
