use std::sync::Arc;
use tracing::{error, info, warn};

use super::gemini::GenerativeModel;
use super::parser::{build_prompt, parse_response};
use super::types::{ExtractedInvoiceData, ExtractionFailure, ExtractionOutcome};

/// Runs the AI extraction pipeline over document text.
///
/// Without a configured model every call returns [`placeholder_data`], so
/// the rest of the pipeline stays usable without live AI access.
#[derive(Clone)]
pub struct InvoiceExtractor {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl InvoiceExtractor {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    pub async fn extract(&self, document_text: &str) -> ExtractionOutcome {
        let Some(model) = &self.model else {
            warn!("AI extraction disabled, returning placeholder data");
            return ExtractionOutcome::Extracted(placeholder_data());
        };

        let prompt = build_prompt(document_text);
        let outcome = match model.generate_content(&prompt).await {
            Ok(response) => parse_response(&response),
            Err(e) => ExtractionOutcome::Failed(ExtractionFailure::new(e.to_string())),
        };

        match &outcome {
            ExtractionOutcome::Extracted(data) => info!(
                "Extracted document data (es_factura: {}, confidence: {:?})",
                data.is_invoice, data.confidence
            ),
            ExtractionOutcome::Failed(failure) => {
                error!("AI extraction failed: {}", failure.error)
            }
        }
        outcome
    }
}

/// Canned record returned when no model is configured.
pub fn placeholder_data() -> ExtractedInvoiceData {
    ExtractedInvoiceData {
        is_invoice: true,
        summary: None,
        total_amount: Some("1500.00".to_string()),
        currency: Some("PEN".to_string()),
        issuer_tax_id: Some("20123456789".to_string()),
        issuer_name: Some("EMPRESA EJEMPLO SAC".to_string()),
        issue_date: Some("2025-11-01".to_string()),
        due_date: Some("2025-12-01".to_string()),
        invoice_number: Some("F001-00000123".to_string()),
        concept: Some("Servicios profesionales".to_string()),
        confidence: Some(85),
        note: Some("Datos de ejemplo - IA deshabilitada".to_string()),
    }
}
