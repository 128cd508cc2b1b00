use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Structured fields the model extracts from a document.
///
/// Wire names are the keys requested in the extraction prompt. Decoding is
/// lenient: the model may answer amounts or tax ids as numbers, confidence as
/// a string, or omit keys entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoiceData {
    #[serde(rename = "es_factura", default, deserialize_with = "lenient_bool")]
    pub is_invoice: bool,

    #[serde(rename = "resumen", default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,

    #[serde(rename = "monto_total", default, deserialize_with = "lenient_string")]
    pub total_amount: Option<String>,

    #[serde(rename = "moneda", default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,

    #[serde(rename = "ruc_emisor", default, deserialize_with = "lenient_string")]
    pub issuer_tax_id: Option<String>,

    #[serde(rename = "razon_social_emisor", default, deserialize_with = "lenient_string")]
    pub issuer_name: Option<String>,

    #[serde(rename = "fecha_emision", default, deserialize_with = "lenient_string")]
    pub issue_date: Option<String>,

    #[serde(rename = "fecha_vencimiento", default, deserialize_with = "lenient_string")]
    pub due_date: Option<String>,

    #[serde(rename = "numero_factura", default, deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,

    #[serde(rename = "concepto", default, deserialize_with = "lenient_string")]
    pub concept: Option<String>,

    /// 0-100
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<i32>,

    /// Only set on the placeholder record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Typed failure record produced when the extraction pipeline breaks.
///
/// Serializes with `es_factura=false`, `confidence=0` and the failure detail
/// in `error`, so callers see the same shape as a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub error: String,
}

impl ExtractionFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    pub fn resumen(&self) -> String {
        format!("Error al procesar: {}", self.error)
    }
}

#[derive(Serialize)]
struct FailureRecord<'a> {
    error: &'a str,
    es_factura: bool,
    resumen: String,
    monto_total: Option<String>,
    moneda: Option<String>,
    ruc_emisor: Option<String>,
    razon_social_emisor: Option<String>,
    fecha_emision: Option<String>,
    fecha_vencimiento: Option<String>,
    numero_factura: Option<String>,
    concepto: &'static str,
    confidence: i32,
}

impl Serialize for ExtractionFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FailureRecord {
            error: &self.error,
            es_factura: false,
            resumen: self.resumen(),
            monto_total: None,
            moneda: None,
            ruc_emisor: None,
            razon_social_emisor: None,
            fecha_emision: None,
            fecha_vencimiento: None,
            numero_factura: None,
            concepto: "Error en procesamiento",
            confidence: 0,
        }
        .serialize(serializer)
    }
}

/// Result of running the AI extraction pipeline over a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractionOutcome {
    Extracted(ExtractedInvoiceData),
    Failed(ExtractionFailure),
}

impl ExtractionOutcome {
    pub fn is_invoice(&self) -> bool {
        match self {
            ExtractionOutcome::Extracted(data) => data.is_invoice,
            ExtractionOutcome::Failed(_) => false,
        }
    }

    pub fn confidence(&self) -> i32 {
        match self {
            ExtractionOutcome::Extracted(data) => data.confidence.unwrap_or(0),
            ExtractionOutcome::Failed(_) => 0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Extracted(_) => None,
            ExtractionOutcome::Failed(failure) => Some(&failure.error),
        }
    }
}

/// Accepts strings, numbers and booleans as text; blank or `"null"` become `None`.
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "si" | "sí"),
        _ => false,
    })
}

fn lenient_confidence<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as i32))
}
