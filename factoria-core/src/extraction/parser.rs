//! Prompt construction and defensive parsing of the model's answer.
//!
//! The model is asked for a single JSON object but does not always comply:
//! it may wrap the object in Markdown fences, add prose around it, or return
//! the text split across several parts. Every failure here ends up as an
//! [`ExtractionFailure`] rather than an error.

use serde_json::Value;

use super::gemini::GenerateResponse;
use super::types::{ExtractedInvoiceData, ExtractionFailure, ExtractionOutcome};

/// Hard cap on the document text sent to the model.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Truncates `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Builds the fixed extraction instruction for a document.
pub fn build_prompt(document_text: &str) -> String {
    let text = truncate_chars(document_text, MAX_PROMPT_CHARS);
    format!(
        r#"
Analiza el siguiente documento y extrae información relevante.

Si es una factura peruana, extrae:
- Monto total (número con decimales)
- Moneda (PEN, USD, etc.)
- RUC del emisor (11 dígitos)
- Razón social del emisor
- Fecha de emisión (YYYY-MM-DD)
- Fecha de vencimiento (YYYY-MM-DD)
- Número de factura
- Concepto/descripción

Si NO es una factura, resume el contenido principal del documento.

Texto del documento:
{text}

Devuelve SOLO un objeto JSON válido con esta estructura (sin comentarios), usando null literal para los campos desconocidos:
{{
    "es_factura": true o false,
    "resumen": "breve resumen si no es factura",
    "monto_total": "valor o null",
    "moneda": "PEN/USD o null",
    "ruc_emisor": "número o null",
    "razon_social_emisor": "nombre o null",
    "fecha_emision": "YYYY-MM-DD o null",
    "fecha_vencimiento": "YYYY-MM-DD o null",
    "numero_factura": "número o null",
    "concepto": "descripción",
    "confidence": número del 0 al 100
}}
"#
    )
}

/// Returns the generated text, falling back to the parts of the first
/// candidate when the direct `text` field is absent or empty.
pub fn response_text(response: &GenerateResponse) -> Option<String> {
    if let Some(text) = response.text.as_deref() {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }

    let joined: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Strips Markdown code fences: a ```` ```json ```` block first, then any
/// unlabeled ```` ``` ```` block. Text without fences is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest
    } else if let Some((_, rest)) = text.split_once("```") {
        rest
    } else {
        return text;
    };

    match inner.split_once("```") {
        Some((body, _)) => body.trim(),
        None => inner.trim(),
    }
}

/// Parses the cleaned answer as JSON, retrying on the outermost `{...}` span.
pub fn parse_json_object(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(strict_err) => match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if end > start => {
                serde_json::from_str::<Value>(&text[start..=end])
            }
            _ => Err(strict_err),
        },
    }
}

fn parse_inner(response: &GenerateResponse) -> Result<ExtractedInvoiceData, String> {
    let raw = response_text(response).ok_or_else(|| "model returned no text".to_string())?;
    let preview = truncate_chars(raw.trim(), 200);
    tracing::debug!("Model answer: {}...", preview);

    let cleaned = strip_code_fences(&raw);
    let value = parse_json_object(cleaned).map_err(|e| format!("invalid JSON from model: {}", e))?;

    if !value.is_object() {
        return Err("model answer is not a JSON object".to_string());
    }

    serde_json::from_value::<ExtractedInvoiceData>(value)
        .map_err(|e| format!("unexpected JSON shape from model: {}", e))
}

/// Turns a model response into a typed outcome. Never fails.
pub fn parse_response(response: &GenerateResponse) -> ExtractionOutcome {
    match parse_inner(response) {
        Ok(data) => ExtractionOutcome::Extracted(data),
        Err(detail) => ExtractionOutcome::Failed(ExtractionFailure::new(detail)),
    }
}
