pub mod extractor;
pub mod gemini;
pub mod parser;
pub mod pdf;
pub mod types;

pub use extractor::{placeholder_data, InvoiceExtractor};
pub use gemini::{GeminiClient, GenerateResponse, GenerativeModel};
pub use parser::parse_response;
pub use pdf::{is_usable_text, PdfTextExtractor, TextExtractor, MIN_USABLE_TEXT_CHARS};
pub use types::{ExtractedInvoiceData, ExtractionFailure, ExtractionOutcome};
