use lopdf::Document;
use tracing::warn;

/// Minimum amount of trimmed text for a document to be worth sending to the
/// model.
pub const MIN_USABLE_TEXT_CHARS: usize = 50;

/// Turns stored document bytes into plain text.
///
/// Implementations degrade to an empty string instead of failing.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> String;
}

/// Whether extracted text is long enough to process.
pub fn is_usable_text(text: &str) -> bool {
    text.trim().chars().count() >= MIN_USABLE_TEXT_CHARS
}

/// Extracts the text layer of a PDF, page by page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    fn try_extract(bytes: &[u8]) -> Result<String, lopdf::Error> {
        let doc = Document::load_mem(bytes)?;
        let mut text = String::new();

        for page_num in doc.get_pages().keys() {
            text.push_str(&doc.extract_text(&[*page_num])?);
            text.push('\n');
        }
        Ok(text)
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> String {
        match Self::try_extract(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("Error extracting text from PDF: {}", e);
                String::new()
            }
        }
    }
}
