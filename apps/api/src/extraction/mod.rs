/// Document-to-text extraction for uploaded contracts.
///
/// Extraction is synchronous and CPU-bound; callers on the async runtime run it
/// through `spawn_blocking`.
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF could not be read: {0}")]
    Pdf(String),

    #[error("Text document is not valid UTF-8")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),

    #[error("Document contains no extractable text")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

impl DocumentKind {
    /// Detects the kind from the declared content type, then the file
    /// extension, then the leading magic bytes.
    pub fn detect(
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Option<Self> {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| file_name.and_then(Self::from_file_name))
            .or_else(|| Self::from_magic(bytes))
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(DocumentKind::Pdf),
            DOCX_MIME => Some(DocumentKind::Docx),
            e if e.starts_with("text/") => Some(DocumentKind::Text),
            _ => None,
        }
    }

    fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" | "text" | "md" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(DocumentKind::Pdf)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(DocumentKind::Docx)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub kind: DocumentKind,
    pub text: String,
    /// Only known for PDFs whose page objects are not compressed.
    pub page_count: Option<usize>,
}

// Page objects, but not the `/Pages` tree node.
static PDF_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/Type\s*/Page\b").expect("page pattern is a valid regex"));

pub fn extract(bytes: &[u8], kind: DocumentKind) -> Result<ExtractedDocument, ExtractionError> {
    let (text, page_count) = match kind {
        DocumentKind::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
            let pages = PDF_PAGE.find_iter(bytes).count();
            (text, (pages > 0).then_some(pages))
        }
        DocumentKind::Docx => {
            return Err(ExtractionError::UnsupportedFormat(
                "DOCX uploads are not supported yet; upload a PDF or plain text".to_string(),
            ))
        }
        DocumentKind::Text => (String::from_utf8(bytes.to_vec())?, None),
    };

    let text = normalize(&text);
    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }

    debug!(
        kind = ?kind,
        chars = text.chars().count(),
        page_count = ?page_count,
        "Extracted document text"
    );
    Ok(ExtractedDocument {
        kind,
        text,
        page_count,
    })
}

/// Drops a leading BOM and normalizes line endings so clause offsets are
/// stable across platforms.
fn normalize(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}
