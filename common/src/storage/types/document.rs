use bytes::Bytes;

/// An uploaded file as received at the ingestion boundary.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }
}

/// Text extracted from a single page. `page_number` is 1-based and absent when
/// the source layer carries no page structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: Option<u32>,
    pub text: String,
}
