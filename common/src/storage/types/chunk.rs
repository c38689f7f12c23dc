use serde::Serialize;

/// A bounded span of a source document's text with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub source_filename: String,
    /// Position of the chunk within its source document, counted across pages.
    pub sequence_index: usize,
    pub page_number: Option<u32>,
    /// Char offset of the first character inside the page text.
    pub start_offset: usize,
}

impl Chunk {
    /// Short provenance label used in prompts and logs, e.g. `lease.pdf, page 3`.
    pub fn provenance(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, page {page}", self.source_filename),
            None => self.source_filename.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}
