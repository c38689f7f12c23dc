use common::{error::AppError, storage::types::chunk::Chunk};
use text_splitter::{Characters, ChunkConfig, TextSplitter};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One unit of text handed to the chunker, typically a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Position of the originating file in the upload batch.
    pub document_index: usize,
    pub filename: String,
    pub page_number: Option<u32>,
    pub text: String,
}

/// Splits text into overlapping chunks, preferring paragraph, then line, then
/// sentence, then word boundaries before falling back to characters.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, AppError> {
        if config.chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk size must be greater than zero".into(),
            ));
        }
        if config.overlap >= config.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.overlap, config.chunk_size
            )));
        }

        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.overlap)
            .map_err(|err| AppError::Validation(format!("invalid chunk configuration: {err}")))?
            .with_trim(false);

        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
        })
    }

    /// Chunks every source in order. `sequence_index` restarts at zero for each
    /// uploaded file and keeps counting across that file's pages. Files are told
    /// apart by `document_index`, so two uploads sharing a name are numbered
    /// separately.
    pub fn split(&self, sources: &[SourceText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current_document: Option<usize> = None;
        let mut sequence_index = 0;

        for source in sources {
            if current_document != Some(source.document_index) {
                current_document = Some(source.document_index);
                sequence_index = 0;
            }

            let before = chunks.len();
            for (start_offset, text) in self.split_text(&source.text) {
                chunks.push(Chunk {
                    text: text.to_string(),
                    source_filename: source.filename.clone(),
                    sequence_index,
                    page_number: source.page_number,
                    start_offset,
                });
                sequence_index = sequence_index.saturating_add(1);
            }

            debug!(
                filename = %source.filename,
                page = ?source.page_number,
                chunks = chunks.len().saturating_sub(before),
                "chunked source text"
            );
        }

        chunks
    }

    /// Yields `(char_offset, chunk)` pairs for a single text. Whitespace-only
    /// pieces are dropped.
    fn split_text<'text>(&self, text: &'text str) -> Vec<(usize, &'text str)> {
        let mut pieces = Vec::new();
        let mut byte_cursor = 0;
        let mut char_cursor = 0;

        for (byte_offset, chunk) in self.splitter.chunk_indices(text) {
            // Offsets are non-decreasing, so the char count can be advanced incrementally.
            let skipped = text.get(byte_cursor..byte_offset).unwrap_or_default();
            char_cursor += skipped.chars().count();
            byte_cursor = byte_offset;

            if chunk.trim().is_empty() {
                continue;
            }
            pieces.push((char_cursor, chunk));
        }

        pieces
    }
}
