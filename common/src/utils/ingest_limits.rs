use std::path::Path;

use super::config::AppConfig;
use crate::{error::AppError, storage::types::document::RawDocument};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Inclusive bounds on the number of documents accepted per ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestBounds {
    pub min_files: usize,
    pub max_files: usize,
}

impl IngestBounds {
    pub fn new(min_files: usize, max_files: usize) -> Result<Self, AppError> {
        if min_files == 0 || min_files > max_files {
            return Err(AppError::Validation(format!(
                "invalid ingest bounds {min_files}..={max_files}; ensure 0 < min <= max"
            )));
        }
        Ok(Self {
            min_files,
            max_files,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(config.ingest_min_files, config.ingest_max_files)
    }

    fn describe(self) -> String {
        if self.min_files == self.max_files {
            format!("{}", self.max_files)
        } else {
            format!("{}-{}", self.min_files, self.max_files)
        }
    }
}

impl Default for IngestBounds {
    fn default() -> Self {
        Self {
            min_files: 1,
            max_files: 3,
        }
    }
}

/// Checks an upload batch before any extraction work: file count first, then
/// every file must look like a PDF by name, declared type and leading bytes.
pub fn validate_upload(files: &[RawDocument], bounds: IngestBounds) -> Result<(), AppError> {
    if files.len() < bounds.min_files || files.len() > bounds.max_files {
        return Err(AppError::Validation(format!(
            "Please upload {} PDF files (received {})",
            bounds.describe(),
            files.len()
        )));
    }

    for file in files {
        validate_pdf(file)?;
    }

    Ok(())
}

/// Session documents arrive as plain text, so only the count is bounded.
pub fn validate_session_documents(count: usize, bounds: IngestBounds) -> Result<(), AppError> {
    if count > bounds.max_files {
        return Err(AppError::Validation(format!(
            "Too many documents. Maximum allowed is {}",
            bounds.max_files
        )));
    }
    Ok(())
}

fn validate_pdf(file: &RawDocument) -> Result<(), AppError> {
    let guessed = mime_guess::from_path(Path::new(&file.filename)).first();
    if guessed.as_ref() != Some(&mime::APPLICATION_PDF) {
        return Err(AppError::Validation(format!(
            "{} is not a PDF file",
            file.filename
        )));
    }

    if let Some(declared) = file.content_type.as_deref() {
        let essence = declared.parse::<mime::Mime>().map_or_else(
            |_| declared.to_ascii_lowercase(),
            |parsed| parsed.essence_str().to_owned(),
        );
        if essence != mime::APPLICATION_PDF.essence_str()
            && essence != mime::APPLICATION_OCTET_STREAM.essence_str()
        {
            return Err(AppError::Validation(format!(
                "{} was sent as {declared}, expected application/pdf",
                file.filename
            )));
        }
    }

    if !file.bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation(format!(
            "{} does not contain PDF data",
            file.filename
        )));
    }

    Ok(())
}
