use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use lopdf::Document;
use tracing::{debug, warn};

use common::{
    error::AppError,
    storage::types::document::{PageText, RawDocument},
};

/// Extracts text page by page from the document's text layer.
///
/// `lopdf` is tried first so that page numbers survive; if it yields no text at
/// all, `pdf-extract` is run over the whole file and the result carries no page
/// number. A PDF without any text layer produces pages with empty text rather
/// than an error.
pub async fn extract_pdf_pages(document: &RawDocument) -> Result<Vec<PageText>, AppError> {
    let filename = document.filename.clone();
    let bytes = document.bytes.clone();

    tokio::task::spawn_blocking(move || extract_pages_blocking(&filename, &bytes)).await?
}

fn extract_pages_blocking(filename: &str, bytes: &Bytes) -> Result<Vec<PageText>, AppError> {
    let pdf = Document::load_mem(bytes)
        .map_err(|err| AppError::chunking(filename, format!("Failed to parse PDF: {err}")))?;

    let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(AppError::chunking(filename, "PDF appears to have no pages"));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_number in page_numbers {
        let text = match pdf.extract_text(&[page_number]) {
            Ok(text) => normalize_page_text(&text),
            Err(err) => {
                warn!(%filename, page_number, error = %err, "page text extraction failed");
                String::new()
            }
        };
        pages.push(PageText {
            page_number: Some(page_number),
            text,
        });
    }

    if pages.iter().any(|page| !page.text.trim().is_empty()) {
        debug!(%filename, pages = pages.len(), "extracted text with page structure");
        return Ok(pages);
    }

    debug!(%filename, "no text via page extraction; trying whole-document fallback");
    // pdf-extract panics on some malformed font tables.
    let fallback = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| AppError::chunking(filename, "Failed to extract text from PDF"))?
    .map_err(|err| {
        AppError::chunking(filename, format!("Failed to extract text from PDF: {err}"))
    })?;
    let text = normalize_page_text(&fallback);
    if text.trim().is_empty() {
        warn!(%filename, "PDF has no extractable text layer");
        return Ok(pages);
    }

    Ok(vec![PageText {
        page_number: None,
        text,
    }])
}

/// Unifies line endings, drops NUL bytes and trailing spaces, and collapses
/// runs of blank lines to a single paragraph break.
fn normalize_page_text(text: &str) -> String {
    let cleaned = text.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "");

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = false;
    for line in cleaned.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !blank_run && !lines.is_empty() {
                lines.push("");
            }
            blank_run = true;
            continue;
        }
        blank_run = false;
        lines.push(line);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// Builds a small PDF with one line of Courier text per page.
#[cfg(any(test, feature = "test-utils"))]
pub fn sample_pdf(page_texts: &[&str]) -> Result<Vec<u8>, lopdf::Error> {
    use lopdf::{
        content::{Content, Operation},
        dictionary, Object, Stream,
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(page_texts.len());
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
