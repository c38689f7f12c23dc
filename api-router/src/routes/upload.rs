use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use common::storage::types::document::RawDocument;
use serde::Serialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    // Overall size is bounded by the route's body limit.
    #[form_data(limit = "unlimited")]
    #[form_data(default)]
    pub files: Vec<FieldData<Bytes>>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub total_chunks: usize,
    pub files_processed: Vec<String>,
    pub corpus_generation: u64,
}

/// Rebuilds the shared corpus from the uploaded PDFs.
pub async fn upload_pdfs(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_count = input.files.len();
    let total_bytes: usize = input.files.iter().map(|file| file.contents.len()).sum();
    info!(file_count, total_bytes, "Received PDF upload");

    let documents: Vec<RawDocument> = input
        .files
        .into_iter()
        .enumerate()
        .map(|(idx, file)| {
            let filename = file
                .metadata
                .file_name
                .unwrap_or_else(|| format!("upload-{}", idx.saturating_add(1)));
            RawDocument::new(filename, file.metadata.content_type, file.contents)
        })
        .collect();

    let summary = state.ingestion.ingest(documents).await?;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: format!(
                "Processed {} PDF file(s) into {} chunks",
                summary.files_processed.len(),
                summary.total_chunks
            ),
            total_chunks: summary.total_chunks,
            files_processed: summary.files_processed,
            corpus_generation: summary.generation,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use ingestion_pipeline::utils::pdf_ingestion::sample_pdf;
    use tower::ServiceExt;

    use crate::routes::test_support::{app, json_body, multipart_request, test_state, StubModel};

    #[tokio::test]
    async fn upload_builds_corpus() {
        let state = test_state(StubModel::replying("unused"));
        let lease = sample_pdf(&["Rent is payable monthly"]).expect("pdf");
        let deed = sample_pdf(&["Registered in Pune", "Stamp duty paid"]).expect("pdf");

        let response = app(&state)
            .oneshot(multipart_request(
                "/upload-pdfs/",
                &[
                    ("lease.pdf", "application/pdf", lease.as_slice()),
                    ("deed.pdf", "application/pdf", deed.as_slice()),
                ],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_chunks"], 3);
        assert_eq!(body["files_processed"][0], "lease.pdf");
        assert_eq!(body["files_processed"][1], "deed.pdf");
        assert_eq!(body["corpus_generation"], 1);

        let status = state.corpus.status().await;
        assert!(status.documents_loaded);
        assert_eq!(status.total_chunks, 3);
    }

    #[tokio::test]
    async fn too_many_files_is_bad_request() {
        let state = test_state(StubModel::replying("unused"));
        let pdf = sample_pdf(&["x"]).expect("pdf");
        let files: Vec<(&str, &str, &[u8])> = ["a.pdf", "b.pdf", "c.pdf", "d.pdf"]
            .into_iter()
            .map(|name| (name, "application/pdf", pdf.as_slice()))
            .collect();

        let response = app(&state)
            .oneshot(multipart_request("/upload-pdfs/", &files))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["error"]
            .as_str()
            .is_some_and(|msg| msg.contains("received 4")));
        assert!(state.corpus.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn non_pdf_is_bad_request() {
        let state = test_state(StubModel::replying("unused"));

        let response = app(&state)
            .oneshot(multipart_request(
                "/upload-pdfs/",
                &[("notes.txt", "text/plain", b"plain text".as_slice())],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreadable_pdf_is_unprocessable_and_keeps_corpus() {
        let state = test_state(StubModel::replying("unused"));
        let good = sample_pdf(&["Original corpus"]).expect("pdf");
        let response = app(&state)
            .oneshot(multipart_request(
                "/upload-pdfs/",
                &[("good.pdf", "application/pdf", good.as_slice())],
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&state)
            .oneshot(multipart_request(
                "/upload-pdfs/",
                &[("broken.pdf", "application/pdf", b"%PDF-1.4 truncated".as_slice())],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .is_some_and(|msg| msg.contains("broken.pdf")));
        assert_eq!(state.corpus.status().await.sources, ["good.pdf"]);
    }
}
