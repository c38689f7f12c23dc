use crate::{RetrievedChunk, SessionSnippet};

pub const SOURCE_DOCUMENTS_AND_INTERNET: &str = "documents and internet";
pub const SOURCE_INTERNET: &str = "internet";

pub const SYSTEM_PROMPT: &str = "You are a legal document assistant with expertise in Indian law, \
including the Indian Contract Act 1872, the Indian Evidence Act 1872, the Code of Civil Procedure 1908, \
the Constitution of India, the Consumer Protection Act 2019 and the Arbitration and Conciliation Act 1996. \
Give clear, professional analysis.";

const ANSWER_FORMAT_WITH_DOCUMENTS: &str = r#"Return JSON:
{
  "answer": "your comprehensive answer with proper formatting",
  "source": "documents and internet" or "documents only" or "internet only"
}"#;

const ANSWER_FORMAT_WITHOUT_DOCUMENTS: &str = r#"Return JSON:
{
  "answer": "your answer with proper formatting",
  "source": "internet"
}"#;

/// Joins retrieved chunks, each behind a separator naming its origin.
pub fn format_chunk_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(idx, retrieved)| {
            format!(
                "--- Document {}: {} (relevance {:.3}) ---\n{}",
                idx.saturating_add(1),
                retrieved.chunk.provenance(),
                retrieved.score,
                retrieved.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_session_context(snippets: &[SessionSnippet]) -> String {
    snippets
        .iter()
        .map(|snippet| {
            format!(
                "--- Document {} ---\n{}",
                snippet.position.saturating_add(1),
                snippet.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn create_user_message(context: Option<&str>, question: &str) -> String {
    match context {
        Some(context) => format!(
            r"Answer the user's question using both the provided document context and your general knowledge.

DOCUMENT CONTEXT:
{context}

USER QUESTION: {question}

INSTRUCTIONS:
- Use information from the documents when relevant
- Supplement with general knowledge when needed and say which is which
- Focus on the Indian legal context when applicable
- Use clear sections, bullet points and line breaks, with little markdown

{ANSWER_FORMAT_WITH_DOCUMENTS}"
        ),
        None => format!(
            r"Answer the user's question using your general knowledge.

USER QUESTION: {question}

INSTRUCTIONS:
- Be accurate, concise and clear
- Focus on the Indian legal context when applicable
- Use clear sections, bullet points and line breaks, with little markdown

{ANSWER_FORMAT_WITHOUT_DOCUMENTS}"
        ),
    }
}
