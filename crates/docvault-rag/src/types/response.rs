//! Query response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::retrieval::RetrievedChunk;

/// Citation pointing at a chunk that was part of the answer's context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Document the chunk belongs to
    pub document_id: Uuid,
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Source page, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Similarity score against the question (0.0-1.0, higher is better)
    pub score: f32,
    /// Short excerpt of the chunk content
    pub excerpt: String,
}

impl Citation {
    /// Build a citation from a retrieved chunk
    pub fn from_retrieved(result: &RetrievedChunk, excerpt_chars: usize) -> Self {
        Self {
            document_id: result.chunk.document_id,
            chunk_id: result.chunk.id,
            chunk_index: result.chunk.chunk_index,
            page_number: result.chunk.metadata.page_number,
            score: result.similarity,
            excerpt: excerpt(&result.chunk.content, excerpt_chars),
        }
    }
}

/// Truncate text to `max_len` at a word boundary, appending an ellipsis
pub(crate) fn excerpt(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }

    if let Some(pos) = text[..end].rfind(' ') {
        return format!("{}...", &text[..pos]);
    }

    format!("{}...", &text[..end])
}

/// Answer plus source attributions for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer
    pub answer: String,
    /// One citation per chunk included in the context, relevance descending
    pub sources: Vec<Citation>,
    /// Chunks returned by retrieval
    pub chunks_considered: usize,
    /// Chunks that fit the context window and were cited
    pub chunks_used: usize,
}

impl QueryResponse {
    /// Response for a tenant/document scope with no indexed chunks at all
    ///
    /// Distinct from the model saying the context is insufficient: here there
    /// was nothing to search, and the caller should index a document first.
    pub fn no_indexed_content() -> Self {
        Self {
            answer: "No indexed documents are available to answer this question. \
                     Index a document first."
                .to_string(),
            sources: Vec::new(),
            chunks_considered: 0,
            chunks_used: 0,
        }
    }
}
