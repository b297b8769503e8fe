//! Prompt templates for grounded answer generation

use crate::retrieval::RetrievedChunk;

/// Prompt builder for grounded queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block from ranked chunks
    pub fn build_context(results: &[RetrievedChunk]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            let source_ref = Self::format_source_ref(result, i + 1);
            context.push_str(&format!(
                "[{}] {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                source_ref,
                result.chunk.content
            ));
        }

        context
    }

    /// Format a source reference line for one chunk
    fn format_source_ref(result: &RetrievedChunk, _index: usize) -> String {
        let mut parts = vec![format!(
            "Document {}, chunk {}",
            result.chunk.document_id, result.chunk.chunk_index
        )];

        if let Some(page) = result.chunk.metadata.page_number {
            parts.push(format!("Page {page}"));
        }

        parts.join(", ")
    }

    /// Build the full grounded prompt
    ///
    /// The instructions pin the model to the supplied context: no outside
    /// knowledge, and an explicit insufficient-information response when
    /// the context does not contain the answer.
    pub fn build_grounded_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a document-grounded assistant that ONLY uses information from provided documents.

GROUNDING RULES - FOLLOW THESE EXACTLY:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context, respond with "The provided documents do not contain enough information to answer this question."
3. NEVER use external knowledge, general knowledge, or training data
4. NEVER make inferences or educated guesses beyond what is explicitly stated
5. Reference the numbered sources that support each claim, like [1] or [2]

CONTEXT FROM DOCUMENTS:
{context}

QUESTION: {question}

Provide a grounded answer using ONLY the document content above:"#,
            context = context,
            question = question
        )
    }
}
