//! Grounded answer synthesis from retrieved chunks

use std::sync::Arc;

use crate::config::SynthesisConfig;
use crate::error::{Error, Result, Stage};
use crate::providers::GenerationProvider;
use crate::retrieval::RetrievedChunk;
use crate::types::{Citation, QualityTier, QueryResponse};

use super::prompt::PromptBuilder;

/// Assembles a bounded context, invokes generation, and packages the
/// answer with one citation per context chunk
pub struct GroundedSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    config: SynthesisConfig,
}

impl GroundedSynthesizer {
    pub fn new(generator: Arc<dyn GenerationProvider>, config: SynthesisConfig) -> Self {
        Self { generator, config }
    }

    /// Produce a grounded answer for ranked retrieval results
    ///
    /// Chunks are taken in descending relevance until the context budget is
    /// reached; the list is truncated, individual chunks never are. A
    /// generation failure is surfaced as a transient upstream error with no
    /// internal retry.
    pub async fn synthesize(
        &self,
        question: &str,
        results: &[RetrievedChunk],
        tier: QualityTier,
    ) -> Result<QueryResponse> {
        let included = self.fit_context(results);

        let context = PromptBuilder::build_context(included);
        let prompt = PromptBuilder::build_grounded_prompt(question, &context);

        let answer = self
            .generator
            .generate(&prompt, tier)
            .await
            .map_err(|e| match e {
                Error::Upstream { .. } => e,
                other => Error::upstream(Stage::Generation, other.to_string()),
            })?;

        let sources: Vec<Citation> = included
            .iter()
            .map(|r| Citation::from_retrieved(r, self.config.excerpt_chars))
            .collect();

        tracing::info!(
            model = self.generator.model_for(tier),
            chunks_considered = results.len(),
            chunks_used = included.len(),
            "synthesis finished"
        );

        Ok(QueryResponse {
            answer,
            chunks_considered: results.len(),
            chunks_used: included.len(),
            sources,
        })
    }

    /// Longest prefix of the ranked results whose contents fit the context
    /// budget; the top result is always included
    fn fit_context<'a>(&self, results: &'a [RetrievedChunk]) -> &'a [RetrievedChunk] {
        let mut used = 0usize;
        let mut count = 0usize;

        for result in results {
            let len = result.chunk.content.len();
            if count > 0 && used + len > self.config.max_context_chars {
                break;
            }
            used += len;
            count += 1;
        }

        &results[..count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uuid::Uuid;

    use crate::types::{Chunk, ChunkMetadata};

    /// Records prompts and returns a canned answer
    struct RecordingGenerator {
        prompts: Mutex<Vec<(String, QualityTier)>>,
        answer: String,
        fail: bool,
    }

    impl RecordingGenerator {
        fn answering(answer: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                answer: answer.to_string(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                answer: String::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for RecordingGenerator {
        async fn generate(&self, prompt: &str, tier: QualityTier) -> Result<String> {
            self.prompts.lock().push((prompt.to_string(), tier));
            if self.fail {
                return Err(Error::upstream(Stage::Generation, "model timed out"));
            }
            Ok(self.answer.clone())
        }

        fn model_for(&self, tier: QualityTier) -> &str {
            match tier {
                QualityTier::Fast => "fast",
                QualityTier::HighQuality => "quality",
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn retrieved(index: u32, content: &str, similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                chunk_index: index,
                content: content.to_string(),
                token_count: 10,
                embedding: Vec::new(),
                metadata: ChunkMetadata {
                    page_number: Some(1),
                    char_start: 0,
                    char_end: content.len(),
                },
                created_at: chrono::Utc::now(),
            },
            similarity,
        }
    }

    fn config(max_context_chars: usize) -> SynthesisConfig {
        SynthesisConfig {
            max_context_chars,
            excerpt_chars: 50,
        }
    }

    #[tokio::test]
    async fn cites_every_context_chunk() {
        let generator = Arc::new(RecordingGenerator::answering("The total is 1200 EUR [1]."));
        let synthesizer = GroundedSynthesizer::new(generator.clone(), config(10_000));

        let results = vec![
            retrieved(0, "total amount due: 1200 EUR", 0.93),
            retrieved(4, "shipping takes two weeks", 0.41),
        ];
        let response = synthesizer
            .synthesize("What is the total?", &results, QualityTier::Fast)
            .await
            .unwrap();

        assert_eq!(response.answer, "The total is 1200 EUR [1].");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.chunks_used, 2);
        assert_eq!(response.sources[0].chunk_index, 0);
        assert!((response.sources[0].score - 0.93).abs() < 1e-6);
        assert!(response.sources[0].excerpt.contains("1200 EUR"));

        // The prompt carried the grounding rules and both chunks.
        let prompts = generator.prompts.lock();
        let (prompt, tier) = &prompts[0];
        assert_eq!(*tier, QualityTier::Fast);
        assert!(prompt.contains("total amount due"));
        assert!(prompt.contains("shipping takes two weeks"));
        assert!(prompt.contains("ONLY the document content"));
    }

    #[tokio::test]
    async fn context_budget_truncates_the_list_not_the_chunks() {
        let generator = Arc::new(RecordingGenerator::answering("ok"));
        // Budget fits the first chunk only.
        let synthesizer = GroundedSynthesizer::new(generator.clone(), config(30));

        let results = vec![
            retrieved(0, &"a".repeat(25), 0.9),
            retrieved(1, &"b".repeat(25), 0.8),
            retrieved(2, &"c".repeat(25), 0.7),
        ];
        let response = synthesizer
            .synthesize("q", &results, QualityTier::Fast)
            .await
            .unwrap();

        assert_eq!(response.chunks_used, 1);
        assert_eq!(response.chunks_considered, 3);
        assert_eq!(response.sources.len(), 1);

        let prompts = generator.prompts.lock();
        // The included chunk is intact, the others absent.
        assert!(prompts[0].0.contains(&"a".repeat(25)));
        assert!(!prompts[0].0.contains(&"b".repeat(25)));
    }

    #[tokio::test]
    async fn oversized_top_chunk_is_still_included() {
        let generator = Arc::new(RecordingGenerator::answering("ok"));
        let synthesizer = GroundedSynthesizer::new(generator, config(10));

        let results = vec![retrieved(0, &"x".repeat(100), 0.9)];
        let response = synthesizer
            .synthesize("q", &results, QualityTier::Fast)
            .await
            .unwrap();

        assert_eq!(response.chunks_used, 1);
    }

    #[tokio::test]
    async fn generation_failure_surfaces_without_retry() {
        let generator = Arc::new(RecordingGenerator::failing());
        let synthesizer = GroundedSynthesizer::new(generator.clone(), config(10_000));

        let results = vec![retrieved(0, "content", 0.9)];
        let err = synthesizer
            .synthesize("q", &results, QualityTier::HighQuality)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("generation"), "got: {err}");
        assert_eq!(generator.prompts.lock().len(), 1);
    }
}
