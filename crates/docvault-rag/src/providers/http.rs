//! HTTP clients for the embedding and generation services
//!
//! Both speak an Ollama-compatible API. Embedding requests are retried with
//! exponential backoff; generation requests are not retried here, so the
//! caller's own retry policy governs that path.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::error::{Error, Result, Stage};
use crate::types::QualityTier;

use super::embedding::EmbeddingProvider;
use super::generation::GenerationProvider;

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// HTTP embedding client
pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self { client, config })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.base_url);
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(Error::upstream(
                Stage::Embedding,
                format!("embedding service returned HTTP {}", response.status()),
            ));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            Error::upstream(Stage::Embedding, format!("malformed embedding response: {e}"))
        })?;

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.request_embeddings(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.config.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::upstream(Stage::Embedding, "embedding request failed")))
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "http-embedder"
    }
}

/// HTTP generation client
pub struct HttpGenerator {
    client: Client,
    config: GenerationConfig,
}

impl HttpGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerator {
    async fn generate(&self, prompt: &str, tier: QualityTier) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let model = self.model_for(tier).to_string();

        tracing::info!("Generating answer with model: {}", model);

        let request = GenerateRequest {
            model,
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Stage::Generation,
                format!("generation service returned HTTP {status}: {body}"),
            ));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            Error::upstream(Stage::Generation, format!("malformed generation response: {e}"))
        })?;

        Ok(parsed.response)
    }

    fn model_for(&self, tier: QualityTier) -> &str {
        match tier {
            QualityTier::Fast => &self.config.fast_model,
            QualityTier::HighQuality => &self.config.quality_model,
        }
    }

    fn name(&self) -> &str {
        "http-generator"
    }
}
