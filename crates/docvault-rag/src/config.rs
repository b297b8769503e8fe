//! Configuration for the RAG core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Main RAG configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding service configuration
    pub embedding: EmbeddingConfig,
    /// Generation service configuration
    pub generation: GenerationConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Synthesis configuration
    pub synthesis: SynthesisConfig,
    /// Database configuration
    pub database: DatabaseConfig,
}

impl RagConfig {
    /// Validate cross-field constraints before wiring up the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding batch_size must be greater than zero"));
        }
        if self.embedding.dimensions == 0 {
            return Err(Error::config("embedding dimensions must be greater than zero"));
        }
        if self.retrieval.max_chunks == 0 {
            return Err(Error::config("retrieval max_chunks must be greater than zero"));
        }
        if self.synthesis.max_context_chars == 0 {
            return Err(Error::config("synthesis max_context_chars must be greater than zero"));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Service base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Vector dimensions produced by the model; must match the chunk store
    pub dimensions: usize,
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed embedding requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 5,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Service base URL
    pub base_url: String,
    /// Model used for the fast tier
    pub fast_model: String,
    /// Model used for the high-quality tier
    pub quality_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds; generation is the highest-variance call
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            fast_model: "llama3.2:3b".to_string(),
            quality_model: "llama3.1:70b".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve
    pub max_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { max_chunks: 5 }
    }
}

/// Synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Maximum characters of chunk content concatenated into the context block
    pub max_context_chars: usize,
    /// Maximum characters per citation excerpt
    pub excerpt_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 12_000,
            excerpt_chars: 200,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docvault-rag")
            .join("chunks.db");
        Self { path }
    }
}
