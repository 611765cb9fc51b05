//! Batched embedding with per-batch retry and backoff.
//!
//! Chunks are embedded in fixed-size batches, in order. A failing batch is
//! retried up to `max_retries` times, sleeping `base · 2^(n-1)` before
//! retry `n` (1 s, 2 s, 4 s with the defaults). A batch that still fails is
//! logged and dropped: its chunks are absent from the outcome and the run
//! continues with the next batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use voxrag_core::models::{Chunk, EmbeddingRecord};
use voxrag_core::{RagError, RagResult};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

/// Result of embedding a run's chunks.
#[derive(Debug, Default)]
pub struct EmbeddingOutcome {
    /// One record per successfully embedded chunk, in chunk order.
    pub records: Vec<EmbeddingRecord>,
    /// Number of chunks submitted.
    pub requested: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

impl EmbeddingOutcome {
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    /// True when chunks were submitted but none came back.
    pub fn all_failed(&self) -> bool {
        self.requested > 0 && self.records.is_empty()
    }
}

pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_retries: u32,
    backoff_base: Duration,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
        }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Delay before retry `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exp)
    }

    /// Embed `chunks` batch by batch. Never fails; see [`EmbeddingOutcome`].
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome {
            requested: chunks.len(),
            ..EmbeddingOutcome::default()
        };

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            outcome.batches += 1;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            match self.embed_with_retry(&texts).await {
                Ok(vectors) => {
                    outcome.records.extend(
                        batch
                            .iter()
                            .zip(vectors)
                            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector)),
                    );
                }
                Err(e) => {
                    outcome.failed_batches += 1;
                    warn!(
                        batch = batch_index,
                        chunks = batch.len(),
                        error = %e,
                        "Dropping embedding batch"
                    );
                }
            }
        }

        debug!(
            requested = outcome.requested,
            succeeded = outcome.succeeded(),
            failed_batches = outcome.failed_batches,
            "Embedding run finished"
        );
        outcome
    }

    /// Embed one query text. Single attempt; the caller decides how to degrade.
    pub async fn embed_query(&self, text: &str) -> RagResult<Vec<f32>> {
        self.provider.embed_one(text).await
    }

    async fn embed_with_retry(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            let err = match self.provider.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
                Ok(vectors) => RagError::EmbeddingProvider(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                )),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            let delay = self.backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying batch");
            tokio::time::sleep(delay).await;
        }
    }
}
