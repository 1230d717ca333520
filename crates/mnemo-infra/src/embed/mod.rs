//! OpenAI-compatible embedding client with bounded retry.
//!
//! Implements the `Embedder` trait from `mnemo-core` against a
//! `/embeddings` endpoint. Transient failures are retried with an
//! increasing delay (2s, 4s) before the error is reported; callers treat a
//! final failure as "skip this tier / drop this write".

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mnemo_core::memory::embedder::Embedder;
use mnemo_types::error::RepositoryError;

/// Attempts per embed call, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// OpenAI-compatible `/embeddings` client.
pub struct OpenAiCompatEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OpenAiCompatEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            dimension,
        }
    }

    fn url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        let body = WireEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| RepositoryError::Query(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Query(format!(
                "embedding endpoint returned {status}: {error_body}"
            )));
        }

        let wire: WireEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid embedding response: {e}")))?;

        // Items are returned with an index; order by it to match the input.
        let mut data = wire.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(RepositoryError::Query(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiCompatEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.embed_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        let wait = Duration::from_secs(u64::from(attempt) * 2);
                        tracing::warn!(
                            attempt,
                            wait_secs = wait.as_secs(),
                            error = %e,
                            "Embedding attempt failed; retrying"
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        tracing::warn!(
                            attempts = MAX_ATTEMPTS,
                            error = %e,
                            "Embedding failed after all attempts"
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(RepositoryError::Connection))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAiCompatEmbedder {
        OpenAiCompatEmbedder::new(
            "http://localhost:1234/v1",
            SecretString::from("test-key"),
            "test-embed",
            768,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_metadata_accessors() {
        let e = embedder();
        assert_eq!(e.model_name(), "test-embed");
        assert_eq!(e.dimension(), 768);
        assert_eq!(e.url(), "http://localhost:1234/v1/embeddings");
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        // No HTTP server is running; an empty input must not hit the network.
        let vectors = embedder().embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_response_items_sorted_by_index() {
        let json = r#"{
            "data": [
                {"index": 1, "embedding": [0.2]},
                {"index": 0, "embedding": [0.1]}
            ]
        }"#;
        let mut wire: WireEmbeddingResponse = serde_json::from_str(json).unwrap();
        wire.data.sort_by_key(|d| d.index);
        assert_eq!(wire.data[0].embedding, vec![0.1]);
        assert_eq!(wire.data[1].embedding, vec![0.2]);
    }
}
