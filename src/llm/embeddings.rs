use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Maximum characters to send per text to the embedding API. Embedding
/// models typically carry an 8k-token context; plain prose tokenizes at
/// roughly 1 token per 3-4 chars, so this stays safely under the limit even
/// for dense text.
const MAX_EMBED_CHARS: usize = 8_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Client for the OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Unlike the chat collaborator, embedding failures are surfaced to the
/// caller — an index built from silently-missing vectors would be corrupt.
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Generate an embedding for a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_many(&[text.to_string()]).await?;
        results.into_iter().next().context("No embedding returned")
    }

    /// Generate embeddings for a batch of texts, preserving input order.
    /// Requests are batched internally at the configured batch size.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("LLM_API_KEY is not configured; cannot generate embeddings")?;

        let url = format!("{}/v1/embeddings", self.config.base_url);
        let batch_size = self.config.embedding_batch_size.max(1);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size) {
            let req = EmbedRequest {
                model: self.config.embedding_model.clone(),
                input: batch
                    .iter()
                    .map(|t| truncate_for_embedding(t).to_string())
                    .collect(),
            };

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&req)
                .send()
                .await
                .context("Failed to call embedding API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Embedding API returned {status}: {body}");
            }

            let body: EmbedResponse = resp
                .json()
                .await
                .context("Failed to parse embedding response")?;

            if body.data.len() != batch.len() {
                anyhow::bail!(
                    "Embedding API returned {} vectors for {} inputs",
                    body.data.len(),
                    batch.len()
                );
            }

            // The API reports per-input indexes; sort on them so output
            // order always matches input order.
            let mut data = body.data;
            data.sort_by_key(|d| d.index);

            for d in data {
                if d.embedding.len() != self.config.embedding_dim {
                    anyhow::bail!(
                        "Embedding has {} dimensions, expected {}",
                        d.embedding.len(),
                        self.config.embedding_dim
                    );
                }
                all_embeddings.push(d.embedding);
            }
        }

        Ok(all_embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_is_untouched() {
        assert_eq!(truncate_for_embedding("hello"), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(MAX_EMBED_CHARS); // 2 bytes per char
        let truncated = truncate_for_embedding(&text);
        assert!(truncated.len() <= MAX_EMBED_CHARS);
        assert!(truncated.is_char_boundary(truncated.len()));
    }

    #[tokio::test]
    async fn test_embed_many_without_api_key_is_an_error() {
        let client = EmbeddingClient::new(reqwest::Client::new(), LlmConfig::default());
        let err = client.embed_many(&["text".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[tokio::test]
    async fn test_embed_many_empty_input_short_circuits() {
        let client = EmbeddingClient::new(reqwest::Client::new(), LlmConfig::default());
        assert!(client.embed_many(&[]).await.unwrap().is_empty());
    }
}
