//! Embedding provider client for text-to-vector conversion.
//!
//! The provider is an external HTTP service; every call is bounded by a
//! timeout. A missing endpoint or credential leaves the service in a
//! degraded state in which embedding is reported as unavailable rather
//! than failing construction — catalog writes must be able to proceed
//! without vectors.

use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::errors::Error;

/// Embedding dimensions for the catalog vector space.
pub const EMBEDDING_DIMS: usize = 768;

/// Text-to-vector conversion at the seam between the catalog store and the
/// external provider. An `Err` from [`embed`](TextEmbedder::embed) means the
/// provider could not produce a vector; callers decide whether that degrades
/// (catalog writes) or surfaces (semantic search).
pub trait TextEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;
}

/// Build the single descriptive document a title embedding is derived from.
///
/// Non-empty fields are labeled and joined with `" | "` in a fixed order so
/// the same fields always produce the same document.
pub fn document_text(
    name: &str,
    creator: &str,
    summary: Option<&str>,
    category: Option<&str>,
) -> String {
    let mut parts = vec![format!("Name: {name}"), format!("Creator: {creator}")];

    if let Some(category) = category {
        if !category.trim().is_empty() {
            parts.push(format!("Category: {category}"));
        }
    }

    if let Some(summary) = summary {
        if !summary.trim().is_empty() {
            parts.push(format!("Summary: {summary}"));
        }
    }

    parts.join(" | ")
}

/// HTTP client for the embedding provider.
///
/// Explicitly constructed from [`Config`] and injected into the catalog
/// store; there is no lazily-initialized global instance.
pub struct EmbeddingService {
    provider: Option<Provider>,
}

struct Provider {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingService {
    /// Build the service from configuration.
    ///
    /// An empty provider endpoint yields a degraded service whose `embed`
    /// always reports unavailability.
    pub fn new(config: &Config) -> Self {
        if config.provider_endpoint.trim().is_empty() {
            tracing::warn!("embedding provider endpoint not configured; embeddings disabled");
            return EmbeddingService { provider: None };
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build();

        EmbeddingService {
            provider: Some(Provider {
                agent,
                endpoint: config.provider_endpoint.trim_end_matches('/').to_string(),
                model: config.provider_model.clone(),
                api_token: config.api_token.clone(),
            }),
        }
    }

    /// True when a provider endpoint is configured.
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

impl TextEmbedder for EmbeddingService {
    /// Request an embedding for a single text.
    ///
    /// Returns exactly [`EMBEDDING_DIMS`] f32 values on success. Transport
    /// failures, non-2xx statuses, timeouts, and dimension mismatches all
    /// map to [`Error::Provider`].
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::Provider("provider not configured".to_string()))?;

        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }

        let url = format!("{}/v1/embeddings", provider.endpoint);
        let mut request = provider.agent.post(&url);
        if let Some(token) = &provider.api_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request
            .send_json(serde_json::json!({
                "model": provider.model,
                "input": text,
            }))
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    Error::Provider(format!("provider returned status {code}"))
                }
                ureq::Error::Transport(t) => Error::Provider(format!("transport error: {t}")),
            })?;

        let body: EmbeddingResponse = response
            .into_json()
            .map_err(|e| Error::Provider(format!("malformed provider response: {e}")))?;

        if body.embedding.len() != EMBEDDING_DIMS {
            return Err(Error::MismatchedDimensions {
                expected: EMBEDDING_DIMS,
                actual: body.embedding.len(),
            });
        }

        if body.embedding.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidEmbedding(
                "provider returned NaN or infinite values".to_string(),
            ));
        }

        Ok(body.embedding)
    }
}
