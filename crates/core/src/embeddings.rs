use crate::error::ProviderError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub const LOCAL_MODEL_PREFIX: &str = "char-trigram-";

const REMOTE_BATCH_SIZE: usize = 64;

pub trait Embedder {
    /// Identifier recorded alongside persisted vectors.
    fn model_id(&self) -> String;

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Offline embedder hashing lowercase character trigrams into a fixed number
/// of buckets, L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    /// Parses ids of the form `char-trigram-<dimensions>`.
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let dimensions = model_id.strip_prefix(LOCAL_MODEL_PREFIX)?.parse::<usize>().ok()?;
        if dimensions == 0 {
            return None;
        }
        Some(Self { dimensions })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> String {
        format!("{LOCAL_MODEL_PREFIX}{}", self.dimensions)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.vectorize(text))
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl HttpEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            client,
            endpoint: base.join("embeddings")?,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.trim())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::status("embeddings", status, &body));
        }

        parse_embedding_response(texts.len(), response.json()?)
    }
}

impl Embedder for HttpEmbedder {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.request(&[text])?
            .pop()
            .ok_or_else(|| ProviderError::BackendResponse {
                backend: "embeddings".to_string(),
                details: "empty embedding response".to_string(),
            })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        embed_in_batches(texts, REMOTE_BATCH_SIZE, |batch| self.request(batch))
    }
}

/// Sends `texts` in slices of at most `batch_size`, keeping input order.
fn embed_in_batches<F>(
    texts: &[&str],
    batch_size: usize,
    mut request: F,
) -> Result<Vec<Vec<f32>>, ProviderError>
where
    F: FnMut(&[&str]) -> Result<Vec<Vec<f32>>, ProviderError>,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(request(batch)?);
    }
    Ok(vectors)
}

/// Orders returned vectors by their `index` and checks one came back per input.
fn parse_embedding_response(
    expected: usize,
    mut parsed: EmbeddingResponse,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if parsed.data.len() != expected {
        return Err(ProviderError::BackendResponse {
            backend: "embeddings".to_string(),
            details: format!(
                "expected {} embeddings, received {}",
                expected,
                parsed.data.len()
            ),
        });
    }

    parsed.data.sort_by_key(|item| item.index);
    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
