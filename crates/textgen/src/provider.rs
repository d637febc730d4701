//! The text generator: a black-box local callable per spec §6. No streaming,
//! one call in, one string out. Grounded on `LlmProvider`'s trait shape
//! (the teacher's `crates/llm/src/provider.rs`), narrowed to the single
//! `generate` operation the classifier needs (no chat history, no roles).

use async_trait::async_trait;

use crate::error::TextGenError;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TextGenError>;
}

/// HTTP-backed generator for a locally hosted completion endpoint
/// (`POST {base_url}/generate` with `{prompt, max_tokens, temperature} -> {text}`).
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextGenerator {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TextGenError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url.trim_end_matches('/')))
            .json(&serde_json::json!({
                "prompt": request.prompt,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextGenError::ApiError { status: status.as_u16(), body });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| TextGenError::ParseError(e.to_string()))?;
        parsed["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| TextGenError::ParseError("response missing 'text'".to_string()))
    }
}

/// A fixed-reply generator for tests and offline development: returns a
/// deterministic string templated from the prompt rather than calling out.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TextGenError> {
        Ok(format!("[echo:{}chars] {}", request.prompt.len(), request.prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_generator_returns_deterministic_text() {
        let gen = EchoGenerator;
        let request = GenerationRequest { prompt: "hi".to_string(), max_tokens: 10, temperature: 0.0 };
        let result = gen.generate(request).await.unwrap();
        assert_eq!(result, "[echo:2chars] hi");
    }
}
