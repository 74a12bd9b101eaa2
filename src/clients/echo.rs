// Offline echo client
// Author: kelexine (https://github.com/kelexine)
//
// Returns the prompt back with deterministic token counts and cost, so the
// cache and ledger can be exercised without network access or credentials.

use super::common::{compute_cost, estimate_tokens};
use super::{ModelClient, ModelResult};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct EchoClient {
    label: String,
    /// USD per 1K input tokens
    price_in: f64,
    /// USD per 1K output tokens
    price_out: f64,
}

impl EchoClient {
    pub fn new(label: impl Into<String>, price_in: f64, price_out: f64) -> Self {
        Self {
            label: label.into(),
            price_in,
            price_out,
        }
    }
}

#[async_trait]
impl ModelClient for EchoClient {
    async fn call(&self, model_id: &str, prompt: &str) -> Result<ModelResult> {
        let start = Instant::now();
        let text = format!("[{}:{}] Echo: {}", self.label, model_id, prompt);

        let tokens_in = estimate_tokens(prompt);
        let tokens_out = estimate_tokens(&text);

        Ok(ModelResult {
            tokens_in,
            tokens_out,
            cost_usd: compute_cost(tokens_in, tokens_out, self.price_in, self.price_out),
            latency_ms: start.elapsed().as_millis() as u64,
            raw: json!({ "status": "offline" }),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_is_deterministic() {
        let client = EchoClient::new("OpenAI", 0.0015, 0.002);
        let a = client.call("gpt-4o-mini", "Explain caching").await.unwrap();
        let b = client.call("gpt-4o-mini", "Explain caching").await.unwrap();

        assert_eq!(a.text, "[OpenAI:gpt-4o-mini] Echo: Explain caching");
        assert_eq!(a.text, b.text);
        assert_eq!(a.tokens_in, b.tokens_in);
        assert_eq!(a.cost_usd, b.cost_usd);
        assert!(a.cost_usd > 0.0);
    }
}
