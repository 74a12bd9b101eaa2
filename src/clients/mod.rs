//! Model-call client contract and provider dispatch.
//!
//! The router never knows how a provider is reached. It looks the provider
//! name up in a [`ClientRegistry`] built by the caller and awaits
//! [`ModelClient::call`], which returns a [`ModelResult`] of fixed shape.
//!
//! # Submodules
//!
//! - `common`: token estimation and cost arithmetic.
//! - `echo`: deterministic offline client for demos and tests.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod common;
pub mod echo;

pub use echo::EchoClient;

use crate::error::{Result, RouterError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a model client returns for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub latency_ms: u64,
    /// Provider payload, passed through untouched.
    #[serde(default)]
    pub raw: Value,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, model_id: &str, prompt: &str) -> Result<ModelResult>;
}

/// Provider name → client dispatch table.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, Arc<dyn ModelClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for `provider`, replacing any previous one.
    pub fn register(mut self, provider: impl Into<String>, client: Arc<dyn ModelClient>) -> Self {
        self.clients.insert(provider.into(), client);
        self
    }

    pub fn get(&self, provider: &str) -> Result<Arc<dyn ModelClient>> {
        self.clients
            .get(provider)
            .cloned()
            .ok_or_else(|| RouterError::UnknownProvider(provider.to_string()))
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Registry with an [`EchoClient`] for each provider the router knows,
    /// priced like that provider's entry-level model.
    pub fn offline() -> Self {
        Self::new()
            .register("openai", Arc::new(EchoClient::new("OpenAI", 0.0015, 0.002)))
            .register("anthropic", Arc::new(EchoClient::new("Anthropic", 0.002, 0.0025)))
            .register("google", Arc::new(EchoClient::new("Gemini", 0.0005, 0.0005)))
            .register("meta", Arc::new(EchoClient::new("LLaMA", 0.0, 0.0)))
            .register("mistral", Arc::new(EchoClient::new("Mistral", 0.0, 0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let registry = ClientRegistry::new();
        let err = registry.get("openai").err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownProvider);
    }

    #[test]
    fn test_offline_registry_covers_providers() {
        let registry = ClientRegistry::offline();
        let providers: Vec<&str> = registry.providers().collect();
        assert_eq!(providers, vec!["anthropic", "google", "meta", "mistral", "openai"]);
    }
}
