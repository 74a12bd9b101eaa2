//! Cached, accounted model calls.
//!
//! [`Router::query`] runs the full path for one prompt: build the cache key,
//! look it up, call the provider on a miss and store the result, then append
//! a call record and fold it into the daily rollup. [`Router::compare`] does
//! the same for several targets and ranks the outputs through a [`Scorer`].
//!
//! Caching is best effort: cache read and write failures are logged and the
//! call proceeds as a miss. Ledger failures are returned.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::cache::{make_key, Cache, Metadata};
use crate::clients::{ClientRegistry, ModelResult};
use crate::error::{Result, RouterError};
use crate::scoring::{rank, ScoredResult, Scorer};
use crate::usage::{CallParams, CallRecord, CallRecorder, RollupAggregator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One model call to route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub tools_signature: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl RouteRequest {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn tools_signature(mut self, tools: impl Into<String>) -> Self {
        self.tools_signature = tools.into();
        self
    }
}

/// Result of a routed call.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub result: ModelResult,
    pub cache_hit: bool,
    pub record: CallRecord,
}

/// A call that produced a result but has not been recorded yet.
struct Pending {
    request: RouteRequest,
    result: ModelResult,
    cache_hit: bool,
    latency_ms: u64,
}

pub struct Router {
    cache: Cache,
    clients: ClientRegistry,
    recorder: CallRecorder,
    rollup: RollupAggregator,
    daily_path: PathBuf,
    version_tag: String,
}

impl Router {
    pub fn new(
        cache: Cache,
        clients: ClientRegistry,
        recorder: CallRecorder,
        daily_path: impl Into<PathBuf>,
        version_tag: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            clients,
            recorder,
            rollup: RollupAggregator::new(),
            daily_path: daily_path.into(),
            version_tag: version_tag.into(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn daily_path(&self) -> &std::path::Path {
        &self.daily_path
    }

    pub fn key_for(&self, request: &RouteRequest) -> String {
        make_key(
            &request.model,
            &request.prompt,
            &request.tools_signature,
            &request.mode,
            &self.version_tag,
        )
    }

    /// Serve `request` from cache or the provider, then record it.
    pub async fn query(&self, request: &RouteRequest) -> Result<RouteOutcome> {
        let pending = self.execute(request).await?;
        self.finish(pending, None)
    }

    /// Route `prompt` to every `(provider, model)` target and rank the outputs.
    ///
    /// Each target is recorded with its score as `eval.auto_score`.
    pub async fn compare(
        &self,
        prompt: &str,
        mode: &str,
        targets: &[(String, String)],
        scorer: &dyn Scorer,
    ) -> Result<Vec<ScoredResult<RouteOutcome>>> {
        let mut pending = Vec::with_capacity(targets.len());
        for (provider, model) in targets {
            let request = RouteRequest::new(provider, model, prompt).mode(mode);
            pending.push(self.execute(&request).await?);
        }

        let results: Vec<(Pending, ModelResult)> = pending
            .into_iter()
            .map(|p| {
                let result = p.result.clone();
                (p, result)
            })
            .collect();

        let mut ranked = Vec::with_capacity(results.len());
        for scored in rank(scorer, prompt, results) {
            let outcome = self.finish(scored.item, Some(scored.score))?;
            ranked.push(ScoredResult {
                item: outcome,
                result: scored.result,
                score: scored.score,
                reason: scored.reason,
            });
        }
        Ok(ranked)
    }

    async fn execute(&self, request: &RouteRequest) -> Result<Pending> {
        let key = self.key_for(request);
        let start = Instant::now();

        if let Some(result) = self.lookup(&key) {
            debug!("Cache hit for {}/{}", request.provider, request.model);
            return Ok(Pending {
                request: request.clone(),
                result,
                cache_hit: true,
                latency_ms: start.elapsed().as_millis() as u64,
            });
        }

        let client = self.clients.get(&request.provider)?;
        let result = client.call(&request.model, &request.prompt).await?;
        if !result.cost_usd.is_finite() || result.cost_usd < 0.0 {
            return Err(RouterError::Client(format!(
                "{} returned invalid cost {}",
                request.provider, result.cost_usd
            )));
        }

        let mut metadata = Metadata::new();
        metadata.insert("provider".to_string(), json!(request.provider));
        metadata.insert("model".to_string(), json!(request.model));
        metadata.insert("cached_at".to_string(), json!(chrono::Utc::now()));

        match serde_json::to_value(&result) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, value, metadata) {
                    warn!("Failed to cache result for {}: {}", request.model, e);
                }
            }
            Err(e) => warn!("Result for {} is not cacheable: {}", request.model, e),
        }

        Ok(Pending {
            request: request.clone(),
            latency_ms: result.latency_ms.max(start.elapsed().as_millis() as u64),
            result,
            cache_hit: false,
        })
    }

    fn lookup(&self, key: &str) -> Option<ModelResult> {
        let (value, _metadata) = match self.cache.get(key) {
            Ok(Some(hit)) => hit,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {}", e);
                return None;
            }
        };

        match serde_json::from_value::<ModelResult>(value) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Cached value has unexpected shape, treating as miss: {}", e);
                None
            }
        }
    }

    /// Append the record and update the rollup.
    ///
    /// Cache hits are recorded with the cached token counts but no cost, since
    /// no provider call was made.
    fn finish(&self, pending: Pending, auto_score: Option<f64>) -> Result<RouteOutcome> {
        let Pending {
            request,
            result,
            cache_hit,
            latency_ms,
        } = pending;

        let mut params = CallParams::new(&request.prompt, &request.model, &request.mode);
        params.tokens_in = result.tokens_in;
        params.tokens_out = result.tokens_out;
        params.cost_usd = if cache_hit { 0.0 } else { result.cost_usd };
        params.latency_ms = latency_ms;
        params.cache_hit = cache_hit;
        params.auto_score = auto_score;
        params.request_id = request.request_id.clone();
        params
            .extra
            .insert("provider".to_string(), Value::String(request.provider.clone()));

        let record = self.recorder.record(params)?;
        self.rollup.update(&self.daily_path, &record)?;

        info!(
            "{} {}/{} tokens={}/{} cost=${:.6}",
            if cache_hit { "HIT " } else { "MISS" },
            request.provider,
            request.model,
            record.tokens_in,
            record.tokens_out,
            record.cost_usd
        );

        Ok(RouteOutcome {
            result,
            cache_hit,
            record,
        })
    }
}
