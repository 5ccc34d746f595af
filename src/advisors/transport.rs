//! Advisor transport contract and the deterministic in-memory reference double
//!
//! Transports carry one prompt to one backing model and return the raw text.
//! They are selected by configuration and injected by the host — the
//! coordinator never inspects concrete types. Cancellation is cooperative:
//! a transport that ignores its token is marked aborted in bookkeeping and
//! its eventual result is discarded, not awaited.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::TokenUsage;

// ============================================================================
// Contract
// ============================================================================

/// One prompt headed to one backing model.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub advisor_id: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Raw transport-level reply, before schema validation.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub raw_text: String,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    pub finish_reason: String,
    pub status_code: u16,
}

/// Dollar estimate for a token usage, plus whether it fits the configured
/// spending budget.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimate {
    pub estimated_cost_usd: f64,
    pub within_budget: bool,
}

/// Transport-level failures. Validation failures are not transport errors —
/// a well-formed reply with bad content is the validator's business.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),
    #[error("transport cancelled")]
    Cancelled,
}

/// Capability interface for advisor backends.
#[async_trait]
pub trait AdvisorTransport: Send + Sync {
    /// Invoke the backing model. Implementations should observe `cancel`
    /// and return `TransportError::Cancelled` promptly when it fires.
    async fn invoke(
        &self,
        request: &TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError>;

    /// Estimate the dollar cost of a token usage.
    fn estimate_cost(&self, usage: &TokenUsage) -> CostEstimate;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Mock transport (reference test double)
// ============================================================================

/// Scripted reply for one advisor in the mock transport.
#[derive(Debug, Clone)]
pub struct MockReply {
    /// Raw text handed to the validator, typically a JSON opinion.
    pub raw_text: String,
    /// Artificial latency before the reply is produced.
    pub delay_ms: u64,
    pub token_usage: TokenUsage,
    /// When true the invocation fails at the transport level.
    pub fail: bool,
}

impl MockReply {
    /// A well-formed opinion reply with the given action and confidence.
    pub fn opinion(action: &str, confidence: f64) -> Self {
        Self {
            raw_text: format!(
                "{{\"action\": \"{action}\", \"confidence\": {confidence}, \"rationale\": \"mock\"}}"
            ),
            delay_ms: 0,
            token_usage: TokenUsage { prompt_tokens: 50, completion_tokens: 20 },
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_tokens(mut self, prompt: u64, completion: u64) -> Self {
        self.token_usage = TokenUsage { prompt_tokens: prompt, completion_tokens: completion };
        self
    }

    /// A transport-level failure.
    pub fn failing() -> Self {
        Self {
            raw_text: String::new(),
            delay_ms: 0,
            token_usage: TokenUsage::default(),
            fail: true,
        }
    }

    /// A reply that will not pass schema validation.
    pub fn garbage(text: &str) -> Self {
        Self {
            raw_text: text.to_string(),
            delay_ms: 0,
            token_usage: TokenUsage { prompt_tokens: 50, completion_tokens: 5 },
            fail: false,
        }
    }
}

/// Deterministic in-memory transport keyed by advisor id.
///
/// The reference double for coordinator tests: no network, reproducible
/// latency, scripted opinions.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: HashMap<String, MockReply>,
    /// Cost per token in USD, for `estimate_cost`.
    usd_per_token: f64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            usd_per_token: 2e-6,
        }
    }

    pub fn with_reply(mut self, advisor_id: &str, reply: MockReply) -> Self {
        self.replies.insert(advisor_id.to_string(), reply);
        self
    }
}

#[async_trait]
impl AdvisorTransport for MockTransport {
    async fn invoke(
        &self,
        request: &TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let Some(reply) = self.replies.get(&request.advisor_id) else {
            return Err(TransportError::Request(format!(
                "no scripted reply for advisor {}",
                request.advisor_id
            )));
        };

        if reply.delay_ms > 0 {
            tokio::select! {
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                () = tokio::time::sleep(Duration::from_millis(reply.delay_ms)) => {}
            }
        }

        if reply.fail {
            return Err(TransportError::Request("scripted transport failure".to_string()));
        }

        Ok(TransportResponse {
            raw_text: reply.raw_text.clone(),
            latency_ms: reply.delay_ms,
            token_usage: reply.token_usage,
            finish_reason: "stop".to_string(),
            status_code: 200,
        })
    }

    fn estimate_cost(&self, usage: &TokenUsage) -> CostEstimate {
        CostEstimate {
            estimated_cost_usd: usage.total() as f64 * self.usd_per_token,
            within_budget: true,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Tests
// ============================================================================
