//! Fraud-scoring client: an out-of-process call through the resilient proxy.

use std::sync::Arc;

use async_trait::async_trait;
use gateway_core::RequestContext;
use gateway_proxy::{ProxyRequest, ResilientProxy};
use http::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Payload submitted for scoring.
#[derive(Debug, Clone, Serialize)]
pub struct FraudCheck {
    pub user_id: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudAction {
    Approve,
    Review,
    Reject,
}

/// What the scoring service (or the degraded fallback) says about a
/// transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudVerdict {
    pub risk_score: f64,
    pub action: FraudAction,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// True when the verdict is the fail-open placeholder, not a real score.
    #[serde(default)]
    pub degraded: bool,
}

/// The scoring service could not produce a verdict.
#[derive(Debug, Clone, Error)]
pub enum FraudUnavailable {
    /// The fraud breaker is open; the service was not contacted.
    #[error("fraud service circuit open: {0}")]
    CircuitOpen(String),
    /// Retries exhausted, or the response was unusable.
    #[error("fraud service unavailable: {0}")]
    Unreachable(String),
}

/// Interface the checkout saga scores transactions through.
#[async_trait]
pub trait FraudScorer: Send + Sync {
    async fn analyze(
        &self,
        check: &FraudCheck,
        context: &RequestContext,
    ) -> Result<FraudVerdict, FraudUnavailable>;
}

/// Production scorer: POSTs to the fraud service through its breaker and
/// retry stack.
pub struct ProxyFraudScorer {
    proxy: Arc<ResilientProxy>,
    path: String,
}

impl ProxyFraudScorer {
    pub fn new(proxy: Arc<ResilientProxy>, path: impl Into<String>) -> Self {
        Self {
            proxy,
            path: path.into(),
        }
    }
}

#[async_trait]
impl FraudScorer for ProxyFraudScorer {
    async fn analyze(
        &self,
        check: &FraudCheck,
        context: &RequestContext,
    ) -> Result<FraudVerdict, FraudUnavailable> {
        let body = serde_json::to_vec(check)
            .map_err(|err| FraudUnavailable::Unreachable(format!("encoding payload: {err}")))?;

        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );

        let request = ProxyRequest::new(Method::POST, self.path.clone(), context.clone())
            .with_headers(headers)
            .with_body(body.into());

        let response = self.proxy.dispatch(request).await.map_err(|err| {
            if err.is_circuit_open() {
                FraudUnavailable::CircuitOpen(err.to_string())
            } else {
                FraudUnavailable::Unreachable(err.to_string())
            }
        })?;

        if !response.status.is_success() {
            return Err(FraudUnavailable::Unreachable(format!(
                "scoring returned {}",
                response.status
            )));
        }

        serde_json::from_slice(&response.body)
            .map_err(|err| FraudUnavailable::Unreachable(format!("unparseable verdict: {err}")))
    }
}

/// Fixed-verdict scorer for tests and local runs.
pub struct StaticFraudScorer {
    verdict: Result<FraudVerdict, FraudUnavailable>,
}

impl StaticFraudScorer {
    pub fn approving() -> Self {
        Self {
            verdict: Ok(FraudVerdict {
                risk_score: 0.1,
                action: FraudAction::Approve,
                risk_factors: Vec::new(),
                degraded: false,
            }),
        }
    }

    pub fn with_verdict(verdict: FraudVerdict) -> Self {
        Self {
            verdict: Ok(verdict),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            verdict: Err(FraudUnavailable::Unreachable(reason.to_string())),
        }
    }
}

#[async_trait]
impl FraudScorer for StaticFraudScorer {
    async fn analyze(
        &self,
        _check: &FraudCheck,
        _context: &RequestContext,
    ) -> Result<FraudVerdict, FraudUnavailable> {
        self.verdict.clone()
    }
}
