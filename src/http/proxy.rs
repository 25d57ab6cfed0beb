//! Retrying upstream proxy.
//!
//! # Responsibilities
//! - Ask the failover router for a target on every attempt
//! - Execute the attempt within its time budget and classify the result
//! - Feed every outcome to the health tracker before deciding what to do next
//! - Retry on a different target while budget and deadline allow
//!
//! # Design Decisions
//! - Each attempt opens its own HTTP/1.1 connection so the connect phase and
//!   the wait for response headers are timed separately

use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::health::passive::{classify, Observation, Outcome};
use crate::health::state::HealthPolicy;
use crate::health::tracker::HealthTracker;
use crate::http::request::ForwardRequest;
use crate::http::response::ProxyError;
use crate::load_balancer::{FailoverRouter, GroupError, RoutingGroup, Target};
use crate::observability::metrics;
use crate::resilience::{Deadline, RetryPolicy, Timeouts};

/// Result of proxying one client request.
#[derive(Debug)]
pub struct Exchange {
    /// Target of the last attempt.
    pub target: Arc<Target>,
    pub attempts: u32,
    pub result: Result<axum::http::Response<Incoming>, ProxyError>,
}

/// One try against one target. Consumed as soon as it is produced.
#[derive(Debug)]
struct AttemptRecord {
    target: Arc<Target>,
    start: Instant,
    outcome: Outcome,
    latency: Duration,
}

enum AttemptResult {
    Response(axum::http::Response<Incoming>),
    Failed(Observation),
}

impl AttemptResult {
    fn observation(&self) -> Observation {
        match self {
            AttemptResult::Response(response) => Observation::Status(response.status()),
            AttemptResult::Failed(observation) => *observation,
        }
    }
}

/// Primary/backup proxy core shared by every request task.
#[derive(Debug)]
pub struct RetryingProxy {
    group: Arc<RoutingGroup>,
    router: FailoverRouter,
    tracker: HealthTracker,
    retries: RetryPolicy,
    timeouts: Timeouts,
}

impl RetryingProxy {
    pub fn new(config: &ProxyConfig) -> Result<Self, GroupError> {
        let group = Arc::new(RoutingGroup::from_config(&config.targets)?);
        let policy = HealthPolicy {
            max_fails: config.health.max_fails,
            fail_timeout: config.health.fail_timeout(),
        };
        let timeouts = Timeouts::new(&config.timeouts);

        for target in group.targets() {
            metrics::record_target_state(target.id(), target.health().snapshot().state);
        }

        Ok(Self {
            group,
            router: FailoverRouter::new(policy),
            tracker: HealthTracker::new(policy),
            retries: RetryPolicy::new(&config.retries),
            timeouts,
        })
    }

    pub fn group(&self) -> &Arc<RoutingGroup> {
        &self.group
    }

    pub fn router(&self) -> &FailoverRouter {
        &self.router
    }

    pub fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }

    /// Proxy one request, retrying on another target when allowed.
    pub async fn handle(&self, request: &ForwardRequest) -> Exchange {
        let deadline = self.timeouts.deadline(Instant::now());
        let mut selection = self.router.select(&self.group, Instant::now());
        let mut attempts_left = self.retries.total_attempts();
        let mut attempts = 0;

        loop {
            let target = selection.target.clone();
            if deadline.is_expired(Instant::now()) {
                return self.exchange(target, attempts, Err(ProxyError::DeadlineExceeded(self.timeouts.overall)));
            }

            attempts += 1;
            if attempts > 1 {
                metrics::record_retry();
            }

            let start = Instant::now();
            let result = self.attempt(&target, request, &deadline).await;
            let record = AttemptRecord {
                target: target.clone(),
                start,
                outcome: classify(result.observation()),
                latency: start.elapsed(),
            };
            let outcome = record.outcome;
            self.observe(record, request, attempts);

            let response = match result {
                AttemptResult::Response(response) => Some(response),
                AttemptResult::Failed(_) => None,
            };
            let kind = match (outcome, response) {
                (Outcome::Success, Some(response)) => {
                    return self.exchange(target, attempts, Ok(response));
                }
                (Outcome::RetryableFailure(kind), _) => kind,
                _ => {
                    let err = ProxyError::Rejected(format!("invalid upstream request for '{}'", target.id()));
                    return self.exchange(target, attempts, Err(err));
                }
            };

            let failure = ProxyError::from_failure(kind, target.id(), selection.last_resort);
            if deadline.is_expired(Instant::now()) {
                return self.exchange(target, attempts, Err(ProxyError::DeadlineExceeded(self.timeouts.overall)));
            }

            attempts_left -= 1;
            if attempts_left == 0 || !self.retries.is_retryable(&request.method, kind) {
                return self.exchange(target, attempts, Err(failure));
            }

            let next = self.router.select(&self.group, Instant::now());
            if next.target.id() == target.id() {
                tracing::debug!(
                    request_id = %request.request_id,
                    target_id = %target.id(),
                    "No alternate target to retry on"
                );
                return self.exchange(target, attempts, Err(failure));
            }

            tracing::info!(
                request_id = %request.request_id,
                from = %target.id(),
                to = %next.target.id(),
                attempt = attempts,
                reason = kind.as_str(),
                "Retrying on next target"
            );
            selection = next;
        }
    }

    async fn attempt(&self, target: &Target, request: &ForwardRequest, deadline: &Deadline) -> AttemptResult {
        let upstream = match request.to_upstream(target.address()) {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(request_id = %request.request_id, error = %e, "Failed to build upstream request");
                return AttemptResult::Failed(Observation::Rejected);
            }
        };

        let Some(connect_budget) = deadline.budget(Instant::now(), self.timeouts.connect) else {
            return AttemptResult::Failed(Observation::Timeout);
        };
        let stream = match tokio::time::timeout(connect_budget, TcpStream::connect(target.address().as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    target_id = %target.id(),
                    error = %e,
                    "Upstream connect failed"
                );
                return AttemptResult::Failed(Observation::ConnectFailed);
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    target_id = %target.id(),
                    budget_ms = connect_budget.as_millis() as u64,
                    "Upstream connect timed out"
                );
                return AttemptResult::Failed(Observation::Timeout);
            }
        };
        let _ = stream.set_nodelay(true);

        let (mut sender, conn) = match http1::handshake(TokioIo::new(stream)).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(request_id = %request.request_id, target_id = %target.id(), error = %e, "Upstream handshake failed");
                return AttemptResult::Failed(Observation::ConnectionError);
            }
        };
        // Drives the connection until the response body has been streamed.
        let target_id = target.id().to_string();
        let conn_task = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(target_id = %target_id, error = %e, "Upstream connection closed with error");
            }
        });

        // The read timeout starts once the connection is up.
        let Some(read_budget) = deadline.budget(Instant::now(), self.timeouts.read) else {
            conn_task.abort();
            return AttemptResult::Failed(Observation::Timeout);
        };
        match tokio::time::timeout(read_budget, sender.send_request(upstream)).await {
            Ok(Ok(response)) => AttemptResult::Response(response),
            Ok(Err(e)) => {
                conn_task.abort();
                tracing::warn!(
                    request_id = %request.request_id,
                    target_id = %target.id(),
                    error = %e,
                    "Upstream error"
                );
                AttemptResult::Failed(Observation::ConnectionError)
            }
            Err(_) => {
                conn_task.abort();
                tracing::warn!(
                    request_id = %request.request_id,
                    target_id = %target.id(),
                    budget_ms = read_budget.as_millis() as u64,
                    "Upstream response headers timed out"
                );
                AttemptResult::Failed(Observation::Timeout)
            }
        }
    }

    fn observe(&self, record: AttemptRecord, request: &ForwardRequest, attempt: u32) {
        self.tracker.record(&record.target, record.outcome, record.start + record.latency);
        metrics::record_attempt(record.target.id(), record.outcome.as_str(), record.latency);
        tracing::debug!(
            request_id = %request.request_id,
            target_id = %record.target.id(),
            attempt,
            outcome = record.outcome.as_str(),
            latency_ms = record.latency.as_millis() as u64,
            "Attempt finished"
        );
    }

    fn exchange(
        &self,
        target: Arc<Target>,
        attempts: u32,
        result: Result<axum::http::Response<Incoming>, ProxyError>,
    ) -> Exchange {
        Exchange {
            target,
            attempts,
            result,
        }
    }
}
