//! Failover and error-rate detection over recent traffic.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};

use crate::alerts::notifier::Notifier;
use crate::alerts::{Alert, AlertKind, RequestRecord};
use crate::config::AlertConfig;
use crate::observability::metrics;

/// Error rate is only judged once this many samples are in the window.
const MIN_SAMPLES: usize = 50;

/// Watches completed requests and raises alerts on pool changes and 5xx bursts.
#[derive(Debug)]
pub struct AlertMonitor {
    config: AlertConfig,
    cooldown: Duration,
    window: VecDeque<u16>,
    current_pool: String,
    last_pool: String,
    last_alert: HashMap<AlertKind, Instant>,
}

impl AlertMonitor {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            cooldown: Duration::from_secs(config.cooldown_secs),
            window: VecDeque::with_capacity(config.window_size),
            current_pool: config.active_pool.clone(),
            last_pool: config.active_pool.clone(),
            last_alert: HashMap::new(),
            config,
        }
    }

    /// Percentage of 5xx responses in the window.
    pub fn error_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let errors = self.window.iter().filter(|status| **status >= 500).count();
        errors as f64 / self.window.len() as f64 * 100.0
    }

    /// Fold one request into the window and return the alerts it triggers.
    pub fn observe(&mut self, record: &RequestRecord, now: Instant) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if self.window.len() == self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(record.status);

        if record.pool != self.current_pool {
            let old = std::mem::replace(&mut self.current_pool, record.pool.clone());
            self.last_pool = old.clone();
            let message = format!(
                "Failover Detected: {} → {}\nRelease: {}\nUpstream: {}\nAction: Check {} container health immediately!",
                old.to_uppercase(),
                record.pool.to_uppercase(),
                record.release.as_deref().unwrap_or("unknown"),
                record.upstream,
                old
            );
            self.push(&mut alerts, AlertKind::Failover, message, now);
        }

        let rate = self.error_rate();
        if self.window.len() >= MIN_SAMPLES.min(self.config.window_size) && rate > self.config.error_rate_threshold {
            let message = format!(
                "High Error Rate: {:.2}% (threshold: {}%)\nCurrent Pool: {}\nWindow: Last {} requests",
                rate,
                self.config.error_rate_threshold,
                record.pool.to_uppercase(),
                self.window.len()
            );
            self.push(&mut alerts, AlertKind::ErrorRate, message, now);
        }

        let active = &self.config.active_pool;
        if record.pool == *active && self.current_pool == *active && self.last_pool != *active
            && rate <= self.config.error_rate_threshold
        {
            let message = format!(
                "Recovery: {} pool restored\nCurrent Error Rate: {:.2}%",
                active.to_uppercase(),
                rate
            );
            self.last_pool = active.clone();
            self.push(&mut alerts, AlertKind::Recovery, message, now);
        }

        alerts
    }

    fn push(&mut self, alerts: &mut Vec<Alert>, kind: AlertKind, message: String, now: Instant) {
        if self.config.maintenance_mode && kind == AlertKind::Failover {
            tracing::info!(kind = kind.as_str(), "Maintenance mode, alert suppressed");
            return;
        }
        if let Some(last) = self.last_alert.get(&kind) {
            if now.saturating_duration_since(*last) < self.cooldown {
                tracing::debug!(kind = kind.as_str(), "Alert cooldown active");
                return;
            }
        }
        alerts.push(Alert { kind, message });
    }

    /// Start the cooldown for `kind`. Only called once delivery succeeded so a
    /// failed post is retried on the next matching request.
    pub fn delivered(&mut self, kind: AlertKind, now: Instant) {
        self.last_alert.insert(kind, now);
    }

    /// Consume request records until shutdown or until every sender is gone.
    pub async fn run(
        mut self,
        mut records: mpsc::Receiver<RequestRecord>,
        notifier: Notifier,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            active_pool = %self.config.active_pool,
            threshold = self.config.error_rate_threshold,
            window = self.config.window_size,
            cooldown_secs = self.config.cooldown_secs,
            maintenance = self.config.maintenance_mode,
            "Alert monitor starting"
        );

        loop {
            tokio::select! {
                record = records.recv() => {
                    let Some(record) = record else { break };
                    for alert in self.observe(&record, Instant::now()) {
                        metrics::record_alert(alert.kind.as_str());
                        if notifier.send(&alert).await {
                            self.delivered(alert.kind, Instant::now());
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Alert monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
