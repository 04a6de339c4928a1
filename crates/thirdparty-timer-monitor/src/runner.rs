//! Execution passes: fetch a report, then aggregate and publish it.
//!
//! A pass is bounded by the configured execution timeout. The fetch is
//! cut off when the deadline passes; aggregation observes the deadline and
//! the shutdown flag between hosts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use thirdparty_timer::{run_pass, Deadline, MeasureKey, MetricSink, PassReport, StopSignal};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::fetch::ReportClient;
use crate::sink::SubscribedSink;

/// A sink shared between passes.
pub type SharedSink<S> = Arc<Mutex<S>>;

/// Cooperative shutdown: a flag passes poll plus a wake-up for the idle loop.
#[derive(Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Stops a pass on shutdown or once its deadline passes.
struct PassStop {
    shutdown: Arc<AtomicBool>,
    deadline: Deadline,
}

impl StopSignal for PassStop {
    fn is_stopped(&self) -> bool {
        self.shutdown.is_stopped() || self.deadline.is_stopped()
    }
}

/// Runs passes for one configuration.
pub struct Monitor {
    client: ReportClient,
    measure: MeasureKey,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;
        let client = ReportClient::new(&config)?;
        Ok(Self {
            client,
            measure: config.measure_key(),
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Fetch the report and publish one pass into `sink`.
    pub async fn run_once<S>(
        &self,
        sink: &SharedSink<S>,
        shutdown: &Shutdown,
    ) -> MonitorResult<PassReport>
    where
        S: MetricSink + Send + 'static,
    {
        let started = Instant::now();
        let timeout = self.config.execution_timeout();
        let deadline = started.checked_add(timeout).ok_or_else(|| {
            MonitorError::Config(format!(
                "executionTimeoutSecs {} is out of range",
                self.config.execution_timeout_secs
            ))
        })?;

        let bytes = tokio::time::timeout(timeout, self.client.fetch_report())
            .await
            .map_err(|_| MonitorError::Timeout(self.config.execution_timeout_secs))??;

        let stop = PassStop {
            shutdown: Arc::clone(&shutdown.flag),
            deadline: Deadline(deadline),
        };
        let measure = self.measure.clone();
        let metrics = self.config.metrics.clone();
        let sink = Arc::clone(sink);

        let report = tokio::task::spawn_blocking(move || -> MonitorResult<PassReport> {
            let mut guard = sink
                .lock()
                .map_err(|_| MonitorError::Sink("sink lock poisoned".into()))?;
            let mut subscribed = SubscribedSink::new(&mut *guard, metrics);
            Ok(run_pass(&bytes, &measure, &mut subscribed, &stop)?)
        })
        .await
        .map_err(|e| MonitorError::Sink(format!("pass task failed: {e}")))??;

        tracing::info!(
            "Pass complete in {} ms: {} hosts, {} samples{}",
            started.elapsed().as_millis(),
            report.hosts_processed,
            report.samples_emitted,
            if report.stopped_early { " (stopped early)" } else { "" }
        );
        Ok(report)
    }

    /// Run a pass every interval until shutdown. Failed passes are logged
    /// and the loop continues.
    pub async fn watch<S>(&self, sink: SharedSink<S>, shutdown: Shutdown) -> MonitorResult<()>
    where
        S: MetricSink + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            "Watching {} every {} s",
            self.client.url(),
            self.config.interval_secs
        );

        let mut passes: u64 = 0;
        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                _ = shutdown.notified() => {
                    break;
                }
                _ = ticker.tick() => {
                    passes = passes.saturating_add(1);
                    if let Err(e) = self.run_once(&sink, &shutdown).await {
                        tracing::error!("Pass {passes} failed: {e}");
                    }
                }
            }
        }

        tracing::info!("Watch loop stopping after {passes} passes");
        Ok(())
    }
}
