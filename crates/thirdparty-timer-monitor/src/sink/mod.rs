//! Metric sinks the monitor publishes to.

use std::collections::BTreeSet;
use std::io::Write;

use chrono::Utc;
use serde::Serialize;

use thirdparty_timer::{MetricName, MetricSample, MetricSink, TimerError, TimerResult};

/// Writes each sample as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

#[derive(Serialize)]
struct SampleLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    sample: &'a MetricSample,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> MetricSink for JsonLinesSink<W> {
    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        let line = SampleLine {
            timestamp: Utc::now().to_rfc3339(),
            sample: &sample,
        };
        serde_json::to_writer(&mut self.writer, &line)
            .map_err(|e| TimerError::Publish(format!("failed to encode sample: {e}")))?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|e| TimerError::Publish(format!("failed to write sample: {e}")))
    }
}

/// Logs each sample through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        tracing::info!(
            group = %sample.group,
            metric = %sample.metric,
            host = %sample.host,
            value = sample.value,
            "metric"
        );
        Ok(())
    }
}

/// Restricts a sink to a set of subscribed metrics.
pub struct SubscribedSink<S> {
    inner: S,
    metrics: BTreeSet<MetricName>,
}

impl<S: MetricSink> SubscribedSink<S> {
    pub fn new(inner: S, metrics: BTreeSet<MetricName>) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: MetricSink> MetricSink for SubscribedSink<S> {
    fn wants(&self, metric: MetricName) -> bool {
        self.metrics.contains(&metric) && self.inner.wants(metric)
    }

    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        self.inner.record(sample)
    }
}
