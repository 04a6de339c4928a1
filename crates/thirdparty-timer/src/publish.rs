//! Metric samples and the sink they are published to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{HostAggregate, TimerResult};

/// Metric group every sample belongs to.
pub const METRIC_GROUP: &str = "Third Party Timer";

/// Dimension that keys samples by host.
pub const HOST_DIMENSION: &str = "host";

/// The two metrics published per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricName {
    #[serde(rename = "Response Time")]
    ResponseTime,
    #[serde(rename = "Count")]
    Count,
}

impl MetricName {
    pub const ALL: [MetricName; 2] = [MetricName::ResponseTime, MetricName::Count];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::ResponseTime => "Response Time",
            MetricName::Count => "Count",
        }
    }

    /// Look up a metric by its display name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub group: String,
    pub metric: MetricName,
    pub dimension: String,
    pub host: String,
    pub value: f64,
}

impl MetricSample {
    pub fn new(metric: MetricName, host: impl Into<String>, value: f64) -> Self {
        Self {
            group: METRIC_GROUP.to_string(),
            metric,
            dimension: HOST_DIMENSION.to_string(),
            host: host.into(),
            value,
        }
    }

    /// Samples for every present metric of an aggregate, response time first.
    pub fn from_aggregate(aggregate: &HostAggregate) -> Vec<MetricSample> {
        let mut samples = Vec::with_capacity(2);
        if let Some(mean) = aggregate.response_time {
            samples.push(Self::new(MetricName::ResponseTime, &aggregate.host, mean));
        }
        if let Some(count) = aggregate.count {
            samples.push(Self::new(MetricName::Count, &aggregate.host, count as f64));
        }
        samples
    }
}

/// Destination for metric samples.
pub trait MetricSink {
    /// Whether this sink is subscribed to `metric`. Unsubscribed metrics
    /// are not emitted.
    fn wants(&self, _metric: MetricName) -> bool {
        true
    }

    /// Record one sample.
    fn record(&mut self, sample: MetricSample) -> TimerResult<()>;
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn wants(&self, metric: MetricName) -> bool {
        (**self).wants(metric)
    }

    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        (**self).record(sample)
    }
}

impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    fn wants(&self, metric: MetricName) -> bool {
        (**self).wants(metric)
    }

    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        (**self).record(sample)
    }
}

/// In-memory sink that keeps every sample it receives.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    samples: Vec<MetricSample>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<MetricSample> {
        self.samples
    }

    /// The value recorded for `metric` on `host`, if any.
    pub fn value(&self, host: &str, metric: MetricName) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.host == host && s.metric == metric)
            .map(|s| s.value)
    }
}

impl MetricSink for MemorySink {
    fn record(&mut self, sample: MetricSample) -> TimerResult<()> {
        self.samples.push(sample);
        Ok(())
    }
}
