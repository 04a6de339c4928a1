//! One execution pass: parse, extract hosts, aggregate, publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate_host;
use crate::document::ReportDocument;
use crate::extract::distinct_hosts;
use crate::publish::{MetricSample, MetricSink};
use crate::types::{MeasureKey, TimerResult};

/// Checked between hosts; once it reports stopped, the remaining hosts are
/// abandoned.
pub trait StopSignal {
    fn is_stopped(&self) -> bool;
}

/// Never stops a pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn is_stopped(&self) -> bool {
        false
    }
}

impl StopSignal for AtomicBool {
    fn is_stopped(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<S: StopSignal + ?Sized> StopSignal for Arc<S> {
    fn is_stopped(&self) -> bool {
        (**self).is_stopped()
    }
}

/// Stops once the wall clock passes the given instant.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(pub Instant);

impl StopSignal for Deadline {
    fn is_stopped(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Distinct hosts found in the report.
    pub hosts: usize,
    /// Hosts aggregated before the pass finished or was stopped.
    pub hosts_processed: usize,
    pub samples_emitted: usize,
    /// Samples the sink refused.
    pub publish_failures: usize,
    /// Node values that were present but not numeric.
    pub skipped_values: usize,
    pub stopped_early: bool,
}

/// Run a full pass over raw report bytes.
///
/// A parse failure aborts before anything is emitted.
pub fn run_pass(
    bytes: &[u8],
    measure: &MeasureKey,
    sink: &mut dyn MetricSink,
    stop: &dyn StopSignal,
) -> TimerResult<PassReport> {
    let doc = ReportDocument::parse(bytes)?;
    publish_document(&doc, measure, sink, stop)
}

/// Run a pass over an already parsed report.
pub fn publish_document(
    doc: &ReportDocument,
    measure: &MeasureKey,
    sink: &mut dyn MetricSink,
    stop: &dyn StopSignal,
) -> TimerResult<PassReport> {
    let hosts = distinct_hosts(doc)?;
    let mut report = PassReport {
        hosts: hosts.len(),
        ..PassReport::default()
    };
    tracing::info!("Found {} third-party hosts", hosts.len());

    for host in &hosts {
        if stop.is_stopped() {
            report.stopped_early = true;
            tracing::warn!(
                "Pass stopped after {} of {} hosts",
                report.hosts_processed,
                report.hosts
            );
            break;
        }

        let aggregate = aggregate_host(doc, host, measure)?;
        report.hosts_processed += 1;
        report.skipped_values += aggregate.skipped;

        for sample in MetricSample::from_aggregate(&aggregate) {
            if !sink.wants(sample.metric) {
                continue;
            }
            let metric = sample.metric;
            match sink.record(sample) {
                Ok(()) => report.samples_emitted += 1,
                Err(e) => {
                    report.publish_failures += 1;
                    tracing::warn!("Failed to publish {metric} for {host}: {e}");
                }
            }
        }
    }

    tracing::debug!(
        "Pass finished: {} hosts processed, {} samples, {} skipped values",
        report.hosts_processed,
        report.samples_emitted,
        report.skipped_values
    );
    Ok(report)
}
