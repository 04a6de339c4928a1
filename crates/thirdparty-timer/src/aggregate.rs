//! Per-host reduction of response time and call count.

use crate::document::ReportDocument;
use crate::report::{self, ATTR_REMOTING_COUNT};
use crate::types::{HostAggregate, MeasureKey, TimerResult};

/// Compute the aggregate for one host.
///
/// Response time is the mean of the `measure` attribute over agent rows
/// naming the host; count is the sum of `remoting_count` over links into
/// the host. Each side is `None` when nothing well-formed contributed.
/// A non-numeric value only drops that node.
pub fn aggregate_host(
    doc: &ReportDocument,
    host: &str,
    measure: &MeasureKey,
) -> TimerResult<HostAggregate> {
    let mut aggregate = HostAggregate::empty(host);

    let time_nodes = report::response_time_candidates(host).evaluate(doc)?;
    let mut times = Vec::with_capacity(time_nodes.len());
    for node in &time_nodes {
        let Some(raw) = node.attr(measure.as_str()) else {
            continue;
        };
        match parse_response_time(raw) {
            Some(value) => times.push(value),
            None => {
                aggregate.skipped += 1;
                tracing::debug!(host, attribute = %measure, value = raw, "skipping malformed response time");
            }
        }
    }

    let link_nodes = report::count_candidates(host).evaluate(doc)?;
    let mut counts = Vec::with_capacity(link_nodes.len());
    for node in &link_nodes {
        let Some(raw) = node.attr(ATTR_REMOTING_COUNT) else {
            continue;
        };
        match parse_count(raw) {
            Some(value) => counts.push(value),
            None => {
                aggregate.skipped += 1;
                tracing::debug!(host, value = raw, "skipping malformed remoting_count");
            }
        }
    }

    tracing::trace!(
        "{host}: {} agent rows, {} response times, {} links, {} counts",
        time_nodes.len(),
        times.len(),
        link_nodes.len(),
        counts.len()
    );

    aggregate.response_nodes = times.len();
    aggregate.count_nodes = counts.len();
    aggregate.response_time = mean(&times);
    aggregate.count = sum(&counts);
    Ok(aggregate)
}

fn parse_response_time(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_count(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    // Running mean; summing first overflows to infinity for large inputs.
    let mut mean = 0.0;
    for (n, value) in values.iter().enumerate() {
        mean += (value - mean) / (n + 1) as f64;
    }
    Some(mean)
}

fn sum(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().fold(0i64, |acc, v| acc.saturating_add(*v)))
}
