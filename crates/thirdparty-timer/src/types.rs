//! Core data types for host aggregation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The distinct third-party hosts referenced by one report.
///
/// Ordered so that a pass over the same report always visits hosts in the
/// same sequence.
pub type HostSet = BTreeSet<String>;

/// Name of the agent attribute that carries the configured response-time
/// statistic, e.g. `response_avg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasureKey(String);

impl MeasureKey {
    /// Derive the attribute name from an aggregation mode (`avg` -> `response_avg`).
    pub fn from_aggregation(mode: &str) -> Self {
        Self(format!("response_{}", mode.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MeasureKey {
    fn default() -> Self {
        Self::from_aggregation("avg")
    }
}

impl fmt::Display for MeasureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregated measurements for one host.
///
/// `None` means no node contributed a well-formed value, which suppresses
/// emission of that metric. It is never reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAggregate {
    pub host: String,
    /// Arithmetic mean of the contributing response-time values.
    pub response_time: Option<f64>,
    /// Sum of the contributing `remoting_count` values.
    pub count: Option<i64>,
    /// Agent nodes that contributed a response time.
    pub response_nodes: usize,
    /// Link nodes that contributed a count.
    pub count_nodes: usize,
    /// Nodes whose value was present but not numeric.
    pub skipped: usize,
}

impl HostAggregate {
    pub fn empty(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            response_time: None,
            count: None,
            response_nodes: 0,
            count_nodes: 0,
            skipped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.response_time.is_none() && self.count.is_none()
    }
}

/// Errors that can occur while processing a report.
#[derive(thiserror::Error, Debug)]
pub enum TimerError {
    #[error("Report parse error: {0}")]
    Parse(String),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Unbound query variable: ${0}")]
    UnboundVariable(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type TimerResult<T> = Result<T, TimerError>;
