//! Third Party Timer: per-host response time and call count from TransactionFlow reports.

pub mod aggregate;
pub mod document;
pub mod extract;
pub mod pipeline;
pub mod publish;
pub mod query;
pub mod report;
pub mod types;

pub use aggregate::aggregate_host;
pub use document::{ElementRef, ReportDocument};
pub use extract::{distinct_hosts, normalize_host};
pub use pipeline::{publish_document, run_pass, Deadline, NeverStop, PassReport, StopSignal};
pub use publish::{MemorySink, MetricName, MetricSample, MetricSink, HOST_DIMENSION, METRIC_GROUP};
pub use query::{Bindings, Needle, Predicate, Query};
pub use types::*;
