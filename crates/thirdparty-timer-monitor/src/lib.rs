//! Third Party Timer monitor: fetches the transaction-flow report on a
//! schedule and publishes per-host third-party timings.

pub mod config;
pub mod error;
pub mod fetch;
pub mod runner;
pub mod sink;

pub use config::{resolve_config_path, MonitorConfig};
pub use error::{MonitorError, MonitorResult};
pub use fetch::ReportClient;
pub use runner::{Monitor, SharedSink, Shutdown};
pub use sink::{JsonLinesSink, SubscribedSink, TracingSink};
