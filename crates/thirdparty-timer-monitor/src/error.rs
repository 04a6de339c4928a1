//! Error types for the monitor.

/// All errors that can occur while configuring or running the monitor.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Report request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Execution timed out after {0} s")]
    Timeout(u64),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error(transparent)]
    Timer(#[from] thirdparty_timer::TimerError),
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MonitorError::Fetch(format!("request timed out: {e}"))
        } else {
            MonitorError::Fetch(e.to_string())
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
