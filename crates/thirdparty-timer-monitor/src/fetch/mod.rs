//! Report retrieval over HTTP(S) with Basic authentication.
//!
//! One GET per pass. No retries: a failed fetch fails the pass and the
//! next scheduled pass tries again.

use base64::Engine;
use url::Url;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};

/// Longest error body kept in a [`MonitorError::Status`].
const MAX_ERROR_BODY: usize = 256;

/// HTTP client bound to one report URL and one set of credentials.
#[derive(Clone)]
pub struct ReportClient {
    client: reqwest::Client,
    url: Url,
    authorization: String,
}

impl ReportClient {
    pub fn new(config: &MonitorConfig) -> MonitorResult<Self> {
        let url = config.report_url()?;

        if config.accept_invalid_certs {
            tracing::warn!("Certificate validation is disabled for {}", url.host_str().unwrap_or(""));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.execution_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("thirdparty-timer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            authorization: basic_auth(&config.username, &config.password),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Download the report body.
    pub async fn fetch_report(&self) -> MonitorResult<Vec<u8>> {
        tracing::debug!("Fetching report from {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::ACCEPT, "application/xml, text/xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(MonitorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// `Authorization` header value for HTTP Basic authentication.
pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}
