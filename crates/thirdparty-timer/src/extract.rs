//! Distinct third-party host extraction.

use crate::document::ReportDocument;
use crate::report::{self, ATTR_HOST};
use crate::types::{HostSet, TimerResult};

/// Collect the distinct hosts of all third-party agent rows.
pub fn distinct_hosts(doc: &ReportDocument) -> TimerResult<HostSet> {
    let agents = report::third_party_agents().evaluate(doc)?;
    tracing::debug!("Third-party agent rows: {}", agents.len());

    let mut hosts = HostSet::new();
    for agent in agents {
        let Some(raw) = agent.attr(ATTR_HOST) else {
            tracing::debug!("Skipping third-party row without a host: {agent:?}");
            continue;
        };
        let host = normalize_host(raw);
        if host.is_empty() {
            tracing::debug!("Skipping third-party row with empty host {raw:?}");
            continue;
        }
        hosts.insert(host);
    }

    tracing::debug!("Distinct third-party hosts: {}", hosts.len());
    Ok(hosts)
}

/// Strip the `host="..."` rendering some report exports leave in the value.
pub fn normalize_host(raw: &str) -> String {
    raw.replace('"', "").replace("host=", "").trim().to_string()
}
