//! Layout of the TransactionFlow report and the queries run against it.

use crate::query::{Needle, Query};

/// Tier label the report gives to third-party hosts.
pub const THIRD_PARTY_LABEL: &str = "Third Party Content";

/// Path to the tier/host rows.
pub const AGENT_PATH: [&str; 5] = ["dashboardreport", "data", "admdashlet", "adm", "agent"];

/// Path to the caller -> callee edges.
pub const LINK_PATH: [&str; 5] = ["dashboardreport", "data", "admdashlet", "adm_links", "agent"];

pub const ATTR_NAME: &str = "name";
pub const ATTR_HOST: &str = "host";
pub const ATTR_TO: &str = "to";
pub const ATTR_REMOTING_COUNT: &str = "remoting_count";

/// Agent rows whose tier name mentions third-party content.
pub fn third_party_agents() -> Query {
    Query::path(&AGENT_PATH).contains(ATTR_NAME, Needle::Literal(THIRD_PARTY_LABEL.into()))
}

/// Agent rows whose `host` contains `host`.
///
/// Not restricted to the third-party tier: any row naming the host counts.
pub fn response_time_candidates(host: &str) -> Query {
    Query::path(&AGENT_PATH).contains(ATTR_HOST, Needle::Literal(host.into()))
}

/// Link rows whose `to` contains `Third Party Content@<host>`.
pub fn count_candidates(host: &str) -> Query {
    Query::path(&LINK_PATH).contains(ATTR_TO, Needle::Literal(link_target(host)))
}

/// The `to` value a link into `host` carries.
pub fn link_target(host: &str) -> String {
    format!("{THIRD_PARTY_LABEL}@{host}")
}
