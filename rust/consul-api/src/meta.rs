use std::time::Duration;

use crate::Response;

/// Header carrying the index the result reflects
pub const INDEX_HEADER: &str = "X-Consul-Index";
/// Header reporting whether the answering server knows the leader
pub const KNOWN_LEADER_HEADER: &str = "X-Consul-KnownLeader";
/// Header reporting milliseconds since the server last heard from the leader
pub const LAST_CONTACT_HEADER: &str = "X-Consul-LastContact";

/// Out-of-band information attached to every read result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Raft index the result reflects
    pub last_index: u64,

    /// Time since the answering server last contacted the leader; non-zero
    /// values indicate a possibly stale replica
    pub last_contact: Duration,

    /// Whether the answering server knew of a leader
    pub known_leader: bool,

    /// Time spent performing the request
    pub request_time: Duration,
}

impl QueryMeta {
    /// Extract query metadata from response headers. Missing or malformed
    /// headers leave the field at its default.
    pub fn from_response(response: &Response) -> Self {
        let last_index = response
            .header(INDEX_HEADER)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();

        let last_contact = response
            .header(LAST_CONTACT_HEADER)
            .and_then(|value| value.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or_default();

        let known_leader = response
            .header(KNOWN_LEADER_HEADER)
            .map(|value| value == "true")
            .unwrap_or_default();

        Self {
            last_index,
            last_contact,
            known_leader,
            request_time: response.elapsed,
        }
    }
}

/// Out-of-band information attached to every write result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMeta {
    /// Time spent performing the request
    pub request_time: Duration,
}

impl WriteMeta {
    /// Extract write metadata from a response
    pub fn from_response(response: &Response) -> Self {
        Self {
            request_time: response.elapsed,
        }
    }
}
