use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored prepared query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedQueryDefinition {
    /// Server-assigned id; empty until the query is created
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Optional name the query can be executed by
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Session that scopes the lifetime of the query
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session: String,

    /// Token captured for executing the query
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// The service lookup performed on execution
    #[serde(default)]
    pub service: ServiceQuery,

    /// DNS answer settings
    #[serde(rename = "DNS", default)]
    pub dns: QueryDnsOptions,
}

impl PreparedQueryDefinition {
    /// Define a query that looks up `service`
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: ServiceQuery {
                service: service.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Name the query so it can be executed by name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only return instances carrying every tag (a `!` prefix excludes)
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Only return instances whose checks are all passing
    pub fn only_passing(mut self) -> Self {
        self.service.only_passing = true;
        self
    }

    /// Fail over to other datacenters when no local instance is healthy
    pub fn with_failover(mut self, failover: QueryDatacenterOptions) -> Self {
        self.service.failover = failover;
        self
    }
}

/// The service lookup at the heart of a prepared query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceQuery {
    /// Service name to look up
    pub service: String,

    /// Datacenter failover policy
    #[serde(default)]
    pub failover: QueryDatacenterOptions,

    /// Filter out instances with warning checks as well as critical ones
    #[serde(default)]
    pub only_passing: bool,

    /// Sort results by round trip time from this node (`_agent` for the
    /// serving agent)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub near: String,

    /// Tag filters
    #[serde(default)]
    pub tags: Vec<String>,

    /// Node metadata filters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_meta: BTreeMap<String, String>,
}

/// Which remote datacenters a query may fail over to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryDatacenterOptions {
    /// Try this many of the nearest datacenters by round trip time
    #[serde(default)]
    pub nearest_n: u32,

    /// Explicit datacenters to try, in order, after the nearest ones
    #[serde(default)]
    pub datacenters: Vec<String>,
}

/// DNS settings for answers produced by a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDnsOptions {
    /// TTL for DNS answers, as a duration string (`"10s"`)
    #[serde(rename = "TTL", default)]
    pub ttl: String,
}

/// The result of executing a prepared query
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedQueryExecuteResponse {
    /// Service that was queried
    pub service: String,

    /// Matching healthy instances
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<ServiceEntry>,

    /// DNS settings of the executed query
    #[serde(rename = "DNS", default)]
    pub dns: QueryDnsOptions,

    /// Datacenter the results came from
    #[serde(default)]
    pub datacenter: String,

    /// Number of remote datacenters tried before getting results
    #[serde(default)]
    pub failovers: u32,
}

/// One service instance with its node and health checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    /// Node the instance runs on
    pub node: Node,
    /// The instance itself
    pub service: AgentService,
    /// Checks covering the node and the instance
    #[serde(default, deserialize_with = "null_as_empty")]
    pub checks: Vec<HealthCheck>,
}

/// A catalog node
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    /// Node id
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Node name
    pub node: String,
    /// Node address
    #[serde(default)]
    pub address: String,
    /// Datacenter the node belongs to
    #[serde(default)]
    pub datacenter: String,
    /// Node metadata
    #[serde(default, deserialize_with = "null_as_empty")]
    pub meta: BTreeMap<String, String>,
}

/// A service instance registered with an agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    /// Instance id, unique per agent
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Service name
    pub service: String,
    /// Instance tags
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    /// Service address; empty means the node address
    #[serde(default)]
    pub address: String,
    /// Service port
    #[serde(default)]
    pub port: u16,
}

impl ServiceEntry {
    /// The address to dial: the service address, falling back to the node's
    pub fn address(&self) -> &str {
        if self.service.address.is_empty() {
            &self.node.address
        } else {
            &self.service.address
        }
    }

    /// Whether every check on this entry is passing
    pub fn is_passing(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.status == HealthCheck::PASSING)
    }
}

/// A health check result
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    /// Node the check runs on
    #[serde(default)]
    pub node: String,
    /// Check id, unique per node
    #[serde(rename = "CheckID", default)]
    pub check_id: String,
    /// Human readable check name
    #[serde(default)]
    pub name: String,
    /// `passing`, `warning` or `critical`
    pub status: String,
    /// Instance the check covers; empty for node checks
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
}

impl HealthCheck {
    /// Status of a passing check
    pub const PASSING: &str = "passing";
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_omits_unset_identity_fields_when_encoding() {
        let definition = PreparedQueryDefinition::new("redis")
            .with_name("cache")
            .with_tags(["primary", "!canary"])
            .only_passing();

        let json = serde_json::to_value(&definition).unwrap();

        assert_eq!(
            json,
            json!({
                "Name": "cache",
                "Service": {
                    "Service": "redis",
                    "Failover": { "NearestN": 0, "Datacenters": [] },
                    "OnlyPassing": true,
                    "Tags": ["primary", "!canary"],
                },
                "DNS": { "TTL": "" },
            })
        );
    }

    #[test]
    fn it_decodes_execute_results_with_null_collections() {
        let response: PreparedQueryExecuteResponse = serde_json::from_value(json!({
            "Service": "redis",
            "Nodes": [{
                "Node": { "Node": "node-1", "Address": "10.0.0.1", "Meta": null },
                "Service": { "ID": "redis-1", "Service": "redis", "Tags": null, "Port": 6379 },
                "Checks": null,
            }],
            "DNS": { "TTL": "10s" },
            "Datacenter": "dc1",
            "Failovers": 1,
        }))
        .unwrap();

        let node = &response.nodes[0];
        assert_eq!(node.address(), "10.0.0.1");
        assert_eq!(node.service.port, 6379);
        assert!(node.service.tags.is_empty());
        assert!(node.is_passing());
        assert_eq!(response.dns.ttl, "10s");
        assert_eq!(response.failovers, 1);
    }
}
