use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::Engine;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{INDEX_HEADER, KNOWN_LEADER_HEADER, LAST_CONTACT_HEADER, Method, Request, Response};

const KV_PATH: &str = "v1/kv/";
const QUERY_PATH: &str = "v1/query";

#[derive(Clone, Debug, Default)]
struct StoredEntry {
    value: Vec<u8>,
    flags: u64,
    session: Option<String>,
    create_index: u64,
    modify_index: u64,
    lock_index: u64,
}

#[derive(Debug)]
struct AgentState {
    datacenter: String,
    index: u64,
    kv: BTreeMap<String, StoredEntry>,
    queries: BTreeMap<String, Value>,
    services: HashMap<String, Vec<Value>>,
}

/// In-memory emulation of an agent's KV and prepared-query endpoints.
///
/// Every write bumps a single index, mirroring the Raft index a real cluster
/// assigns. Sessions are not tracked separately: any non-empty session id may
/// acquire a free key.
///
/// ```
/// use consul_api::helpers::MemoryAgent;
/// use consul_api::Request;
///
/// # async fn example() {
/// let agent = MemoryAgent::new();
/// let response = agent.handle(Request::put("v1/kv/a").with_body("1")).await;
/// assert_eq!(response.text(), "true");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MemoryAgent {
    state: Arc<RwLock<AgentState>>,
}

impl Default for MemoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAgent {
    /// Create an empty agent serving datacenter `dc1`
    pub fn new() -> Self {
        Self::with_datacenter("dc1")
    }

    /// Create an empty agent serving the given datacenter
    pub fn with_datacenter(datacenter: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(AgentState {
                datacenter: datacenter.into(),
                index: 0,
                kv: BTreeMap::new(),
                queries: BTreeMap::new(),
                services: HashMap::new(),
            })),
        }
    }

    /// The current write index
    pub async fn index(&self) -> u64 {
        self.state.read().await.index
    }

    /// Register a healthy service instance that prepared queries can resolve to
    pub async fn register_service_instance(
        &self,
        service: &str,
        node: &str,
        address: &str,
        port: u16,
    ) {
        let mut state = self.state.write().await;
        let datacenter = state.datacenter.clone();

        state
            .services
            .entry(service.to_string())
            .or_default()
            .push(json!({
                "Node": {
                    "ID": format!("{node}-id"),
                    "Node": node,
                    "Address": address,
                    "Datacenter": datacenter,
                },
                "Service": {
                    "ID": format!("{service}-{node}"),
                    "Service": service,
                    "Tags": [],
                    "Address": address,
                    "Port": port,
                },
                "Checks": [{
                    "Node": node,
                    "CheckID": "serfHealth",
                    "Name": "Serf Health Status",
                    "Status": "passing",
                    "ServiceID": "",
                }],
            }));
    }

    /// Answer a request the way an agent would
    pub async fn handle(&self, request: Request) -> Response {
        let mut state = self.state.write().await;

        if let Some(datacenter) = request.param("dc") {
            if datacenter != state.datacenter {
                return Response::new(500, "No path to datacenter");
            }
        }

        let response = if let Some(key) = request.path.strip_prefix(KV_PATH) {
            let key = key.to_string();
            match request.method {
                Method::Get => state.kv_read(&key, &request),
                Method::Put => state.kv_write(&key, &request),
                Method::Delete => state.kv_delete(&key, &request),
                Method::Post => Response::new(405, "method not allowed"),
            }
        } else if request.path == QUERY_PATH {
            match request.method {
                Method::Get => state.query_list(),
                Method::Post => state.query_create(&request),
                _ => Response::new(405, "method not allowed"),
            }
        } else if let Some(rest) = request.path.strip_prefix("v1/query/") {
            match (request.method, rest.strip_suffix("/execute")) {
                (Method::Get, Some(target)) => state.query_execute(target),
                (Method::Get, None) => state.query_get(rest),
                (Method::Put, None) => state.query_update(rest, &request),
                (Method::Delete, None) => state.query_delete(rest),
                _ => Response::new(405, "method not allowed"),
            }
        } else {
            Response::new(404, format!("unknown endpoint {}", request.path))
        };

        response
            .with_header(INDEX_HEADER, state.index.to_string())
            .with_header(KNOWN_LEADER_HEADER, "true")
            .with_header(LAST_CONTACT_HEADER, "0")
    }
}

fn entry_json(key: &str, entry: &StoredEntry) -> Value {
    let value = if entry.value.is_empty() {
        Value::Null
    } else {
        Value::String(base64::engine::general_purpose::STANDARD.encode(&entry.value))
    };

    let mut object = json!({
        "Key": key,
        "Value": value,
        "Flags": entry.flags,
        "CreateIndex": entry.create_index,
        "ModifyIndex": entry.modify_index,
        "LockIndex": entry.lock_index,
    });

    if let Some(session) = &entry.session {
        object["Session"] = Value::String(session.clone());
    }

    object
}

fn json_response(value: &Value) -> Response {
    Response::new(200, value.to_string()).with_header("Content-Type", "application/json")
}

fn parse_index(request: &Request, name: &str) -> Result<Option<u64>, Response> {
    match request.param(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Response::new(400, format!("Invalid {name}: {value:?}"))),
    }
}

impl AgentState {
    fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a StoredEntry)> + 'a {
        self.kv
            .range(prefix.to_string()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }

    fn kv_read(&self, key: &str, request: &Request) -> Response {
        if request.has_param("keys") {
            let keys: Vec<&String> = self.with_prefix(key).map(|(key, _)| key).collect();
            if keys.is_empty() {
                return Response::new(404, "");
            }
            return json_response(&json!(keys));
        }

        if request.has_param("recurse") {
            let entries: Vec<Value> = self
                .with_prefix(key)
                .map(|(key, entry)| entry_json(key, entry))
                .collect();
            if entries.is_empty() {
                return Response::new(404, "");
            }
            return json_response(&Value::Array(entries));
        }

        match self.kv.get(key) {
            Some(entry) => json_response(&json!([entry_json(key, entry)])),
            None => Response::new(404, ""),
        }
    }

    fn kv_write(&mut self, key: &str, request: &Request) -> Response {
        if key.is_empty() {
            return Response::new(400, "Missing key name");
        }

        let (flags, cas) = match (parse_index(request, "flags"), parse_index(request, "cas")) {
            (Ok(flags), Ok(cas)) => (flags.unwrap_or(0), cas),
            (Err(response), _) | (_, Err(response)) => return response,
        };

        let current = self.kv.get(key).cloned();

        if let Some(cas) = cas {
            let applies = match &current {
                Some(entry) => entry.modify_index == cas,
                None => cas == 0,
            };
            if !applies {
                return Response::new(200, "false");
            }
        }

        let mut session = current.as_ref().and_then(|entry| entry.session.clone());
        let mut lock_index = current.as_ref().map(|entry| entry.lock_index).unwrap_or(0);

        if let Some(acquire) = request.param("acquire") {
            if acquire.is_empty() {
                return Response::new(400, "Missing session");
            }
            if matches!(session.as_deref(), Some(holder) if holder != acquire) {
                return Response::new(200, "false");
            }
            if session.is_none() {
                session = Some(acquire.to_string());
                lock_index += 1;
            }
        }

        if let Some(release) = request.param("release") {
            if session.as_deref() != Some(release) {
                return Response::new(200, "false");
            }
            session = None;
        }

        self.index += 1;
        let entry = StoredEntry {
            value: request.body.clone().unwrap_or_default(),
            flags,
            session,
            create_index: current
                .as_ref()
                .map(|entry| entry.create_index)
                .unwrap_or(self.index),
            modify_index: self.index,
            lock_index,
        };
        self.kv.insert(key.to_string(), entry);

        Response::new(200, "true")
    }

    fn kv_delete(&mut self, key: &str, request: &Request) -> Response {
        if request.has_param("recurse") {
            let doomed: Vec<String> = self.with_prefix(key).map(|(key, _)| key.clone()).collect();
            for key in doomed {
                self.kv.remove(&key);
            }
        } else {
            self.kv.remove(key);
        }

        self.index += 1;
        Response::new(200, "true")
    }

    fn query_list(&self) -> Response {
        json_response(&Value::Array(self.queries.values().cloned().collect()))
    }

    fn query_create(&mut self, request: &Request) -> Response {
        let mut definition = match request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice::<Value>(body).ok())
        {
            Some(definition @ Value::Object(_)) => definition,
            _ => return Response::new(400, "Request decode failed"),
        };

        let id = ulid::Ulid::new().to_string().to_lowercase();
        definition["ID"] = Value::String(id.clone());

        self.index += 1;
        self.queries.insert(id.clone(), definition);

        json_response(&json!({ "ID": id }))
    }

    fn query_get(&self, id: &str) -> Response {
        match self.queries.get(id) {
            Some(definition) => json_response(&json!([definition])),
            None => Response::new(404, "Query not found"),
        }
    }

    fn query_update(&mut self, id: &str, request: &Request) -> Response {
        if !self.queries.contains_key(id) {
            return Response::new(404, "Query not found");
        }

        let mut definition = match request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice::<Value>(body).ok())
        {
            Some(definition @ Value::Object(_)) => definition,
            _ => return Response::new(400, "Request decode failed"),
        };

        definition["ID"] = Value::String(id.to_string());
        self.index += 1;
        self.queries.insert(id.to_string(), definition);

        Response::new(200, "")
    }

    fn query_delete(&mut self, id: &str) -> Response {
        if self.queries.remove(id).is_none() {
            return Response::new(404, "Query not found");
        }

        self.index += 1;
        Response::new(200, "")
    }

    fn query_execute(&self, target: &str) -> Response {
        let definition = self.queries.get(target).or_else(|| {
            self.queries
                .values()
                .find(|definition| definition["Name"].as_str() == Some(target))
        });

        let Some(definition) = definition else {
            return Response::new(404, "Query not found");
        };

        let service = definition["Service"]["Service"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let nodes = self.services.get(&service).cloned().unwrap_or_default();
        let dns = match &definition["DNS"] {
            Value::Null => json!({ "TTL": "" }),
            dns => dns.clone(),
        };

        json_response(&json!({
            "Service": service,
            "Nodes": nodes,
            "DNS": dns,
            "Datacenter": self.datacenter,
            "Failovers": 0,
        }))
    }
}
