use crate::{Request, TOKEN_HEADER};

/// Read consistency requested from the servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Leader-served reads without an extra quorum round trip
    #[default]
    Default,
    /// Any server may answer, possibly with stale data
    Stale,
    /// The leader verifies its leadership with a quorum before answering
    Consistent,
}

/// Per-request options for reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Datacenter to query instead of the configured default
    pub datacenter: Option<String>,
    /// Namespace to query instead of the configured default
    pub namespace: Option<String>,
    /// ACL token to use instead of the configured default
    pub token: Option<String>,
    /// Read consistency mode
    pub consistency: Consistency,
}

impl QueryOptions {
    /// Query a specific datacenter
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Query a specific namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Use a specific ACL token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a specific consistency mode
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Apply these options to a request
    pub fn apply(&self, request: Request) -> Request {
        let request = apply_common(
            request,
            self.datacenter.as_deref(),
            self.namespace.as_deref(),
            self.token.as_deref(),
        );

        match self.consistency {
            Consistency::Default => request,
            Consistency::Stale => request.with_flag("stale"),
            Consistency::Consistent => request.with_flag("consistent"),
        }
    }
}

/// Per-request options for writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Datacenter to write to instead of the configured default
    pub datacenter: Option<String>,
    /// Namespace to write to instead of the configured default
    pub namespace: Option<String>,
    /// ACL token to use instead of the configured default
    pub token: Option<String>,
}

impl WriteOptions {
    /// Write to a specific datacenter
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Write to a specific namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Use a specific ACL token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Apply these options to a request
    pub fn apply(&self, request: Request) -> Request {
        apply_common(
            request,
            self.datacenter.as_deref(),
            self.namespace.as_deref(),
            self.token.as_deref(),
        )
    }
}

fn apply_common(
    mut request: Request,
    datacenter: Option<&str>,
    namespace: Option<&str>,
    token: Option<&str>,
) -> Request {
    if let Some(datacenter) = datacenter {
        request = request.with_param("dc", datacenter);
    }
    if let Some(namespace) = namespace {
        request = request.with_param("ns", namespace);
    }
    if let Some(token) = token {
        request = request.with_header(TOKEN_HEADER, token);
    }
    request
}
