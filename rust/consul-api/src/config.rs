use url::Url;

use crate::ApiError;

/// Environment variable holding the agent address, optionally with a scheme
pub const HTTP_ADDR_ENV: &str = "CONSUL_HTTP_ADDR";
/// Environment variable holding the ACL token
pub const HTTP_TOKEN_ENV: &str = "CONSUL_HTTP_TOKEN";
/// Environment variable holding `username[:password]` for HTTP basic auth
pub const HTTP_AUTH_ENV: &str = "CONSUL_HTTP_AUTH";
/// Environment variable toggling `https`
pub const HTTP_SSL_ENV: &str = "CONSUL_HTTP_SSL";
/// Environment variable toggling TLS certificate verification
pub const HTTP_SSL_VERIFY_ENV: &str = "CONSUL_HTTP_SSL_VERIFY";
/// Environment variable holding the default namespace
pub const NAMESPACE_ENV: &str = "CONSUL_NAMESPACE";

/// Credentials for HTTP basic authentication
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpBasicAuth {
    /// User name
    pub username: String,
    /// Optional password
    pub password: Option<String>,
}

impl HttpBasicAuth {
    /// Parse `username[:password]`
    pub fn parse(value: &str) -> Self {
        match value.split_once(':') {
            Some((username, password)) => Self {
                username: username.to_string(),
                password: Some(password.to_string()),
            },
            None => Self {
                username: value.to_string(),
                password: None,
            },
        }
    }
}

/// Configuration for reaching an agent over HTTP
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Host and port of the agent (e.g., "127.0.0.1:8500")
    pub address: String,

    /// URI scheme, "http" or "https"
    pub scheme: String,

    /// Datacenter applied to requests that do not name one
    pub datacenter: Option<String>,

    /// Namespace applied to requests that do not name one
    pub namespace: Option<String>,

    /// ACL token applied to requests that do not carry one
    pub token: Option<String>,

    /// Optional HTTP basic auth credentials
    pub http_auth: Option<HttpBasicAuth>,

    /// Optional timeout for requests in seconds (default: 30)
    pub timeout_seconds: Option<u64>,

    /// Skip TLS certificate verification
    pub insecure_skip_verify: bool,

    /// Optional custom headers to send with each request
    pub headers: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            scheme: "http".to_string(),
            datacenter: None,
            namespace: None,
            token: None,
            http_auth: None,
            timeout_seconds: Some(30),
            insecure_skip_verify: false,
            headers: Vec::new(),
        }
    }
}

impl Config {
    /// Create a configuration for the agent at `address`. A leading
    /// `http://` or `https://` sets the scheme.
    pub fn new(address: impl Into<String>) -> Self {
        Self::default().with_address(address)
    }

    /// Build a configuration from the process environment, starting from
    /// the defaults.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup. Unset and
    /// empty variables leave the default in place.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut config = Self::default();

        if let Some(address) = get(HTTP_ADDR_ENV) {
            config = config.with_address(address);
        }

        if let Some(token) = get(HTTP_TOKEN_ENV) {
            config.token = Some(token);
        }

        if let Some(auth) = get(HTTP_AUTH_ENV) {
            config.http_auth = Some(HttpBasicAuth::parse(&auth));
        }

        if let Some(ssl) = get(HTTP_SSL_ENV) {
            if parse_bool(HTTP_SSL_ENV, &ssl)? {
                config.scheme = "https".to_string();
            }
        }

        if let Some(verify) = get(HTTP_SSL_VERIFY_ENV) {
            config.insecure_skip_verify = !parse_bool(HTTP_SSL_VERIFY_ENV, &verify)?;
        }

        if let Some(namespace) = get(NAMESPACE_ENV) {
            config.namespace = Some(namespace);
        }

        Ok(config)
    }

    /// Set the agent address, honoring an explicit scheme prefix
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();

        if let Some(rest) = address.strip_prefix("https://") {
            self.scheme = "https".to_string();
            self.address = rest.to_string();
        } else if let Some(rest) = address.strip_prefix("http://") {
            self.scheme = "http".to_string();
            self.address = rest.to_string();
        } else {
            self.address = address;
        }

        self
    }

    /// Set the URI scheme
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the default datacenter
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Set the default namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the default ACL token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set HTTP basic auth credentials
    pub fn with_http_auth(mut self, auth: HttpBasicAuth) -> Self {
        self.http_auth = Some(auth);
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// The base URL every request path is resolved against
    pub fn base_url(&self) -> Result<Url, ApiError> {
        let address = self.address.trim_end_matches('/');

        if address.is_empty() {
            return Err(ApiError::Configuration("agent address is empty".into()));
        }

        let url = Url::parse(&format!("{}://{}/", self.scheme, address))
            .map_err(|e| ApiError::Configuration(format!("invalid agent address: {e}")))?;

        if url.cannot_be_a_base() {
            return Err(ApiError::Configuration(format!(
                "agent address {address} cannot be used as a base URL"
            )));
        }

        Ok(url)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(ApiError::Configuration(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
