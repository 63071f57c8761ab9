//! reqwest-backed transport

use async_trait::async_trait;
use tracing::debug;
use url::Url;
use web_time::Instant;

use crate::{ApiError, Config, Method, Request, Response, TOKEN_HEADER, TransportError};

use super::Transport;

/// A [Transport] that talks to an agent over HTTP(S).
///
/// Configuration defaults (datacenter, namespace, token) are only applied to
/// requests that do not already set them, so per-request options win.
///
/// # Examples
///
/// ```no_run
/// use consul_api::{Config, HttpTransport, Request, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new(Config::from_env()?)?;
/// let response = transport.perform(Request::get("v1/kv/app/config")).await?;
/// println!("{} bytes", response.body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpTransport {
    config: Config,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let base_url = config.base_url()?;
        let mut client_builder = reqwest::Client::builder();

        if let Some(timeout) = config.timeout_seconds {
            client_builder = client_builder.timeout(std::time::Duration::from_secs(timeout));
        }

        if config.insecure_skip_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// The configuration this transport was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the full URL for a request, including configured defaults
    fn url_for(&self, request: &Request) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(request.path.trim_start_matches('/').split('/'));

        let mut params: Vec<(&str, Option<&str>)> = request
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
            .collect();

        if !request.has_param("dc") {
            if let Some(datacenter) = &self.config.datacenter {
                params.push(("dc", Some(datacenter)));
            }
        }

        if !request.has_param("ns") {
            if let Some(namespace) = &self.config.namespace {
                params.push(("ns", Some(namespace)));
            }
        }

        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                match value {
                    Some(value) => {
                        query.append_pair(name, value);
                    }
                    None => {
                        query.append_key_only(name);
                    }
                }
            }
        }

        Ok(url)
    }

    /// Add authentication and custom headers to a request
    fn prepare_request(
        &self,
        request: &Request,
        mut builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        if !request.has_header(TOKEN_HEADER) {
            if let Some(token) = &self.config.token {
                builder = builder.header(TOKEN_HEADER, token);
            }
        }

        if let Some(auth) = &self.config.http_auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_ref());
        }

        for (name, value) in self.config.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name, value);
        }

        builder
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request)?;
        let builder = self
            .client
            .request(reqwest_method(request.method), url.clone());
        let mut builder = self.prepare_request(&request, builder);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        let elapsed = started.elapsed();

        debug!(
            method = %request.method,
            url = %url,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "agent request completed"
        );

        Ok(Response {
            status,
            headers,
            body,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport(config: Config) -> HttpTransport {
        HttpTransport::new(config).unwrap()
    }

    #[test]
    fn test_url_generation() {
        let transport = transport(Config::new("127.0.0.1:8500"));

        let url = transport
            .url_for(&Request::get("v1/kv/app/config").with_flag("recurse"))
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/kv/app/config?recurse");

        let url = transport
            .url_for(&Request::get("v1/kv/").with_flag("keys"))
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/kv/?keys");
    }

    #[test]
    fn it_percent_encodes_each_path_segment() {
        let transport = transport(Config::new("127.0.0.1:8500"));

        let url = transport
            .url_for(&Request::put("v1/kv/dir with space/a?b#c").with_param("flags", 7))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8500/v1/kv/dir%20with%20space/a%3Fb%23c?flags=7"
        );
    }

    #[test]
    fn it_applies_configured_defaults_unless_overridden() {
        let transport = transport(
            Config::new("127.0.0.1:8500")
                .with_datacenter("dc1")
                .with_namespace("ops"),
        );

        let url = transport.url_for(&Request::get("v1/query")).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/query?dc=dc1&ns=ops");

        let url = transport
            .url_for(&Request::get("v1/query").with_param("dc", "dc2"))
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/query?dc=dc2&ns=ops");
    }

    #[test]
    fn it_rejects_unusable_addresses() {
        assert!(matches!(
            HttpTransport::new(Config::new("")),
            Err(ApiError::Configuration(_))
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod integration {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::helpers::{MemoryAgent, TestServer};
        use testresult::TestResult;

        #[tokio::test]
        async fn it_round_trips_through_a_live_server() -> TestResult {
            let agent = MemoryAgent::new();
            let server = TestServer::start(agent.clone()).await?;
            let transport = HttpTransport::new(Config::new(server.endpoint()))?;

            let response = transport
                .perform(
                    Request::put("v1/kv/service/web/port")
                        .with_param("flags", 9)
                        .with_body("8080"),
                )
                .await?;
            assert_eq!(response.status, 200);
            assert_eq!(response.text(), "true");

            let response = transport
                .perform(Request::get("v1/kv/service").with_flag("recurse"))
                .await?;
            assert_eq!(response.status, 200);
            assert!(response.header("x-consul-index").is_some());

            let listed: Vec<serde_json::Value> = response.decode()?;
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0]["Key"], "service/web/port");
            assert_eq!(listed[0]["Flags"], 9);

            let response = transport.perform(Request::get("v1/kv/missing")).await?;
            assert_eq!(response.status, 404);

            server.stop();
            Ok(())
        }

        #[tokio::test]
        async fn it_reports_connection_failures_as_transport_errors() -> TestResult {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            let address = listener.local_addr()?;
            drop(listener);

            let transport = HttpTransport::new(Config::new(address.to_string()).with_timeout(5))?;
            let result = transport.perform(Request::get("v1/kv/a")).await;

            assert!(matches!(
                result,
                Err(TransportError::Connect(_)) | Err(TransportError::Request(_))
            ));
            Ok(())
        }
    }
}
