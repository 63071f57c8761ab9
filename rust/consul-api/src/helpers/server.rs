use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;

use crate::{Method, Request, Response};

use super::MemoryAgent;

/// A running HTTP server that serves a [MemoryAgent].
pub struct TestServer {
    endpoint: String,
    agent: MemoryAgent,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Bind to an ephemeral local port and start serving `agent`
    pub async fn start(agent: MemoryAgent) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let endpoint = format!("http://{}", addr);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let served = agent.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let agent = served.clone();
                            tokio::spawn(async move {
                                let service = hyper::service::service_fn(move |req| {
                                    let agent = agent.clone();
                                    async move { handle_request(req, agent).await }
                                });
                                let _ = http1::Builder::new()
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await;
                            });
                        }
                    }
                }
            }
        });

        tracing::debug!(%endpoint, "test agent listening");

        Ok(Self {
            endpoint,
            agent,
            shutdown_tx,
        })
    }

    /// The `http://host:port` address the server listens on
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The agent being served
    pub fn agent(&self) -> &MemoryAgent {
        &self.agent
    }

    /// Stop accepting connections
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn into_request(method: Method, uri: &hyper::Uri, headers: &hyper::HeaderMap) -> Request {
    let path = uri
        .path()
        .trim_start_matches('/')
        .split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    let params = uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(name, value)| {
                    let value = (!value.is_empty()).then(|| value.into_owned());
                    (name.into_owned(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Request {
        method,
        path,
        params,
        headers,
        body: None,
    }
}

fn into_hyper(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|_| {
            let mut fallback = hyper::Response::new(Full::new(Bytes::from_static(
                b"failed to encode response",
            )));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

async fn handle_request(
    req: hyper::Request<Incoming>,
    agent: MemoryAgent,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let method = match *req.method() {
        hyper::Method::GET => Method::Get,
        hyper::Method::PUT => Method::Put,
        hyper::Method::POST => Method::Post,
        hyper::Method::DELETE => Method::Delete,
        _ => return Ok(into_hyper(Response::new(405, "method not allowed"))),
    };

    let mut request = into_request(method, req.uri(), req.headers());

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(into_hyper(Response::new(
                400,
                format!("Failed to read body: {e}"),
            )));
        }
    };
    if !body.is_empty() {
        request.body = Some(body.to_vec());
    }

    Ok(into_hyper(agent.handle(request).await))
}
