use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Request, Response, Transport, TransportError};

use super::MemoryAgent;

/// A [Transport] that answers requests from a [MemoryAgent] in-process and
/// records every request it sees.
///
/// Clones share both the agent and the request log.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    agent: MemoryAgent,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MemoryTransport {
    /// Create a transport backed by a fresh agent
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport backed by an existing agent
    pub fn connect(agent: &MemoryAgent) -> Self {
        Self {
            agent: agent.clone(),
            requests: Arc::default(),
        }
    }

    /// The agent answering requests
    pub fn agent(&self) -> &MemoryAgent {
        &self.agent
    }

    /// Every request performed so far, oldest first
    pub async fn requests(&self) -> Vec<Request> {
        self.requests.lock().await.clone()
    }

    /// The most recent request, if any
    pub async fn last_request(&self) -> Option<Request> {
        self.requests.lock().await.last().cloned()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn perform(&self, request: Request) -> Result<Response, TransportError> {
        self.requests.lock().await.push(request.clone());
        Ok(self.agent.handle(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_shares_the_agent_between_connections() {
        let agent = MemoryAgent::new();
        let writer = MemoryTransport::connect(&agent);
        let reader = MemoryTransport::connect(&agent);

        writer
            .perform(Request::put("v1/kv/shared").with_body("x"))
            .await
            .unwrap();
        let response = reader.perform(Request::get("v1/kv/shared")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(writer.requests().await.len(), 1);
        assert_eq!(
            reader.last_request().await.map(|request| request.path),
            Some("v1/kv/shared".to_string())
        );
    }
}
