use consul_api::{
    ApiError, QueryMeta, QueryOptions, Request, Response, Transport, WriteMeta, WriteOptions,
};
use serde::Deserialize;

use crate::{PreparedQueryDefinition, PreparedQueryExecuteResponse};

const QUERY_PATH: &str = "v1/query";

#[derive(Deserialize)]
struct CreatedQuery {
    #[serde(rename = "ID")]
    id: String,
}

/// Manages and executes prepared queries over any [Transport]
#[derive(Debug, Clone)]
pub struct PreparedQueryClient<T>
where
    T: Transport,
{
    transport: T,
    query_options: QueryOptions,
    write_options: WriteOptions,
}

impl<T> PreparedQueryClient<T>
where
    T: Transport,
{
    /// Create a client that performs requests through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            query_options: QueryOptions::default(),
            write_options: WriteOptions::default(),
        }
    }

    /// Apply `options` to every read made by this client
    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = options;
        self
    }

    /// Apply `options` to every write made by this client
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.write_options = options;
        self
    }

    /// The transport requests go through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Store a new query and return the id the server assigned to it
    pub async fn create(
        &self,
        definition: &PreparedQueryDefinition,
    ) -> Result<(String, WriteMeta), ApiError> {
        tracing::debug!(service = %definition.service.service, "prepared query create");

        let request = Request::post(QUERY_PATH).with_json(definition)?;
        let response = self.write(request).await?;
        let created: CreatedQuery = response.decode()?;

        Ok((created.id, WriteMeta::from_response(&response)))
    }

    /// Replace the stored definition carrying `definition.id`
    pub async fn update(&self, definition: &PreparedQueryDefinition) -> Result<WriteMeta, ApiError> {
        require_id(&definition.id)?;
        tracing::debug!(id = %definition.id, "prepared query update");

        let request = Request::put(query_path(&definition.id)).with_json(definition)?;
        let response = self.write(request).await?;
        Ok(WriteMeta::from_response(&response))
    }

    /// Every stored query
    pub async fn list(&self) -> Result<(Vec<PreparedQueryDefinition>, QueryMeta), ApiError> {
        tracing::debug!("prepared query list");

        let response = self.read(Request::get(QUERY_PATH)).await?;
        let meta = QueryMeta::from_response(&response);
        Ok((decode_definitions(&response)?, meta))
    }

    /// Fetch a single query by id; the server answers with a one-element list
    pub async fn get(
        &self,
        id: &str,
    ) -> Result<(Vec<PreparedQueryDefinition>, QueryMeta), ApiError> {
        require_id(id)?;
        tracing::debug!(id, "prepared query get");

        let response = self.read(Request::get(query_path(id))).await?;
        let meta = QueryMeta::from_response(&response);
        Ok((decode_definitions(&response)?, meta))
    }

    /// Remove a stored query
    pub async fn delete(&self, id: &str) -> Result<WriteMeta, ApiError> {
        require_id(id)?;
        tracing::debug!(id, "prepared query delete");

        let response = self.write(Request::delete(query_path(id))).await?;
        Ok(WriteMeta::from_response(&response))
    }

    /// Run a stored query, addressed by id or by name
    pub async fn execute(
        &self,
        id_or_name: &str,
    ) -> Result<(PreparedQueryExecuteResponse, QueryMeta), ApiError> {
        require_id(id_or_name)?;
        tracing::debug!(query = id_or_name, "prepared query execute");

        let response = self
            .read(Request::get(format!("{}/execute", query_path(id_or_name))))
            .await?;
        let meta = QueryMeta::from_response(&response);
        let result: PreparedQueryExecuteResponse = response.decode()?;

        tracing::trace!(
            query = id_or_name,
            nodes = result.nodes.len(),
            datacenter = %result.datacenter,
            "prepared query executed"
        );

        Ok((result, meta))
    }

    async fn read(&self, request: Request) -> Result<Response, ApiError> {
        let request = self.query_options.apply(request);
        self.transport.perform(request).await?.require_ok()
    }

    async fn write(&self, request: Request) -> Result<Response, ApiError> {
        let request = self.write_options.apply(request);
        self.transport.perform(request).await?.require_ok()
    }
}

fn query_path(id: &str) -> String {
    format!("{QUERY_PATH}/{id}")
}

fn decode_definitions(response: &Response) -> Result<Vec<PreparedQueryDefinition>, ApiError> {
    let definitions: Option<Vec<PreparedQueryDefinition>> = response.decode()?;
    Ok(definitions.unwrap_or_default())
}

fn require_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() {
        return Err(ApiError::InvalidArgument(
            "prepared query id must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryDatacenterOptions;
    use consul_api::helpers::{MemoryAgent, MemoryTransport};
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn client(agent: &MemoryAgent) -> PreparedQueryClient<MemoryTransport> {
        PreparedQueryClient::new(MemoryTransport::connect(agent))
    }

    #[tokio::test]
    async fn it_creates_and_fetches_definitions() -> TestResult {
        let agent = MemoryAgent::new();
        let queries = client(&agent);

        let definition = PreparedQueryDefinition::new("redis")
            .with_name("cache")
            .with_tags(["primary"])
            .with_failover(QueryDatacenterOptions {
                nearest_n: 2,
                datacenters: vec!["dc2".into()],
            });

        let (id, _) = queries.create(&definition).await?;
        assert!(!id.is_empty());

        let sent = queries.transport().last_request().await.ok_or("no request")?;
        assert_eq!(sent.path, "v1/query");
        assert!(sent.has_header("content-type"));

        let (fetched, meta) = queries.get(&id).await?;
        assert_eq!(
            fetched,
            vec![PreparedQueryDefinition {
                id: id.clone(),
                ..definition
            }]
        );
        assert_eq!(meta.last_index, 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_lists_updates_and_deletes_definitions() -> TestResult {
        let agent = MemoryAgent::new();
        let queries = client(&agent);

        let (first, _) = queries
            .create(&PreparedQueryDefinition::new("web"))
            .await?;
        queries.create(&PreparedQueryDefinition::new("db")).await?;

        let (all, _) = queries.list().await?;
        assert_eq!(all.len(), 2);

        let mut updated = PreparedQueryDefinition::new("web").only_passing();
        updated.id = first.clone();
        queries.update(&updated).await?;
        let sent = queries.transport().last_request().await.ok_or("no request")?;
        assert_eq!(sent.path, format!("v1/query/{first}"));

        let (fetched, _) = queries.get(&first).await?;
        assert!(fetched[0].service.only_passing);

        queries.delete(&first).await?;
        let (remaining, _) = queries.list().await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].service.service, "db");
        Ok(())
    }

    #[tokio::test]
    async fn it_executes_by_id_and_by_name() -> TestResult {
        let agent = MemoryAgent::new();
        agent
            .register_service_instance("redis", "node-1", "10.0.0.1", 6379)
            .await;
        agent
            .register_service_instance("redis", "node-2", "10.0.0.2", 6379)
            .await;
        let queries = client(&agent);

        let (id, _) = queries
            .create(&PreparedQueryDefinition::new("redis").with_name("cache"))
            .await?;

        let (by_id, _) = queries.execute(&id).await?;
        let (by_name, _) = queries.execute("cache").await?;

        assert_eq!(by_id, by_name);
        assert_eq!(by_id.service, "redis");
        assert_eq!(by_id.datacenter, "dc1");
        let addresses: Vec<&str> = by_id.nodes.iter().map(|entry| entry.address()).collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2"]);
        assert!(by_id.nodes.iter().all(|entry| entry.is_passing()));
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_missing_ids_without_touching_the_transport() -> TestResult {
        let queries = client(&MemoryAgent::new());

        assert!(matches!(
            queries.update(&PreparedQueryDefinition::new("web")).await,
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(matches!(queries.get("").await, Err(ApiError::InvalidArgument(_))));
        assert!(matches!(queries.delete("").await, Err(ApiError::InvalidArgument(_))));
        assert!(matches!(
            queries.execute("").await,
            Err(ApiError::InvalidArgument(_))
        ));

        assert!(queries.transport().requests().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn it_fails_for_unknown_queries() -> TestResult {
        let queries = client(&MemoryAgent::new());

        assert!(matches!(
            queries.execute("missing").await,
            Err(ApiError::RequestFailed { status: 404, .. })
        ));
        assert!(matches!(
            queries.delete("missing").await,
            Err(ApiError::RequestFailed { status: 404, .. })
        ));
        Ok(())
    }
}
