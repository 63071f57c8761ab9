use consul_api::{
    ApiError, QueryMeta, QueryOptions, Request, Response, Transport, WriteMeta, WriteOptions,
};
use indexmap::IndexMap;

use crate::{KeyValueEntry, TreeNode, build_tree};

const KV_PATH: &str = "v1/kv/";

/// Typed access to the KV store over any [Transport].
///
/// Every operation is a single request. Reads carry the client's
/// [QueryOptions] and writes its [WriteOptions]; both default to the
/// transport's configured datacenter, namespace and token.
#[derive(Debug, Clone)]
pub struct KvClient<T>
where
    T: Transport,
{
    transport: T,
    query_options: QueryOptions,
    write_options: WriteOptions,
}

impl<T> KvClient<T>
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

    /// Fetch a single entry.
    ///
    /// A missing key is not an error: it yields `None`.
    pub async fn get(&self, key: &str) -> Result<(Option<KeyValueEntry>, QueryMeta), ApiError> {
        require_key(key)?;
        tracing::debug!(key, "kv get");

        let response = self.read(Request::get(entry_path(key))).await?;
        let meta = QueryMeta::from_response(&response);

        if response.status == 404 {
            return Ok((None, meta));
        }

        let entries: Vec<KeyValueEntry> = response.require_ok()?.decode()?;
        match entries.into_iter().next() {
            Some(entry) => Ok((Some(entry), meta)),
            None => Err(ApiError::Decode(format!(
                "empty entry list returned for key {key}"
            ))),
        }
    }

    /// Fetch every entry whose key starts with `prefix`, keyed by entry key
    /// in listing order
    pub async fn list(
        &self,
        prefix: &str,
    ) -> Result<(IndexMap<String, KeyValueEntry>, QueryMeta), ApiError> {
        require_prefix(prefix)?;
        tracing::debug!(prefix, "kv list");

        let response = self
            .read(Request::get(entry_path(prefix)).with_flag("recurse"))
            .await?
            .require_ok()?;
        let meta = QueryMeta::from_response(&response);

        let entries: Vec<KeyValueEntry> = response.decode()?;
        tracing::trace!(prefix, count = entries.len(), "kv list decoded");

        let listing = entries
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();

        Ok((listing, meta))
    }

    /// List key names only, optionally restricted to a prefix
    pub async fn keys(&self, prefix: Option<&str>) -> Result<(Vec<String>, QueryMeta), ApiError> {
        let prefix = prefix.unwrap_or_default();
        require_plain_segments(prefix)?;
        tracing::debug!(prefix, "kv keys");

        let response = self
            .read(Request::get(entry_path(prefix)).with_flag("keys"))
            .await?
            .require_ok()?;
        let meta = QueryMeta::from_response(&response);

        Ok((response.decode()?, meta))
    }

    /// Write `entry.value` (and non-zero `entry.flags`) at `entry.key`
    pub async fn put(&self, entry: &KeyValueEntry) -> Result<WriteMeta, ApiError> {
        require_key(&entry.key)?;
        tracing::debug!(key = %entry.key, flags = entry.flags, "kv put");

        self.write(entry_request(entry)).await
    }

    /// Remove a single key
    pub async fn delete(&self, key: &str) -> Result<WriteMeta, ApiError> {
        require_key(key)?;
        tracing::debug!(key, "kv delete");

        self.write(Request::delete(entry_path(key))).await
    }

    /// Write `entry` only if the stored modify index still equals
    /// `entry.modify_index` (`0` writes only if the key is absent).
    ///
    /// The server acknowledges a check-and-set with HTTP 200 whether or not
    /// the write applied, and this method does not tell the two apart: a
    /// stale index returns `Ok` and leaves the stored value untouched.
    /// Re-read the key to learn whether the write won.
    pub async fn cas(&self, entry: &KeyValueEntry) -> Result<WriteMeta, ApiError> {
        require_key(&entry.key)?;
        tracing::debug!(key = %entry.key, modify_index = entry.modify_index, "kv cas");

        self.write(entry_request(entry).with_param("cas", entry.modify_index))
            .await
    }

    /// Write `entry` while acquiring its lock for `entry.session`
    pub async fn acquire(&self, entry: &KeyValueEntry) -> Result<WriteMeta, ApiError> {
        require_key(&entry.key)?;
        let session = require_session(entry)?;
        tracing::debug!(key = %entry.key, session, "kv acquire");

        self.write(entry_request(entry).with_param("acquire", session))
            .await
    }

    /// Write `entry` while releasing the lock held by `entry.session`
    pub async fn release(&self, entry: &KeyValueEntry) -> Result<WriteMeta, ApiError> {
        require_key(&entry.key)?;
        let session = require_session(entry)?;
        tracing::debug!(key = %entry.key, session, "kv release");

        self.write(entry_request(entry).with_param("release", session))
            .await
    }

    /// List `prefix` and rebuild the directory tree it describes
    pub async fn tree(&self, prefix: &str) -> Result<(TreeNode, QueryMeta), ApiError> {
        let (listing, meta) = self.list(prefix).await?;
        Ok((build_tree(listing), meta))
    }

    async fn read(&self, request: Request) -> Result<Response, ApiError> {
        let request = self.query_options.apply(request);
        Ok(self.transport.perform(request).await?)
    }

    async fn write(&self, request: Request) -> Result<WriteMeta, ApiError> {
        let request = self.write_options.apply(request);
        let response = self.transport.perform(request).await?.require_ok()?;
        Ok(WriteMeta::from_response(&response))
    }
}

fn entry_path(key: &str) -> String {
    format!("{KV_PATH}{key}")
}

fn entry_request(entry: &KeyValueEntry) -> Request {
    let request = Request::put(entry_path(&entry.key)).with_body(entry.value.clone());
    if entry.flags != 0 {
        request.with_param("flags", entry.flags)
    } else {
        request
    }
}

fn require_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::InvalidArgument("key must not be empty".into()));
    }
    require_plain_segments(key)
}

fn require_prefix(prefix: &str) -> Result<(), ApiError> {
    if prefix.is_empty() {
        return Err(ApiError::InvalidArgument("prefix must not be empty".into()));
    }
    require_plain_segments(prefix)
}

/// URL resolution collapses `.` and `..` segments, which would address a
/// different key than the one given
fn require_plain_segments(path: &str) -> Result<(), ApiError> {
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ApiError::InvalidArgument(format!(
            "{path:?} contains a relative path segment"
        )));
    }
    Ok(())
}

fn require_session(entry: &KeyValueEntry) -> Result<&str, ApiError> {
    match entry.session.as_deref() {
        Some(session) if !session.is_empty() => Ok(session),
        _ => Err(ApiError::InvalidArgument(format!(
            "a session is required to lock {}",
            entry.key
        ))),
    }
}
