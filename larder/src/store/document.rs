//! Redis-backed document store

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};

use super::{record_op, DocumentConfig, ResourceStore};
use crate::resource::{now, sort_for_listing, ListFilter, Resource, ResourcePatch};
use crate::{Error, Result};

/// Creates the record and its set memberships in one step. SET NX rejects
/// duplicate ids; KEYS[3], the owner set, is optional.
const CREATE_SCRIPT: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
  redis.call('SADD', KEYS[2], ARGV[2])
  if KEYS[3] then
    redis.call('SADD', KEYS[3], ARGV[2])
  end
  return 1
end
return 0
";

/// Key layout under the configured prefix:
/// - `res:<id>`: the record
/// - `__index`: set of every id
/// - `owner:<owner>`: set of ids per owner, so owner-scoped listings avoid a
///   full scan
#[derive(Debug, Clone)]
struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    fn record(&self, id: &str) -> String {
        format!("{}res:{}", self.prefix, id)
    }

    fn index(&self) -> String {
        format!("{}__index", self.prefix)
    }

    fn owner(&self, owner: &str) -> String {
        format!("{}owner:{}", self.prefix, owner)
    }

    /// Set holding the ids a listing has to consider: the owner's set when
    /// scoped, else every id.
    fn candidate_set(&self, filter: &ListFilter) -> String {
        match filter.owner() {
            Some(owner) => self.owner(owner),
            None => self.index(),
        }
    }

    /// KEYS for [`CREATE_SCRIPT`], in order.
    fn create_keys(&self, resource: &Resource) -> Vec<String> {
        let mut keys = vec![self.record(&resource.id), self.index()];
        if let Some(owner) = &resource.owner {
            keys.push(self.owner(owner));
        }
        keys
    }
}

/// Document store keeping each resource as a JSON string.
pub struct DocumentStore {
    conn: MultiplexedConnection,
    keys: KeyLayout,
    timeout: Duration,
}

impl DocumentStore {
    /// Connect to the configured Redis
    pub async fn connect(config: &DocumentConfig, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                Error::BackendUnavailable(format!("timed out connecting to {}", config.url))
            })??;

        tracing::info!(prefix = %config.prefix, "Connected document store");
        Ok(Self {
            conn,
            keys: KeyLayout {
                prefix: config.prefix.clone(),
            },
            timeout,
        })
    }

    async fn timed<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                metrics::counter!("larder_store_errors_total", "backend" => "document")
                    .increment(1);
                Err(Error::BackendUnavailable(format!(
                    "document store did not answer within {:?}",
                    self.timeout
                )))
            }
        }
    }

    async fn load(&self, id: &str) -> Result<Option<Resource>> {
        let mut conn = self.conn.clone();
        let key = self.keys.record(id);
        let data: Option<String> = self.timed(conn.get(&key)).await?;
        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    async fn candidate_ids(&self, filter: &ListFilter) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let set = self.keys.candidate_set(filter);
        self.timed(conn.smembers(&set)).await
    }
}

#[async_trait]
impl ResourceStore for DocumentStore {
    async fn create(&self, resource: Resource) -> Result<Resource> {
        record_op("document", "create");
        let mut conn = self.conn.clone();
        let data = resource.to_json()?;

        let script = redis::Script::new(CREATE_SCRIPT);
        let mut invocation = script.prepare_invoke();
        for key in self.keys.create_keys(&resource) {
            invocation.key(key);
        }
        invocation.arg(&data).arg(&resource.id);
        let created: i64 = self.timed(invocation.invoke_async(&mut conn)).await?;
        if created == 0 {
            return Err(Error::DuplicateId(resource.id));
        }

        Ok(resource)
    }

    async fn get(&self, id: &str) -> Result<Option<Resource>> {
        record_op("document", "get");
        self.load(id).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Resource>> {
        record_op("document", "list");
        let ids = self.candidate_ids(filter).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.keys.record(id)).collect();
        let mut conn = self.conn.clone();
        let docs: Vec<Option<String>> = self
            .timed(redis::cmd("MGET").arg(&keys).query_async(&mut conn))
            .await?;

        let mut matched = Vec::new();
        // Index entries can outlive their record after a racing delete
        for data in docs.into_iter().flatten() {
            let resource: Resource = serde_json::from_str(&data)?;
            if filter.matches(&resource) {
                matched.push(resource);
            }
        }
        sort_for_listing(&mut matched);
        Ok(matched)
    }

    async fn update(&self, id: &str, patch: ResourcePatch) -> Result<Option<Resource>> {
        record_op("document", "update");
        let Some(mut resource) = self.load(id).await? else {
            return Ok(None);
        };
        let previous_owner = resource.owner.clone();
        resource.apply(patch, now());
        let data = resource.to_json()?;

        let mut conn = self.conn.clone();
        // XX: never resurrect a record deleted in between
        let stored: Option<String> = self
            .timed(
                redis::cmd("SET")
                    .arg(self.keys.record(id))
                    .arg(&data)
                    .arg("XX")
                    .query_async(&mut conn),
            )
            .await?;
        if stored.is_none() {
            return Ok(None);
        }

        if previous_owner != resource.owner {
            let mut pipe = redis::pipe();
            if let Some(old) = &previous_owner {
                pipe.srem(self.keys.owner(old), id).ignore();
            }
            if let Some(new) = &resource.owner {
                pipe.sadd(self.keys.owner(new), id).ignore();
            }
            let _: () = self.timed(pipe.query_async(&mut conn)).await?;
        }

        Ok(Some(resource))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        record_op("document", "delete");
        let existing = self.load(id).await?;

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.del(self.keys.record(id));
        pipe.srem(self.keys.index(), id).ignore();
        if let Some(owner) = existing.as_ref().and_then(|r| r.owner.as_ref()) {
            pipe.srem(self.keys.owner(owner), id).ignore();
        }
        let (removed,): (usize,) = self.timed(pipe.query_async(&mut conn)).await?;

        Ok(removed > 0)
    }

    fn backend_name(&self) -> &'static str {
        "document"
    }
}
