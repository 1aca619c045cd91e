//! Elasticsearch client for the search delegate

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{DelegateError, SearchConfig};
use crate::resource::Resource;

/// Fields searched by free-text queries, with name boosted.
const SEARCH_FIELDS: [&str; 5] = ["name^3", "description", "tags", "metadata.*", "type"];

pub struct ElasticClient {
    client: Client,
    url: String,
    index: String,
    size: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Resource,
}

impl ElasticClient {
    pub fn new(url: &str, config: &SearchConfig) -> Result<Self, DelegateError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            size: config.result_size,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Create the index with keyword mappings for the filter fields.
    /// An index that already exists is left alone.
    pub async fn ensure_index(&self) -> Result<(), DelegateError> {
        let mapping = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "name": { "type": "text" },
                    "type": { "type": "text" },
                    "description": { "type": "text" },
                    "tags": { "type": "text", "fields": { "raw": { "type": "keyword" } } },
                    "tag": { "type": "keyword" },
                    "owner": { "type": "keyword" },
                    "public": { "type": "boolean" },
                    "createdAt": { "type": "date" },
                    "updatedAt": { "type": "date" }
                }
            }
        });

        let response = self
            .client
            .put(format!("{}/{}", self.url, self.index))
            .json(&mapping)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index = %self.index, "Created search index");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists") {
            return Ok(());
        }
        Err(DelegateError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Upsert one document, refreshing so it is immediately searchable.
    pub async fn index(&self, resource: &Resource) -> Result<(), DelegateError> {
        let response = self
            .client
            .put(format!(
                "{}/{}/_doc/{}?refresh=true",
                self.url, self.index, resource.id
            ))
            .json(resource)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    /// Remove one document. A missing document is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), DelegateError> {
        let response = self
            .client
            .delete(format!("{}/{}/_doc/{}?refresh=true", self.url, self.index, id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await.map(|_| ())
    }

    pub async fn search(
        &self,
        query: &str,
        owner: Option<&str>,
    ) -> Result<Vec<Resource>, DelegateError> {
        let body = search_body(query, owner, self.size);
        let response = self
            .client
            .post(format!("{}/{}/_search", self.url, self.index))
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.hits.hits.into_iter().map(|h| h.source).collect())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, DelegateError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(DelegateError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Owner-scoped searches filter on the owner term only; anonymous searches
/// only see public documents.
fn search_body(query: &str, owner: Option<&str>, size: usize) -> Value {
    let filter = match owner {
        Some(owner) => json!([{ "term": { "owner": owner } }]),
        None => json!([{ "term": { "public": true } }]),
    };
    json!({
        "query": {
            "bool": {
                "must": [{
                    "multi_match": {
                        "query": query,
                        "fields": SEARCH_FIELDS
                    }
                }],
                "filter": filter
            }
        },
        "size": size
    })
}
