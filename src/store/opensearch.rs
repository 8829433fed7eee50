use super::{DocumentStore, Hit};
use crate::config::OpenSearchConfig;
use crate::error::{LogifyError, Result};
use crate::query::{Clause, QueryDocument};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Lenient multi-index reads: missing or closed partitions are skipped and a
/// pattern that matches no index returns zero hits instead of a 404.
const LENIENT_INDICES: &[(&str, &str)] = &[
    ("ignore_unavailable", "true"),
    ("allow_no_indices", "true"),
];

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Option<HitsEnvelope>,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

/// REST client for an OpenSearch or Elasticsearch-compatible cluster.
pub struct OpenSearchStore {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http_client: reqwest::Client,
}

impl OpenSearchStore {
    pub fn new(config: &OpenSearchConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LogifyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.http_client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("[STORE] OpenSearch returned {}: {}", status, body);
        Err(LogifyError::StoreStatus {
            status: status.as_u16(),
            body,
        })
    }

    async fn search_raw(&self, pattern: &str, body: &Value) -> Result<SearchResponse> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("{}/_search", pattern))
                    .query(LENIENT_INDICES)
                    .json(body),
            )
            .await?;
        Ok(response.json().await?)
    }
}

fn into_hits(response: SearchResponse) -> Vec<Hit> {
    response
        .hits
        .map(|h| h.hits)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| Hit {
            index: raw.index,
            id: raw.id,
            source: raw.source,
        })
        .collect()
}

fn filter_query(filter: &[Clause]) -> Value {
    if filter.is_empty() {
        json!({ "match_all": {} })
    } else {
        let must: Vec<Value> = filter.iter().map(Clause::to_json).collect();
        json!({ "bool": { "must": must } })
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    fn kind(&self) -> &'static str {
        "opensearch"
    }

    async fn index_document(&self, index: &str, body: &[u8]) -> Result<String> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("{}/_doc", index))
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body.to_vec()),
            )
            .await?;
        let created: IndexResponse = response.json().await?;
        Ok(created.id)
    }

    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<()> {
        self.send(
            self.request(reqwest::Method::PUT, &format!("{}/_doc/{}", index, id))
                .json(doc),
        )
        .await?;
        Ok(())
    }

    async fn search(&self, pattern: &str, query: &QueryDocument) -> Result<Vec<Hit>> {
        let response = self.search_raw(pattern, &query.to_json()).await?;
        Ok(into_hits(response))
    }

    async fn find_by_id(&self, pattern: &str, id: &str) -> Result<Option<Hit>> {
        let body = json!({
            "query": { "ids": { "values": [id] } },
            "size": 1
        });
        let response = self.search_raw(pattern, &body).await?;
        Ok(into_hits(response).into_iter().next())
    }

    async fn update_document(&self, index: &str, id: &str, partial: &Value) -> Result<()> {
        let result = self
            .send(
                self.request(reqwest::Method::POST, &format!("{}/_update/{}", index, id))
                    .json(&json!({ "doc": partial })),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(LogifyError::StoreStatus { status: 404, .. }) => Err(
                LogifyError::DocumentNotFound(format!("{}/{}", index, id)),
            ),
            Err(e) => Err(e),
        }
    }

    async fn terms(
        &self,
        index: &str,
        field: &str,
        filter: &[Clause],
        size: usize,
    ) -> Result<Vec<String>> {
        let body = json!({
            "size": 0,
            "query": filter_query(filter),
            "aggs": {
                "unique_values": {
                    "terms": { "field": field, "size": size }
                }
            }
        });
        let response = self.search_raw(index, &body).await?;
        let buckets = response
            .aggregations
            .as_ref()
            .and_then(|a| a.pointer("/unique_values/buckets"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(buckets
            .iter()
            .filter_map(|b| match b.get("key")? {
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_base_url_is_normalized() {
        let store = OpenSearchStore::new(&OpenSearchConfig {
            url: "http://localhost:9200/".into(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(store.base_url(), "http://localhost:9200");
        assert_eq!(store.kind(), "opensearch");
    }

    #[test]
    fn test_filter_query() {
        assert_eq!(filter_query(&[]), json!({"match_all": {}}));
        let q = filter_query(&[Clause::term("tenant_id.keyword", "t1")]);
        assert_eq!(q["bool"]["must"][0]["term"]["tenant_id.keyword"], "t1");
    }
}
