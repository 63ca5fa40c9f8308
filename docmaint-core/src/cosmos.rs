//! Cosmos DB SQL API client over the REST gateway.
//!
//! Implements [`DocumentStore`] with master-key request signing. Throttling and
//! other transient failures are retried with exponential backoff; every other
//! rejection is surfaced with the gateway's status code and message.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::CosmosConfig;
use crate::error::StoreError;
use crate::store::{ContainerInfo, DocumentStore, QueryPage};

pub const API_VERSION: &str = "2018-12-31";

/// Characters escaped when a document id is placed in a URL path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// ============================================================================
// Gateway structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CosmosErrorResponse {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
enum ResourceType {
    Colls,
    Docs,
}

impl ResourceType {
    fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Colls => "colls",
            ResourceType::Docs => "docs",
        }
    }
}

enum Body {
    Query(Vec<u8>),
    Json(Value),
}

/// Everything needed to (re)issue one signed request.
struct CosmosRequest {
    method: Method,
    path: String,
    resource_type: ResourceType,
    resource_link: String,
    headers: Vec<(&'static str, String)>,
    body: Option<Body>,
}

/// Master-key authorization header value, already URL-encoded.
pub fn authorization_token(
    key: &[u8],
    method: &Method,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, StoreError> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        method.as_str().to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| StoreError::InvalidKey)?;
    mac.update(payload.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    let token = format!("type=master&ver=1.0&sig={}", signature);
    Ok(utf8_percent_encode(&token, NON_ALPHANUMERIC).to_string())
}

fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn partition_key_header(partition_key: &str) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&[partition_key])?)
}

// ============================================================================
// CosmosClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct CosmosClient {
    client: Client,
    config: CosmosConfig,
    key: Vec<u8>,
    base_url: String,
}

impl CosmosClient {
    pub fn new(config: CosmosConfig) -> Result<Self, StoreError> {
        let encoded_key = config.resolved_key();
        if encoded_key.is_empty() {
            return Err(StoreError::MissingKey);
        }
        let key = BASE64
            .decode(encoded_key.trim())
            .map_err(|_| StoreError::InvalidKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let base_url = config.endpoint.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            key,
            base_url,
        })
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    fn collection_link(&self, container: &str) -> String {
        format!("dbs/{}/colls/{}", self.config.database, container)
    }

    fn document_link(&self, container: &str, id: &str) -> String {
        format!("{}/docs/{}", self.collection_link(container), id)
    }

    fn document_path(&self, container: &str, id: &str) -> String {
        format!(
            "{}/docs/{}",
            self.collection_link(container),
            utf8_percent_encode(id, PATH_SEGMENT)
        )
    }

    async fn execute(&self, request: &CosmosRequest) -> Result<Response, StoreError> {
        // base 2 doubles each delay; the factor puts the first one near retry_delay_ms
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_delay_ms.max(2) / 2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::start(
            retry_strategy,
            || self.send_once(request),
            StoreError::is_transient,
        )
        .await;

        if let Err(e) = &result {
            if e.is_transient() {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    path = %request.path,
                    error = %e,
                    "All Cosmos DB retry attempts failed"
                );
            }
        }
        result
    }

    async fn send_once(&self, request: &CosmosRequest) -> Result<Response, StoreError> {
        let date = rfc1123_now();
        let auth = authorization_token(
            &self.key,
            &request.method,
            request.resource_type.as_str(),
            &request.resource_link,
            &date,
        )?;
        let url = format!("{}/{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header("authorization", auth)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        builder = match &request.body {
            Some(Body::Query(bytes)) => builder
                .header("content-type", "application/query+json")
                .body(bytes.clone()),
            Some(Body::Json(value)) => builder.json(value),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<CosmosErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(error_body);

        let err = StoreError::Api {
            status: status.as_u16(),
            message,
        };
        if err.is_transient() {
            tracing::warn!(status = status.as_u16(), path = %request.path, "Transient Cosmos DB error");
        } else {
            tracing::debug!(status = status.as_u16(), path = %request.path, error = %err, "Cosmos DB rejected request");
        }
        Err(err)
    }
}

#[async_trait]
impl DocumentStore for CosmosClient {
    async fn read_container(&self, container: &str) -> Result<ContainerInfo, StoreError> {
        let link = self.collection_link(container);
        let request = CosmosRequest {
            method: Method::GET,
            path: link.clone(),
            resource_type: ResourceType::Colls,
            resource_link: link,
            headers: Vec::new(),
            body: None,
        };
        let response = self.execute(&request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn read_item(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Value, StoreError> {
        let request = CosmosRequest {
            method: Method::GET,
            path: self.document_path(container, id),
            resource_type: ResourceType::Docs,
            resource_link: self.document_link(container, id),
            headers: vec![(
                "x-ms-documentdb-partitionkey",
                partition_key_header(partition_key)?,
            )],
            body: None,
        };
        let response = self.execute(&request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn query_page(
        &self,
        container: &str,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<QueryPage, StoreError> {
        let link = self.collection_link(container);
        let body = serde_json::to_vec(&serde_json::json!({
            "query": query,
            "parameters": [],
        }))?;

        // No query plan is fetched, so the gateway rejects cross-partition
        // ORDER BY, TOP, DISTINCT and aggregates with a 400.
        let mut headers = vec![
            ("x-ms-documentdb-isquery", "True".to_string()),
            ("x-ms-documentdb-query-enablecrosspartition", "True".to_string()),
            ("x-ms-max-item-count", self.config.page_size.to_string()),
        ];
        if let Some(token) = continuation {
            headers.push(("x-ms-continuation", token.to_string()));
        }

        let request = CosmosRequest {
            method: Method::POST,
            path: format!("{}/docs", link),
            resource_type: ResourceType::Docs,
            resource_link: link,
            headers,
            body: Some(Body::Query(body)),
        };

        let response = self.execute(&request).await?;
        let continuation = response
            .headers()
            .get("x-ms-continuation")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let page: QueryResponse = serde_json::from_slice(&bytes)?;

        tracing::debug!(
            container = container,
            documents = page.documents.len(),
            more = continuation.is_some(),
            "Fetched query page"
        );

        Ok(QueryPage {
            documents: page.documents,
            continuation,
        })
    }

    async fn upsert_item(
        &self,
        container: &str,
        partition_key: &str,
        item: &Value,
    ) -> Result<(), StoreError> {
        let link = self.collection_link(container);
        let request = CosmosRequest {
            method: Method::POST,
            path: format!("{}/docs", link),
            resource_type: ResourceType::Docs,
            resource_link: link,
            headers: vec![
                ("x-ms-documentdb-is-upsert", "True".to_string()),
                (
                    "x-ms-documentdb-partitionkey",
                    partition_key_header(partition_key)?,
                ),
            ],
            body: Some(Body::Json(item.clone())),
        };
        self.execute(&request).await?;
        Ok(())
    }

    async fn delete_item(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<(), StoreError> {
        let request = CosmosRequest {
            method: Method::DELETE,
            path: self.document_path(container, id),
            resource_type: ResourceType::Docs,
            resource_link: self.document_link(container, id),
            headers: vec![(
                "x-ms-documentdb-partitionkey",
                partition_key_header(partition_key)?,
            )],
            body: None,
        };
        self.execute(&request).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "cosmos"
    }
}

// ============================================================================
// TESTS
// ============================================================================
