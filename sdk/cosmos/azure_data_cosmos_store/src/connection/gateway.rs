// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! A [`StoreConnection`] over the Cosmos DB REST API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use super::{
    auth::{format_date, MasterKeyCredential},
    Connector, QueryPageRequest, RawQueryPage, StoreConnection, StoreResponse,
};
use crate::{
    constants,
    location_cache::{LocationCache, OperationType},
    models::{ContainerProperties, DatabaseAccount, ThroughputProperties},
    resource_context::{ResourceLink, ResourceType},
    session::SessionContainer,
    ClientConfig, ConnectionMode, ConsistencyLevel, Error, ErrorKind, PartitionKey, Result,
};

/// Builds [`GatewayConnection`]s.
#[derive(Clone, Debug, Default)]
pub struct GatewayConnector {}

impl GatewayConnector {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl Connector for GatewayConnector {
    async fn read_account(&self, config: &ClientConfig) -> Result<DatabaseAccount> {
        let transport = Transport::new(config)?;
        let response = transport
            .execute(
                Method::GET,
                &config.endpoint,
                &ResourceLink::root(),
                Vec::new(),
                None,
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn connect(
        &self,
        config: &ClientConfig,
        account: &DatabaseAccount,
        preferred_regions: &[String],
    ) -> Result<Arc<dyn StoreConnection>> {
        if config.connection_mode == ConnectionMode::Direct {
            warn!("direct connection mode is not available over the REST transport; requests use the gateway");
        }
        Ok(Arc::new(GatewayConnection {
            transport: Transport::new(config)?,
            locations: LocationCache::new(config.endpoint.clone(), account, preferred_regions),
            database_link: ResourceLink::databases().item(&config.database_id),
            database_id: config.database_id.clone(),
            consistency_level: config.consistency_level,
            sessions: SessionContainer::new(),
        }))
    }
}

/// Signs and sends requests, and maps failure statuses to [`ErrorKind`]s.
#[derive(Debug)]
struct Transport {
    http: reqwest::Client,
    credential: MasterKeyCredential,
}

struct GatewayResponse {
    request_charge: f64,
    continuation: Option<String>,
    session_token: Option<String>,
    body: Vec<u8>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl Transport {
    fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_connection_limit)
            .build()?;
        Ok(Self {
            http,
            credential: MasterKeyCredential::new(&config.auth_key)?,
        })
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &Url,
        link: &ResourceLink,
        headers: Vec<(&'static str, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<GatewayResponse> {
        let date = format_date(OffsetDateTime::now_utc())?;
        let authorization = self.credential.authorization(method.as_str(), link, &date)?;

        let mut request = self
            .http
            .request(method, link.url(endpoint))
            .header(constants::MS_DATE, &date)
            .header(constants::VERSION, constants::API_VERSION)
            .header(constants::AUTHORIZATION, authorization);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let request_charge = header(constants::REQUEST_CHARGE)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or_default();
        let continuation = header(constants::CONTINUATION).filter(|c| !c.is_empty());
        let session_token = header(constants::SESSION_TOKEN);
        let retry_after = header(constants::RETRY_AFTER_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis);
        let body = response.bytes().await?.to_vec();

        if (200..300).contains(&status) {
            return Ok(GatewayResponse {
                request_charge,
                continuation,
                session_token,
                body,
            });
        }

        let error_body = serde_json::from_slice::<ErrorBody>(&body).ok();
        let message = error_body
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| format!("request failed with status {status}"));
        let kind = match status {
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited { retry_after },
            408 | 410 | 503 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::HttpResponse {
                status,
                code: error_body.and_then(|b| b.code),
            },
        };
        Err(Error::message(kind, message))
    }
}

/// A connection to one database through the Cosmos DB gateway.
///
/// Reads are routed to the preferred region and fail over through the remaining readable
/// regions when a region is unavailable; writes go to the account's write region.
#[derive(Debug)]
pub struct GatewayConnection {
    transport: Transport,
    locations: LocationCache,
    database_link: ResourceLink,
    database_id: String,
    consistency_level: ConsistencyLevel,
    sessions: SessionContainer,
}

struct GatewayRequest<'a> {
    method: Method,
    link: ResourceLink,
    operation: OperationType,
    container_id: Option<&'a str>,
    headers: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> GatewayRequest<'a> {
    fn new(method: Method, link: ResourceLink, operation: OperationType) -> Self {
        Self {
            method,
            link,
            operation,
            container_id: None,
            headers: Vec::new(),
            body: None,
        }
    }

    fn container(mut self, container_id: &'a str) -> Self {
        self.container_id = Some(container_id);
        self
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn json(mut self, body: &impl serde::Serialize) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }
}

impl GatewayConnection {
    fn container_link(&self, container_id: &str) -> ResourceLink {
        self.database_link
            .feed(ResourceType::Containers)
            .item(container_id)
    }

    fn items_link(&self, container_id: &str) -> ResourceLink {
        self.container_link(container_id).feed(ResourceType::Items)
    }

    async fn send(&self, request: GatewayRequest<'_>) -> Result<GatewayResponse> {
        let mut headers = request.headers;
        if request.operation == OperationType::Read {
            headers.push((
                constants::CONSISTENCY_LEVEL,
                self.consistency_level.as_str().to_string(),
            ));
        }
        if self.consistency_level == ConsistencyLevel::Session {
            if let Some(token) = request
                .container_id
                .and_then(|c| self.sessions.get_session_token(c))
            {
                headers.push((constants::SESSION_TOKEN, token));
            }
        }

        let endpoints = self.locations.endpoints(request.operation);
        let mut last_error = None;
        for endpoint in &endpoints {
            let result = self
                .transport
                .execute(
                    request.method.clone(),
                    endpoint,
                    &request.link,
                    headers.clone(),
                    request.body.clone(),
                )
                .await;
            match result {
                Ok(response) => {
                    if let (Some(container_id), Some(token)) =
                        (request.container_id, response.session_token.as_deref())
                    {
                        if let Err(e) = self.sessions.set_session_token(container_id, token) {
                            debug!(container_id, error = %e, "ignoring malformed session token");
                        }
                    }
                    return Ok(response);
                }
                Err(e) if matches!(e.kind(), ErrorKind::ServiceUnavailable) => {
                    warn!(endpoint = %endpoint, error = %e, "region unavailable, failing over");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::new(ErrorKind::ServiceUnavailable)))
    }

    fn partition_key_header(partition_key: &PartitionKey) -> (&'static str, String) {
        (constants::PARTITION_KEY, partition_key.header_value())
    }

    async fn write_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
        upsert: bool,
    ) -> Result<StoreResponse<Value>> {
        let (name, value) = Self::partition_key_header(partition_key);
        let request = GatewayRequest::new(
            Method::POST,
            self.items_link(container_id),
            OperationType::Write,
        )
        .container(container_id)
        .header(name, value)
        .header(constants::CONTENT_TYPE, constants::APPLICATION_JSON)
        .header(constants::IS_UPSERT, if upsert { "True" } else { "False" })
        .json(&item)?;
        let response = self.send(request).await?;
        Ok(StoreResponse::new(
            serde_json::from_slice(&response.body)?,
            response.request_charge,
        ))
    }
}

/// Treats `Conflict` from a create as "already exists".
fn created_or_existing(result: Result<GatewayResponse>) -> Result<StoreResponse<bool>> {
    match result {
        Ok(response) => Ok(StoreResponse::new(true, response.request_charge)),
        Err(e) if matches!(e.kind(), ErrorKind::Conflict) => Ok(StoreResponse::new(false, 0.0)),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl StoreConnection for GatewayConnection {
    fn write_endpoint(&self) -> String {
        self.locations.write_endpoint().to_string()
    }

    async fn create_database_if_not_exists(&self) -> Result<StoreResponse<bool>> {
        let request = GatewayRequest::new(
            Method::POST,
            ResourceLink::databases(),
            OperationType::Write,
        )
        .header(constants::CONTENT_TYPE, constants::APPLICATION_JSON)
        .json(&json!({ "id": self.database_id }))?;
        created_or_existing(self.send(request).await)
    }

    async fn delete_database(&self) -> Result<StoreResponse<()>> {
        let request = GatewayRequest::new(
            Method::DELETE,
            self.database_link.clone(),
            OperationType::Write,
        );
        let response = self.send(request).await?;
        self.sessions.clear_all();
        Ok(StoreResponse::new((), response.request_charge))
    }

    async fn create_container_if_not_exists(
        &self,
        properties: &ContainerProperties,
        throughput: ThroughputProperties,
    ) -> Result<StoreResponse<bool>> {
        let request = GatewayRequest::new(
            Method::POST,
            self.database_link.feed(ResourceType::Containers),
            OperationType::Write,
        )
        .header(constants::CONTENT_TYPE, constants::APPLICATION_JSON)
        .header(constants::OFFER_THROUGHPUT, throughput.throughput().to_string())
        .json(properties)?;
        created_or_existing(self.send(request).await)
    }

    async fn read_container(&self, container_id: &str) -> Result<StoreResponse<ContainerProperties>> {
        let request = GatewayRequest::new(
            Method::GET,
            self.container_link(container_id),
            OperationType::Read,
        );
        let response = self.send(request).await?;
        Ok(StoreResponse::new(
            serde_json::from_slice(&response.body)?,
            response.request_charge,
        ))
    }

    async fn create_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>> {
        self.write_item(container_id, partition_key, item, false).await
    }

    async fn upsert_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>> {
        self.write_item(container_id, partition_key, item, true).await
    }

    async fn read_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<Value>> {
        let (name, value) = Self::partition_key_header(partition_key);
        let request = GatewayRequest::new(
            Method::GET,
            self.items_link(container_id).item(item_id),
            OperationType::Read,
        )
        .container(container_id)
        .header(name, value);
        let response = self.send(request).await?;
        Ok(StoreResponse::new(
            serde_json::from_slice(&response.body)?,
            response.request_charge,
        ))
    }

    async fn delete_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<()>> {
        let (name, value) = Self::partition_key_header(partition_key);
        let request = GatewayRequest::new(
            Method::DELETE,
            self.items_link(container_id).item(item_id),
            OperationType::Write,
        )
        .container(container_id)
        .header(name, value);
        let response = self.send(request).await?;
        Ok(StoreResponse::new((), response.request_charge))
    }

    async fn query_items(
        &self,
        container_id: &str,
        page: &QueryPageRequest,
    ) -> Result<StoreResponse<RawQueryPage>> {
        #[derive(Deserialize)]
        struct QueryResults {
            #[serde(rename = "Documents")]
            documents: Vec<Value>,
        }

        let mut request = GatewayRequest::new(
            Method::POST,
            self.items_link(container_id),
            OperationType::Read,
        )
        .container(container_id)
        .header(constants::QUERY, "True")
        .header(constants::CONTENT_TYPE, constants::APPLICATION_QUERY_JSON)
        .header(
            constants::MAX_ITEM_COUNT,
            page.max_item_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "-1".to_string()),
        )
        .json(&page.query)?;
        request = match &page.partition_key {
            Some(partition_key) => {
                let (name, value) = Self::partition_key_header(partition_key);
                request.header(name, value)
            }
            None => request.header(constants::QUERY_ENABLE_CROSS_PARTITION, "True"),
        };
        if let Some(continuation) = &page.continuation {
            request = request.header(constants::CONTINUATION, continuation.clone());
        }

        let response = self.send(request).await?;
        let results: QueryResults = serde_json::from_slice(&response.body)?;
        Ok(StoreResponse::new(
            RawQueryPage {
                items: results.documents,
                continuation: response.continuation,
            },
            response.request_charge,
        ))
    }
}
