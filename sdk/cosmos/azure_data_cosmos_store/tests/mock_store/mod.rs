// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

#![allow(dead_code)]

//! An in-memory store implementing the connection seam, with knobs for paging,
//! throttling, latency and per-item failures.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use azure_data_cosmos_store::{
    connection::{Connector, QueryPageRequest, RawQueryPage, StoreConnection, StoreResponse},
    models::{AccountRegion, ContainerProperties, DatabaseAccount, ThroughputProperties},
    ClientConfig, ConnectionMode, ConsistencyLevel, CosmosStoreClient, CosmosStoreClientOptions,
    Error, ErrorKind, PartitionKey, RegionResolver, Result, RetryOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

pub const POINT_CHARGE: f64 = 1.0;
pub const WRITE_CHARGE: f64 = 5.0;
pub const QUERY_PAGE_CHARGE: f64 = 2.5;

pub const WRITE_REGION_ENDPOINT: &str = "https://mock-westeurope.documents.azure.com/";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub author: String,
    pub title: String,
}

impl Article {
    pub fn new(id: impl Into<String>, author: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: format!("Title of {id}"),
            id,
            author: author.into(),
        }
    }
}

#[derive(Debug)]
struct StoredItem {
    partition_key: PartitionKey,
    document: Value,
}

#[derive(Debug)]
struct Container {
    properties: ContainerProperties,
    throughput: ThroughputProperties,
    items: Vec<StoredItem>,
}

impl Container {
    fn position(&self, partition_key: &PartitionKey, id: &str) -> Option<usize> {
        self.items.iter().position(|item| {
            &item.partition_key == partition_key && item.document["id"].as_str() == Some(id)
        })
    }
}

#[derive(Debug, Default)]
struct State {
    database_exists: bool,
    containers: BTreeMap<String, Container>,
}

/// An in-memory database.
#[derive(Debug)]
pub struct MockStore {
    state: Mutex<State>,
    page_size: AtomicUsize,
    throttles_remaining: AtomicU32,
    latency_ms: AtomicU32,
    failing_ids: Mutex<HashSet<String>>,
    concurrently_deleted_ids: Mutex<HashSet<String>>,
    queries: Mutex<Vec<QueryPageRequest>>,
    round_trips: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            page_size: AtomicUsize::new(100),
            throttles_remaining: AtomicU32::new(0),
            latency_ms: AtomicU32::new(0),
            failing_ids: Mutex::new(HashSet::new()),
            concurrently_deleted_ids: Mutex::new(HashSet::new()),
            queries: Mutex::new(Vec::new()),
            round_trips: AtomicUsize::new(0),
        })
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.page_size.store(page_size, Ordering::SeqCst);
    }

    /// Throttles the next `count` round trips with a 1ms retry-after hint.
    pub fn throttle_next(&self, count: u32) {
        self.throttles_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u32, Ordering::SeqCst);
    }

    /// Makes every delete of `id` fail with a 500.
    pub fn fail_deletes_of(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    /// Removes `id` just before the client's own delete of it arrives, as if another
    /// process got there first.
    pub fn delete_concurrently(&self, id: &str) {
        self.concurrently_deleted_ids
            .lock()
            .unwrap()
            .insert(id.to_string());
    }

    pub fn recorded_queries(&self) -> Vec<QueryPageRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn database_exists(&self) -> bool {
        self.state.lock().unwrap().database_exists
    }

    pub fn item_count(&self, container_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .map(|c| c.items.len())
            .unwrap_or_default()
    }

    pub fn container_throughput(&self, container_id: &str) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .map(|c| c.throughput.throughput())
    }

    async fn begin(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency.into())).await;
        }
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .throttles_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(Error::new(ErrorKind::RateLimited {
                retry_after: Some(Duration::from_millis(1)),
            }));
        }
        Ok(())
    }

    fn with_container<T>(
        &self,
        container_id: &str,
        f: impl FnOnce(&mut Container) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        if !state.database_exists {
            return Err(Error::new(ErrorKind::NotFound));
        }
        let container = state
            .containers
            .get_mut(container_id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound))?;
        f(container)
    }

    fn run_query(container: &Container, request: &QueryPageRequest) -> Vec<Value> {
        let text = request.query.text();
        let in_scope = container.items.iter().filter(|item| {
            request
                .partition_key
                .as_ref()
                .is_none_or(|pk| pk == &item.partition_key)
        });
        let filtered: Vec<&StoredItem> = match parse_equality_filter(text) {
            Some((field, parameter)) => {
                let expected = request.query.parameter(&parameter).cloned();
                in_scope
                    .filter(|item| Some(&item.document[field.as_str()]) == expected.as_ref())
                    .collect()
            }
            None => in_scope.collect(),
        };

        if text.starts_with("SELECT VALUE COUNT(1)") {
            // One partial count per partition, as the gateway answers without a query plan.
            let mut counts: Vec<(&PartitionKey, usize)> = Vec::new();
            for item in &filtered {
                match counts.iter_mut().find(|(pk, _)| *pk == &item.partition_key) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((&item.partition_key, 1)),
                }
            }
            return counts.into_iter().map(|(_, count)| json!(count)).collect();
        }
        if text.starts_with("SELECT c.id,") {
            let path = container.properties.partition_key_path();
            return filtered
                .iter()
                .map(|item| {
                    let mut key = json!({ "id": item.document["id"] });
                    if let Some(value) = value_at(&item.document, path) {
                        key["partitionKey"] = value.clone();
                    }
                    key
                })
                .collect();
        }
        filtered.iter().map(|item| item.document.clone()).collect()
    }
}

/// The document's value at a `/a/b` partition key path; `None` when the path is absent.
fn value_at<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| current.get(segment))
}

/// Recognizes `... WHERE c.<field> = @<parameter>`.
fn parse_equality_filter(text: &str) -> Option<(String, String)> {
    let (_, condition) = text.split_once(" WHERE c.")?;
    let (field, parameter) = condition.split_once(" = ")?;
    Some((field.trim().to_string(), parameter.trim().to_string()))
}

#[async_trait]
impl StoreConnection for MockStore {
    fn write_endpoint(&self) -> String {
        WRITE_REGION_ENDPOINT.to_string()
    }

    async fn create_database_if_not_exists(&self) -> Result<StoreResponse<bool>> {
        self.begin().await?;
        let mut state = self.state.lock().unwrap();
        let created = !state.database_exists;
        state.database_exists = true;
        Ok(StoreResponse::new(created, WRITE_CHARGE))
    }

    async fn delete_database(&self) -> Result<StoreResponse<()>> {
        self.begin().await?;
        let mut state = self.state.lock().unwrap();
        if !state.database_exists {
            return Err(Error::new(ErrorKind::NotFound));
        }
        *state = State::default();
        Ok(StoreResponse::new((), WRITE_CHARGE))
    }

    async fn create_container_if_not_exists(
        &self,
        properties: &ContainerProperties,
        throughput: ThroughputProperties,
    ) -> Result<StoreResponse<bool>> {
        self.begin().await?;
        let mut state = self.state.lock().unwrap();
        if !state.database_exists {
            return Err(Error::new(ErrorKind::NotFound));
        }
        if state.containers.contains_key(&properties.id) {
            return Ok(StoreResponse::new(false, POINT_CHARGE));
        }
        state.containers.insert(
            properties.id.clone(),
            Container {
                properties: properties.clone(),
                throughput,
                items: Vec::new(),
            },
        );
        Ok(StoreResponse::new(true, WRITE_CHARGE))
    }

    async fn read_container(
        &self,
        container_id: &str,
    ) -> Result<StoreResponse<ContainerProperties>> {
        self.begin().await?;
        self.with_container(container_id, |container| {
            Ok(StoreResponse::new(
                container.properties.clone(),
                POINT_CHARGE,
            ))
        })
    }

    async fn create_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>> {
        self.begin().await?;
        self.with_container(container_id, |container| {
            let id = item["id"].as_str().unwrap_or_default();
            if container.position(partition_key, id).is_some() {
                return Err(Error::new(ErrorKind::Conflict));
            }
            container.items.push(StoredItem {
                partition_key: partition_key.clone(),
                document: item.clone(),
            });
            Ok(StoreResponse::new(item, WRITE_CHARGE))
        })
    }

    async fn upsert_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>> {
        self.begin().await?;
        self.with_container(container_id, |container| {
            let id = item["id"].as_str().unwrap_or_default();
            match container.position(partition_key, id) {
                Some(index) => container.items[index].document = item.clone(),
                None => container.items.push(StoredItem {
                    partition_key: partition_key.clone(),
                    document: item.clone(),
                }),
            }
            Ok(StoreResponse::new(item, WRITE_CHARGE))
        })
    }

    async fn read_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<Value>> {
        self.begin().await?;
        self.with_container(container_id, |container| {
            let index = container
                .position(partition_key, item_id)
                .ok_or_else(|| Error::new(ErrorKind::NotFound))?;
            Ok(StoreResponse::new(
                container.items[index].document.clone(),
                POINT_CHARGE,
            ))
        })
    }

    async fn delete_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<()>> {
        self.begin().await?;
        if self.failing_ids.lock().unwrap().contains(item_id) {
            return Err(Error::new(ErrorKind::HttpResponse {
                status: 500,
                code: Some("InternalServerError".into()),
            }));
        }
        let deleted_elsewhere = self
            .concurrently_deleted_ids
            .lock()
            .unwrap()
            .remove(item_id);
        self.with_container(container_id, |container| {
            if deleted_elsewhere {
                container
                    .items
                    .retain(|item| item.document["id"].as_str() != Some(item_id));
            }
            let index = container
                .position(partition_key, item_id)
                .ok_or_else(|| Error::new(ErrorKind::NotFound))?;
            container.items.remove(index);
            Ok(StoreResponse::new((), WRITE_CHARGE))
        })
    }

    async fn query_items(
        &self,
        container_id: &str,
        request: &QueryPageRequest,
    ) -> Result<StoreResponse<RawQueryPage>> {
        self.begin().await?;
        self.queries.lock().unwrap().push(request.clone());

        let results = self.with_container(container_id, |container| {
            Ok(Self::run_query(container, request))
        })?;
        let offset: usize = match &request.continuation {
            Some(token) => token
                .parse()
                .map_err(|_| Error::new(ErrorKind::HttpResponse { status: 400, code: None }))?,
            None => 0,
        };
        let mut page_size = self.page_size.load(Ordering::SeqCst).max(1);
        if let Some(max_item_count) = request.max_item_count {
            page_size = page_size.min(max_item_count as usize);
        }
        let end = (offset + page_size).min(results.len());
        let items = results[offset.min(end)..end].to_vec();
        let continuation = (end < results.len()).then(|| end.to_string());
        Ok(StoreResponse::new(
            RawQueryPage {
                items,
                continuation,
            },
            QUERY_PAGE_CHARGE,
        ))
    }
}

/// A connector over a [`MockStore`] with a two-region account.
#[derive(Debug)]
pub struct MockConnector {
    pub store: Arc<MockStore>,
    read_account_calls: AtomicUsize,
    failures_before_success: AtomicUsize,
    connected_regions: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(store: Arc<MockStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            read_account_calls: AtomicUsize::new(0),
            failures_before_success: AtomicUsize::new(0),
            connected_regions: Mutex::new(Vec::new()),
        })
    }

    /// Makes the next `count` account reads fail with `ServiceUnavailable`.
    pub fn fail_account_reads(&self, count: usize) {
        self.failures_before_success.store(count, Ordering::SeqCst);
    }

    pub fn read_account_calls(&self) -> usize {
        self.read_account_calls.load(Ordering::SeqCst)
    }

    pub fn connected_regions(&self) -> Vec<String> {
        self.connected_regions.lock().unwrap().clone()
    }
}

fn account_region(name: &str, host: &str) -> AccountRegion {
    AccountRegion {
        name: name.into(),
        endpoint: Url::parse(&format!("https://{host}.documents.azure.com/")).unwrap(),
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn read_account(&self, _config: &ClientConfig) -> Result<DatabaseAccount> {
        self.read_account_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let failed = self
            .failures_before_success
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::new(ErrorKind::ServiceUnavailable));
        }
        Ok(DatabaseAccount {
            id: "mock".into(),
            writable_locations: vec![account_region("West Europe", "mock-westeurope")],
            readable_locations: vec![
                account_region("West Europe", "mock-westeurope"),
                account_region("East US", "mock-eastus"),
            ],
        })
    }

    fn connect(
        &self,
        _config: &ClientConfig,
        _account: &DatabaseAccount,
        preferred_regions: &[String],
    ) -> Result<Arc<dyn StoreConnection>> {
        *self.connected_regions.lock().unwrap() = preferred_regions.to_vec();
        let connection: Arc<dyn StoreConnection> = self.store.clone();
        Ok(connection)
    }
}

pub const DATABASE_ID: &str = "planetzine";
pub const CONTAINER_ID: &str = "articles";

pub fn config() -> ClientConfig {
    ClientConfig {
        database_id: DATABASE_ID.into(),
        endpoint: Url::parse("https://mock.documents.azure.com/").unwrap(),
        auth_key: "c2VjcmV0".into(),
        consistency_level: ConsistencyLevel::Session,
        connection_mode: ConnectionMode::Gateway,
        max_connection_limit: 4,
        initial_throughput: 400,
        retry: RetryOptions::default(),
    }
}

/// A client over `connector` that believes it runs in `current_region`.
pub fn client_in_region(
    connector: &Arc<MockConnector>,
    config: ClientConfig,
    current_region: &str,
) -> CosmosStoreClient {
    let connector: Arc<dyn Connector> = connector.clone();
    CosmosStoreClient::new(
        config,
        Some(CosmosStoreClientOptions {
            connector: Some(connector),
            region_resolver: Some(RegionResolver::with_current_region(current_region)),
            ..Default::default()
        }),
    )
}

/// An uninitialized client over a fresh store, running outside any known region.
pub fn new_client() -> (CosmosStoreClient, Arc<MockStore>, Arc<MockConnector>) {
    let store = MockStore::new();
    let connector = MockConnector::new(store.clone());
    let client = client_in_region(&connector, config(), "local");
    (client, store, connector)
}

/// An initialized client with the database and the `articles` container (keyed on `/author`).
pub async fn ready_client() -> (CosmosStoreClient, Arc<MockStore>) {
    use azure_data_cosmos_store::CosmosStoreClientMethods;

    let (client, store, _) = new_client();
    client.init(None).await.unwrap();
    client.create_database(None).await.unwrap();
    client
        .create_container(CONTAINER_ID, "/author", None)
        .await
        .unwrap();
    (client, store)
}
