// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! The transport seam between [`CosmosStoreClient`](crate::CosmosStoreClient) and the store.
//!
//! A [`Connector`] reads account metadata and builds the single long-lived
//! [`StoreConnection`] the client uses for the rest of the process. The production
//! implementation talks to the Cosmos DB gateway over HTTPS ([`GatewayConnector`]); tests
//! substitute an in-memory store.

mod auth;
mod gateway;

pub use gateway::{GatewayConnection, GatewayConnector};

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    models::{ContainerProperties, DatabaseAccount, ThroughputProperties},
    ClientConfig, PartitionKey, Query, Result,
};

/// A successful round trip and the request charge it consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreResponse<T> {
    pub value: T,
    /// The cost of the round trip, in request units.
    pub request_charge: f64,
}

impl<T> StoreResponse<T> {
    pub fn new(value: T, request_charge: f64) -> Self {
        Self {
            value,
            request_charge,
        }
    }
}

/// A request for one page of query results.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPageRequest {
    pub query: Query,

    /// Scopes the query to a single partition. `None` fans out across all partitions.
    pub partition_key: Option<PartitionKey>,

    /// The continuation returned with the previous page, if any.
    pub continuation: Option<String>,

    /// An upper bound on the page size. The store may return fewer items.
    pub max_item_count: Option<u32>,
}

/// One page of raw query results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawQueryPage {
    pub items: Vec<Value>,
    /// Present when more pages remain.
    pub continuation: Option<String>,
}

/// An established connection to one database in the store.
///
/// Implementations are shared by every in-flight operation and must be safe to use
/// concurrently without external locking. Failures are reported with the crate's
/// [`ErrorKind`](crate::ErrorKind)s; retries are the caller's concern.
#[async_trait]
pub trait StoreConnection: Send + Sync + fmt::Debug {
    /// The endpoint write requests are sent to.
    fn write_endpoint(&self) -> String;

    /// Creates the database. Returns `false` if it already existed.
    async fn create_database_if_not_exists(&self) -> Result<StoreResponse<bool>>;

    async fn delete_database(&self) -> Result<StoreResponse<()>>;

    /// Creates the container with the given throughput. Returns `false` if it already existed.
    async fn create_container_if_not_exists(
        &self,
        properties: &ContainerProperties,
        throughput: ThroughputProperties,
    ) -> Result<StoreResponse<bool>>;

    async fn read_container(&self, container_id: &str) -> Result<StoreResponse<ContainerProperties>>;

    /// Inserts a document, failing with `Conflict` if the id exists in the partition.
    async fn create_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>>;

    async fn upsert_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item: Value,
    ) -> Result<StoreResponse<Value>>;

    async fn read_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<Value>>;

    async fn delete_item(
        &self,
        container_id: &str,
        partition_key: &PartitionKey,
        item_id: &str,
    ) -> Result<StoreResponse<()>>;

    /// Executes a single page of a query.
    async fn query_items(
        &self,
        container_id: &str,
        request: &QueryPageRequest,
    ) -> Result<StoreResponse<RawQueryPage>>;
}

/// Builds the long-lived [`StoreConnection`] during client initialization.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Reads account-level metadata, including the account's regions.
    async fn read_account(&self, config: &ClientConfig) -> Result<DatabaseAccount>;

    /// Establishes the connection, routing reads by `preferred_regions` in order.
    fn connect(
        &self,
        config: &ClientConfig,
        account: &DatabaseAccount,
        preferred_regions: &[String],
    ) -> Result<Arc<dyn StoreConnection>>;
}
