// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_lock::OnceCell;
use futures::StreamExt;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    connection::{Connector, GatewayConnector},
    models::{ContainerProperties, ThroughputProperties},
    partition_key::path_segments,
    pipeline::StorePipeline,
    query::collect_all,
    retry::RetryPolicy,
    ClientConfig, CosmosStoreClientOptions, CostAccountant, DiagnosticsReport, Error, ErrorKind,
    ItemFailure, OperationContext, PartitionKey, Query, QueryIterator, QueryOptions,
    RegionResolver, RequestOptions, Result,
};

/// Names the target of a destructive operation.
///
/// [`delete_database`](CosmosStoreClientMethods::delete_database) and
/// [`delete_all_items`](CosmosStoreClientMethods::delete_all_items) refuse to run unless
/// the confirmation matches the id of the database or container they would destroy.
///
/// ```rust
/// use azure_data_cosmos_store::Confirmation;
///
/// let confirmation = Confirmation::new("articles");
/// assert_eq!(confirmation.target(), "articles");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation(String);

impl Confirmation {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn target(&self) -> &str {
        &self.0
    }

    fn verify(&self, expected: &str) -> Result<()> {
        if self.0 == expected {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::ConfirmationRequired {
                expected: expected.to_string(),
            }))
        }
    }
}

/// The outcome of a [`delete_all_items`](CosmosStoreClientMethods::delete_all_items) that
/// completed without per-item failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteAllSummary {
    /// How many items were listed for deletion.
    pub attempted: usize,
    /// How many of them this call deleted.
    pub deleted: usize,
    /// How many were gone by the time their delete was sent.
    pub already_deleted: usize,
}

/// Defines the methods provided by a [`CosmosStoreClient`]
///
/// This trait is intended to allow you to mock out the `CosmosStoreClient` when testing your application.
/// Rather than depending on `CosmosStoreClient`, you can depend on a generic parameter constrained by this trait, or an `impl CosmosStoreClientMethods` type.
pub trait CosmosStoreClientMethods {
    /// Connects to the store: discovers the account's regions, picks the read region, and
    /// builds the shared connection.
    ///
    /// Concurrent and repeated calls perform the work once. A failed attempt leaves the
    /// client uninitialized so that `init` can be called again.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn doc() -> azure_data_cosmos_store::Result<()> {
    /// use azure_data_cosmos_store::{ClientConfig, CosmosStoreClient, CosmosStoreClientMethods};
    ///
    /// let client = CosmosStoreClient::new(ClientConfig::from_env()?, None);
    /// client.init(None).await?;
    /// client.create_database(None).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[allow(async_fn_in_trait)] // REASON: Mirrors the other client traits in this SDK; callers use concrete types.
    async fn init(&self, options: Option<RequestOptions>) -> Result<()>;

    /// Creates the configured database. Returns `false` if it already existed.
    #[allow(async_fn_in_trait)]
    async fn create_database(&self, options: Option<RequestOptions>) -> Result<bool>;

    /// Deletes the configured database and everything in it.
    ///
    /// # Arguments
    ///
    /// * `confirmation` - Must name the configured database id.
    /// * `options` - Optional parameters for the request.
    #[allow(async_fn_in_trait)]
    async fn delete_database(
        &self,
        confirmation: &Confirmation,
        options: Option<RequestOptions>,
    ) -> Result<()>;

    /// Creates a container partitioned on `partition_key_path`, provisioned with the
    /// configured initial throughput. Returns `false` if it already existed.
    ///
    /// Fails with [`ErrorKind::Conflict`] if the container exists with a different
    /// partition key path.
    #[allow(async_fn_in_trait)]
    async fn create_container(
        &self,
        container_id: &str,
        partition_key_path: &str,
        options: Option<RequestOptions>,
    ) -> Result<bool>;

    /// Inserts a new item. The partition key is read from the item at the container's
    /// partition key path.
    ///
    /// Fails with [`ErrorKind::Conflict`] if an item with the same id exists in the partition.
    #[allow(async_fn_in_trait)]
    async fn create_item<T: Serialize>(
        &self,
        container_id: &str,
        item: &T,
        options: Option<RequestOptions>,
    ) -> Result<()>;

    /// Inserts the item, or replaces the existing item with the same id and partition key.
    #[allow(async_fn_in_trait)]
    async fn upsert_item<T: Serialize>(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item: &T,
        options: Option<RequestOptions>,
    ) -> Result<()>;

    /// Reads one item by id and partition key.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn doc(client: azure_data_cosmos_store::CosmosStoreClient) -> azure_data_cosmos_store::Result<()> {
    /// use azure_data_cosmos_store::CosmosStoreClientMethods;
    ///
    /// #[derive(serde::Deserialize)]
    /// struct Article {
    ///     id: String,
    ///     author: String,
    /// }
    ///
    /// let article: Article = client.read_item("articles", "alice", "hello-world", None).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[allow(async_fn_in_trait)]
    async fn read_item<T: DeserializeOwned>(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<T>;

    /// Reads an item by id without knowing its partition key.
    ///
    /// This runs a cross-partition query and costs more than [`read_item`](Self::read_item).
    #[allow(async_fn_in_trait)]
    async fn read_item_cross_partition<T: DeserializeOwned>(
        &self,
        container_id: &str,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<T>;

    #[allow(async_fn_in_trait)]
    async fn delete_item(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<()>;

    /// Deletes every item in the container, best effort.
    ///
    /// Items are listed with a cross-partition query and deleted concurrently, bounded by
    /// the configured connection limit. Items deleted by someone else in the meantime are
    /// counted in [`DeleteAllSummary::already_deleted`]. Items with no value at the partition
    /// key path are deleted from the undefined partition. If any delete fails, the error is [`ErrorKind::PartialFailure`] with every
    /// failure; successful deletes are not rolled back.
    #[allow(async_fn_in_trait)]
    async fn delete_all_items(
        &self,
        container_id: &str,
        confirmation: &Confirmation,
        options: Option<RequestOptions>,
    ) -> Result<DeleteAllSummary>;

    /// Executes a query and returns every result, following continuations to the end.
    ///
    /// # Arguments
    ///
    /// * `query` - The query to execute. Anything that converts [`Into`] a [`Query`] works.
    /// * `partition_key` - Scopes the query to one partition. `None` queries all partitions,
    ///   which is refused with [`ErrorKind::UnsupportedQuery`] for aggregate queries.
    /// * `options` - Optional parameters for the request.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn doc(client: azure_data_cosmos_store::CosmosStoreClient) -> azure_data_cosmos_store::Result<()> {
    /// use azure_data_cosmos_store::{CosmosStoreClientMethods, Query};
    ///
    /// let query = Query::from("SELECT * FROM c WHERE c.author = @author")
    ///     .with_parameter("@author", "alice")?;
    /// let articles: Vec<serde_json::Value> = client.query_items("articles", query, None, None).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[allow(async_fn_in_trait)]
    async fn query_items<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<Vec<T>>;

    /// Executes a query expected to produce a single value, such as `SELECT VALUE COUNT(1) FROM c`.
    ///
    /// Fails with [`ErrorKind::EmptyResult`] when the query produces no rows.
    ///
    /// Aggregates (`COUNT`, `SUM`, `AVG`, `MIN`, `MAX`) must be scoped to a partition key.
    /// Across partitions the gateway either rejects them or answers with one partial result
    /// per partition range, and combining those needs a query plan this client does not
    /// request. Such queries fail with [`ErrorKind::UnsupportedQuery`] before any round
    /// trip; run one query per partition and combine the results instead.
    #[allow(async_fn_in_trait)]
    async fn query_scalar<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<T>;

    /// Starts a query whose pages are fetched on demand.
    ///
    /// Fails with [`ErrorKind::UnsupportedQuery`] for an aggregate query without a partition key.
    fn query_iterator<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<QueryIterator<T>>;

    /// Returns a snapshot of the client's settings and accumulated request charge.
    fn diagnostics(&self) -> DiagnosticsReport;
}

#[derive(Debug)]
struct Connected {
    pipeline: StorePipeline,
    preferred_regions: Vec<String>,
    service_endpoint: String,
}

/// A client for one database in a Cosmos DB account.
///
/// Create one client per process and share it; it holds a single connection that is safe
/// to use from concurrent tasks. Call [`init`](CosmosStoreClientMethods::init) once before
/// any other operation; until then operations fail with [`ErrorKind::NotInitialized`].
#[derive(Debug)]
pub struct CosmosStoreClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    accountant: Arc<CostAccountant>,
    region_resolver: RegionResolver,
    connected: OnceCell<Connected>,
    partition_key_paths: RwLock<HashMap<String, String>>,
}

impl CosmosStoreClient {
    /// Creates a new, uninitialized client.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated connection settings, see [`ClientConfig`].
    /// * `options` - Optional overrides for the connector, cost accountant and region resolver.
    pub fn new(config: ClientConfig, options: Option<CosmosStoreClientOptions>) -> Self {
        let options = options.unwrap_or_default();
        Self {
            config,
            connector: options
                .connector
                .unwrap_or_else(|| Arc::new(GatewayConnector::new())),
            accountant: options.cost_accountant.unwrap_or_default(),
            region_resolver: options.region_resolver.unwrap_or_default(),
            connected: OnceCell::new(),
            partition_key_paths: RwLock::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The accountant every successful round trip is charged to.
    pub fn cost_accountant(&self) -> &Arc<CostAccountant> {
        &self.accountant
    }

    pub fn is_initialized(&self) -> bool {
        self.connected.is_initialized()
    }

    fn pipeline(&self) -> Result<&StorePipeline> {
        self.connected
            .get()
            .map(|connected| &connected.pipeline)
            .ok_or_else(|| Error::new(ErrorKind::NotInitialized))
    }

    async fn connect(&self) -> Result<Connected> {
        let (account, readable_regions) = self
            .region_resolver
            .available_readable_regions(self.connector.as_ref(), &self.config)
            .await?;
        let read_region = self.region_resolver.nearest_read_region(&readable_regions)?;
        let preferred_regions = vec![read_region];

        let connection = self
            .connector
            .connect(&self.config, &account, &preferred_regions)?;
        let service_endpoint = connection.write_endpoint();
        info!(
            database = %self.config.database_id,
            current_region = %self.region_resolver.current_region(),
            preferred_regions = ?preferred_regions,
            service_endpoint = %service_endpoint,
            "store client initialized"
        );

        Ok(Connected {
            pipeline: StorePipeline::new(
                connection,
                RetryPolicy::new(self.config.retry),
                Arc::clone(&self.accountant),
            ),
            preferred_regions,
            service_endpoint,
        })
    }

    fn cached_partition_key_path(&self, container_id: &str) -> Option<String> {
        self.partition_key_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container_id)
            .cloned()
    }

    fn remember_partition_key_path(&self, container_id: &str, path: &str) {
        self.partition_key_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(container_id.to_string(), path.to_string());
    }

    fn forget_partition_key_paths(&self) {
        self.partition_key_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn read_container(
        &self,
        container_id: &str,
        options: &RequestOptions,
    ) -> Result<ContainerProperties> {
        let response = self
            .pipeline()?
            .send(
                OperationContext::new("read_container").container(container_id),
                options,
                move |connection| async move { connection.read_container(container_id).await },
            )
            .await?;
        Ok(response.value)
    }

    /// The container's partition key path, read from the store on first use.
    async fn partition_key_path(
        &self,
        container_id: &str,
        options: &RequestOptions,
    ) -> Result<String> {
        if let Some(path) = self.cached_partition_key_path(container_id) {
            return Ok(path);
        }
        let properties = self.read_container(container_id, options).await?;
        let path = properties.partition_key_path().to_string();
        self.remember_partition_key_path(container_id, &path);
        Ok(path)
    }

    /// Deletes one item listed by `delete_all_items`, reporting a failure instead of an error.
    async fn delete_listed_item(&self, container_id: &str, key: ItemKey) -> DeleteOutcome {
        let partition_key = match key.partition_key.map(PartitionKey::try_from) {
            None => PartitionKey::undefined(),
            Some(Ok(partition_key)) => partition_key,
            Some(Err(error)) => {
                return DeleteOutcome::Failed(ItemFailure {
                    id: key.id,
                    partition_key: PartitionKey::NULL,
                    error,
                })
            }
        };
        match self
            .delete_item(container_id, partition_key.clone(), &key.id, None)
            .await
        {
            Ok(()) => DeleteOutcome::Deleted,
            Err(error) if matches!(error.kind(), ErrorKind::NotFound) => {
                debug!(
                    container = container_id,
                    id = %key.id,
                    %partition_key,
                    "item already deleted"
                );
                DeleteOutcome::AlreadyDeleted
            }
            Err(error) => DeleteOutcome::Failed(ItemFailure {
                id: key.id,
                partition_key,
                error,
            }),
        }
    }
}

impl CosmosStoreClientMethods for CosmosStoreClient {
    async fn init(&self, options: Option<RequestOptions>) -> Result<()> {
        let options = options.unwrap_or_default();
        options
            .run(self.connected.get_or_try_init(|| self.connect()))
            .await?;
        Ok(())
    }

    async fn create_database(&self, options: Option<RequestOptions>) -> Result<bool> {
        let options = options.unwrap_or_default();
        let response = self
            .pipeline()?
            .send(
                OperationContext::new("create_database"),
                &options,
                |connection| async move { connection.create_database_if_not_exists().await },
            )
            .await?;
        if response.value {
            info!(database = %self.config.database_id, "created database");
        }
        Ok(response.value)
    }

    async fn delete_database(
        &self,
        confirmation: &Confirmation,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        confirmation.verify(&self.config.database_id)?;
        let options = options.unwrap_or_default();
        self.pipeline()?
            .send(
                OperationContext::new("delete_database"),
                &options,
                |connection| async move { connection.delete_database().await },
            )
            .await?;
        self.forget_partition_key_paths();
        warn!(database = %self.config.database_id, "deleted database");
        Ok(())
    }

    async fn create_container(
        &self,
        container_id: &str,
        partition_key_path: &str,
        options: Option<RequestOptions>,
    ) -> Result<bool> {
        let options = options.unwrap_or_default();
        let context = OperationContext::new("create_container").container(container_id);
        let properties = ContainerProperties::new(container_id, partition_key_path);
        let throughput = ThroughputProperties::manual(self.config.initial_throughput);

        let properties_ref = &properties;
        let created = self
            .pipeline()?
            .send(context.clone(), &options, move |connection| async move {
                connection
                    .create_container_if_not_exists(properties_ref, throughput)
                    .await
            })
            .await?
            .value;

        if created {
            info!(
                container = container_id,
                partition_key_path = properties.partition_key_path(),
                throughput = throughput.throughput(),
                "created container"
            );
        } else {
            let existing = self.read_container(container_id, &options).await?;
            if existing.partition_key_path() != properties.partition_key_path() {
                return Err(Error::message(
                    ErrorKind::Conflict,
                    format!(
                        "container exists with partition key path '{}'",
                        existing.partition_key_path()
                    ),
                )
                .with_context(context));
            }
        }
        self.remember_partition_key_path(container_id, properties.partition_key_path());
        Ok(created)
    }

    async fn create_item<T: Serialize>(
        &self,
        container_id: &str,
        item: &T,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        let options = options.unwrap_or_default();
        let context = OperationContext::new("create_item").container(container_id);
        let pipeline = self.pipeline()?;
        let document = serde_json::to_value(item)
            .map_err(|e| Error::from(e).with_context(context.clone()))?;
        let item_id = document_id(&document).map_err(|e| e.with_context(context.clone()))?;
        let path = self.partition_key_path(container_id, &options).await?;
        let partition_key = PartitionKey::from_document(&document, &path)
            .map_err(|e| e.with_context(context.clone().item(&item_id)))?;

        let context = context.item(&item_id).partition_key(&partition_key);
        let partition_key = &partition_key;
        pipeline
            .send(context, &options, move |connection| {
                let document = document.clone();
                async move {
                    connection
                        .create_item(container_id, partition_key, document)
                        .await
                }
            })
            .await?;
        Ok(())
    }

    async fn upsert_item<T: Serialize>(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item: &T,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        let options = options.unwrap_or_default();
        let partition_key = partition_key.into();
        let context = OperationContext::new("upsert_item")
            .container(container_id)
            .partition_key(&partition_key);
        let pipeline = self.pipeline()?;
        let document = serde_json::to_value(item)
            .map_err(|e| Error::from(e).with_context(context.clone()))?;
        let item_id = document_id(&document).map_err(|e| e.with_context(context.clone()))?;

        let partition_key = &partition_key;
        pipeline
            .send(context.item(&item_id), &options, move |connection| {
                let document = document.clone();
                async move {
                    connection
                        .upsert_item(container_id, partition_key, document)
                        .await
                }
            })
            .await?;
        Ok(())
    }

    async fn read_item<T: DeserializeOwned>(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<T> {
        let options = options.unwrap_or_default();
        let partition_key = partition_key.into();
        let context = OperationContext::new("read_item")
            .container(container_id)
            .item(item_id)
            .partition_key(&partition_key);

        let partition_key = &partition_key;
        let response = self
            .pipeline()?
            .send(context.clone(), &options, move |connection| async move {
                connection
                    .read_item(container_id, partition_key, item_id)
                    .await
            })
            .await?;
        serde_json::from_value(response.value).map_err(|e| Error::from(e).with_context(context))
    }

    async fn read_item_cross_partition<T: DeserializeOwned>(
        &self,
        container_id: &str,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<T> {
        let context = OperationContext::new("read_item_cross_partition")
            .container(container_id)
            .item(item_id);
        let query = Query::from("SELECT * FROM c WHERE c.id = @id").with_parameter("@id", item_id)?;
        let options = QueryOptions {
            request: options.unwrap_or_default(),
            ..Default::default()
        };
        let mut items: Vec<T> = self
            .query_items(container_id, query, None, Some(options))
            .await
            .map_err(|error| error.in_context(context.clone()))?;
        if items.len() > 1 {
            warn!(
                container = container_id,
                id = item_id,
                matches = items.len(),
                "id exists in several partitions; returning the first match"
            );
        }
        if items.is_empty() {
            return Err(Error::new(ErrorKind::NotFound).with_context(context));
        }
        Ok(items.swap_remove(0))
    }

    async fn delete_item(
        &self,
        container_id: &str,
        partition_key: impl Into<PartitionKey>,
        item_id: &str,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        let options = options.unwrap_or_default();
        let partition_key = partition_key.into();
        let context = OperationContext::new("delete_item")
            .container(container_id)
            .item(item_id)
            .partition_key(&partition_key);

        let partition_key = &partition_key;
        self.pipeline()?
            .send(context, &options, move |connection| async move {
                connection
                    .delete_item(container_id, partition_key, item_id)
                    .await
            })
            .await?;
        Ok(())
    }

    async fn delete_all_items(
        &self,
        container_id: &str,
        confirmation: &Confirmation,
        options: Option<RequestOptions>,
    ) -> Result<DeleteAllSummary> {
        confirmation.verify(container_id)?;
        let options = options.unwrap_or_default();
        let context = OperationContext::new("delete_all_items").container(container_id);

        let delete_all = async {
            let path = self.partition_key_path(container_id, &options).await?;
            let query = Query::from(format!(
                "SELECT c.id, {} AS partitionKey FROM c",
                partition_key_projection(&path)?
            ));
            let keys: Vec<ItemKey> = self.query_items(container_id, query, None, None).await?;
            let attempted = keys.len();

            let outcomes: Vec<DeleteOutcome> = futures::stream::iter(keys)
                .map(|key| self.delete_listed_item(container_id, key))
                .buffer_unordered(self.config.max_connection_limit.max(1))
                .collect()
                .await;

            let mut summary = DeleteAllSummary {
                attempted,
                deleted: 0,
                already_deleted: 0,
            };
            let mut failures = Vec::new();
            for outcome in outcomes {
                match outcome {
                    DeleteOutcome::Deleted => summary.deleted += 1,
                    DeleteOutcome::AlreadyDeleted => summary.already_deleted += 1,
                    DeleteOutcome::Failed(failure) => failures.push(failure),
                }
            }

            info!(
                container = container_id,
                attempted,
                deleted = summary.deleted,
                already_deleted = summary.already_deleted,
                failed = failures.len(),
                "deleted all items"
            );
            if failures.is_empty() {
                Ok(summary)
            } else {
                Err(Error::new(ErrorKind::PartialFailure {
                    attempted,
                    failures,
                }))
            }
        };

        options
            .run(delete_all)
            .await
            .map_err(|error| error.with_context(context))
    }

    async fn query_items<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<Vec<T>> {
        let options = options.unwrap_or_default();
        let request = options.request.clone();
        let iterator = self.query_iterator(container_id, query, partition_key, Some(options))?;
        let (items, request_charge) = request.run(collect_all(iterator)).await?;
        debug!(
            container = container_id,
            items = items.len(),
            request_charge,
            "query completed"
        );
        Ok(items)
    }

    async fn query_scalar<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<T> {
        let context = OperationContext::new("query_scalar").container(container_id);
        let mut values: Vec<T> = self
            .query_items(container_id, query, partition_key, options)
            .await
            .map_err(|error| error.in_context(context.clone()))?;
        if values.is_empty() {
            return Err(Error::new(ErrorKind::EmptyResult).with_context(context));
        }
        Ok(values.swap_remove(0))
    }

    fn query_iterator<T: DeserializeOwned>(
        &self,
        container_id: &str,
        query: impl Into<Query>,
        partition_key: Option<PartitionKey>,
        options: Option<QueryOptions>,
    ) -> Result<QueryIterator<T>> {
        let pipeline = self.pipeline()?.clone();
        let query = query.into();
        if let (Some(aggregate), None) = (query.aggregate(), &partition_key) {
            return Err(Error::new(ErrorKind::UnsupportedQuery(format!(
                "{aggregate} across partitions needs a partition key"
            )))
            .with_context(OperationContext::new("query_items").container(container_id)));
        }
        Ok(QueryIterator::new(
            pipeline,
            container_id.to_string(),
            query,
            partition_key,
            options.unwrap_or_default(),
        ))
    }

    fn diagnostics(&self) -> DiagnosticsReport {
        let connected = self.connected.get();
        DiagnosticsReport {
            deployment: DiagnosticsReport::deployment_from_env(),
            current_region: self.region_resolver.current_region().to_string(),
            request_charge: self.accountant.total(),
            endpoint: self.config.endpoint.to_string(),
            service_endpoint: connected.map(|c| c.service_endpoint.clone()),
            consistency_level: self.config.consistency_level,
            connection_mode: self.config.connection_mode,
            max_connection_limit: self.config.max_connection_limit,
            preferred_regions: connected
                .map(|c| c.preferred_regions.clone())
                .unwrap_or_default(),
        }
    }
}

/// The id and partition key of an item, as projected by `delete_all_items`.
#[derive(Debug, Deserialize)]
struct ItemKey {
    id: String,
    /// `None` when the item has no value at the partition key path, so the projection
    /// omits the field. An explicit `null` is `Some(Value::Null)`.
    #[serde(rename = "partitionKey", default, deserialize_with = "present")]
    partition_key: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
    Failed(ItemFailure),
}

fn document_id(document: &Value) -> Result<String> {
    match document.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(Error::message(
            ErrorKind::DataConversion,
            "item must have a non-empty string 'id'",
        )),
    }
}

/// Builds the query expression selecting the value at a partition key path, e.g.
/// `/address/city` becomes `c["address"]["city"]`.
fn partition_key_projection(path: &str) -> Result<String> {
    let projection: String = path_segments(path)
        .map(|segment| format!("[{}]", Value::from(segment)))
        .collect();
    if projection.is_empty() {
        return Err(Error::new(ErrorKind::Configuration(format!(
            "invalid partition key path '{path}'"
        ))));
    }
    Ok(format!("c{projection}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_must_match_target() {
        assert!(Confirmation::new("articles").verify("articles").is_ok());
        let err = Confirmation::new("article").verify("articles").unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::ConfirmationRequired { expected } if expected == "articles"
        ));
    }

    #[test]
    fn projects_nested_partition_key_paths() {
        assert_eq!(partition_key_projection("/author").unwrap(), r#"c["author"]"#);
        assert_eq!(
            partition_key_projection("/address/city").unwrap(),
            r#"c["address"]["city"]"#
        );
        assert_eq!(
            partition_key_projection(r#"/we"ird"#).unwrap(),
            r#"c["we\"ird"]"#
        );
        assert!(partition_key_projection("/").is_err());
    }

    #[test]
    fn documents_need_string_ids() {
        assert_eq!(
            document_id(&serde_json::json!({"id": "a"})).unwrap(),
            "a"
        );
        assert!(document_id(&serde_json::json!({"id": 1})).is_err());
        assert!(document_id(&serde_json::json!({"id": ""})).is_err());
        assert!(document_id(&serde_json::json!({})).is_err());
    }

    #[test]
    fn item_keys_tell_missing_partition_keys_from_null() {
        let key: ItemKey = serde_json::from_value(serde_json::json!({"id": "a"})).unwrap();
        assert_eq!(key.partition_key, None);
        let key: ItemKey =
            serde_json::from_value(serde_json::json!({"id": "a", "partitionKey": null})).unwrap();
        assert_eq!(key.partition_key, Some(Value::Null));
    }
}
