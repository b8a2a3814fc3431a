// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::marker::PhantomData;

use futures::Stream;
use serde::de::DeserializeOwned;

use crate::{
    connection::QueryPageRequest, pipeline::StorePipeline, OperationContext, PartitionKey, Query,
    QueryOptions, Result,
};

/// Where a query left off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub has_more: bool,
    /// The opaque continuation returned with the last page.
    pub continuation: Option<String>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            has_more: true,
            continuation: None,
        }
    }
}

/// One page of typed query results.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPage<T> {
    items: Vec<T>,
    request_charge: f64,
}

impl<T> QueryPage<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// The cost of the round trip that produced this page.
    pub fn request_charge(&self) -> f64 {
        self.request_charge
    }
}

/// Drives a query across pages, one round trip per [`next_page`](Self::next_page).
///
/// The iterator owns its cursor; it is not `Clone` and `next_page` takes `&mut self`, so
/// one cursor is never shared between concurrent consumers. The store decides the page
/// size, so callers must not assume any particular number of items per page.
pub struct QueryIterator<T> {
    pipeline: StorePipeline,
    container_id: String,
    query: Query,
    partition_key: Option<PartitionKey>,
    options: QueryOptions,
    state: CursorState,
    phantom: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QueryIterator<T> {
    pub(crate) fn new(
        pipeline: StorePipeline,
        container_id: String,
        query: Query,
        partition_key: Option<PartitionKey>,
        options: QueryOptions,
    ) -> Self {
        Self {
            pipeline,
            container_id,
            query,
            partition_key,
            options,
            state: CursorState::default(),
            phantom: PhantomData,
        }
    }

    /// Whether another page may be fetched.
    pub fn has_more(&self) -> bool {
        self.state.has_more
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Fetches the next page, or returns `None` once the query is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<QueryPage<T>>> {
        if !self.state.has_more {
            return Ok(None);
        }

        let request = QueryPageRequest {
            query: self.query.clone(),
            partition_key: self.partition_key.clone(),
            continuation: self.state.continuation.clone(),
            max_item_count: self.options.max_item_count,
        };
        let mut context = OperationContext::new("query_items").container(&self.container_id);
        if let Some(partition_key) = &self.partition_key {
            context = context.partition_key(partition_key);
        }

        let container_id = self.container_id.as_str();
        let request = &request;
        let response = self
            .pipeline
            .send(context.clone(), &self.options.request, move |connection| async move {
                connection.query_items(container_id, request).await
            })
            .await?;

        let page = response.value;
        let items = page
            .items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| crate::Error::from(e).with_context(context))?;

        self.state = CursorState {
            has_more: page.continuation.is_some(),
            continuation: page.continuation,
        };
        Ok(Some(QueryPage {
            items,
            request_charge: response.request_charge,
        }))
    }

    /// Converts the iterator into a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<QueryPage<T>>> {
        futures::stream::try_unfold(self, |mut iterator| async move {
            Ok(iterator.next_page().await?.map(|page| (page, iterator)))
        })
    }
}
