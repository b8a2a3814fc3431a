// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{future::Future, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    connection::{StoreConnection, StoreResponse},
    retry::RetryPolicy,
    CostAccountant, OperationContext, RequestOptions, Result,
};

/// Sends every round trip through the shared connection.
///
/// The pipeline retries throttled and transiently failed attempts, applies the caller's
/// cancellation and timeout, records the charge of each success, and attaches operation
/// context to failures.
#[derive(Clone, Debug)]
pub(crate) struct StorePipeline {
    connection: Arc<dyn StoreConnection>,
    retry_policy: RetryPolicy,
    accountant: Arc<CostAccountant>,
}

impl StorePipeline {
    pub fn new(
        connection: Arc<dyn StoreConnection>,
        retry_policy: RetryPolicy,
        accountant: Arc<CostAccountant>,
    ) -> Self {
        Self {
            connection,
            retry_policy,
            accountant,
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or the retry budget is spent.
    ///
    /// `operation` is invoked once per attempt with the shared connection.
    pub async fn send<T, F, Fut>(
        &self,
        context: OperationContext,
        options: &RequestOptions,
        mut operation: F,
    ) -> Result<StoreResponse<T>>
    where
        F: FnMut(Arc<dyn StoreConnection>) -> Fut,
        Fut: Future<Output = Result<StoreResponse<T>>>,
    {
        let attempts = async {
            let mut attempt = 0;
            let mut waited = Duration::ZERO;
            loop {
                match operation(Arc::clone(&self.connection)).await {
                    Ok(response) => {
                        self.accountant.add(response.request_charge);
                        debug!(
                            operation = context.operation,
                            container = context.container_id.as_deref().unwrap_or_default(),
                            request_charge = response.request_charge,
                            "round trip completed"
                        );
                        return Ok(response);
                    }
                    Err(error) => match self.retry_policy.next_delay(&error, attempt, waited) {
                        Some(delay) => {
                            warn!(
                                operation = context.operation,
                                attempt = attempt + 1,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                            waited += delay;
                            attempt += 1;
                        }
                        None => return Err(error),
                    },
                }
            }
        };

        options
            .run(attempts)
            .await
            .map_err(|error| error.with_context(context.clone()))
    }
}
