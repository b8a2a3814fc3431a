// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{fmt, future::Future, time::Duration};

use stop_token::{future::FutureExt as _, StopToken};

use crate::{Error, ErrorKind, Result};

/// Options accepted by every store operation.
///
/// By default an operation runs to completion. A [`StopToken`] cancels it when its
/// `StopSource` is dropped, and a timeout bounds its total duration, including any
/// retry back-off.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub stop_token: Option<StopToken>,
    pub timeout: Option<Duration>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("cancellable", &self.stop_token.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RequestOptions {
    /// Creates a new [`RequestOptionsBuilder`] that can be used to construct a [`RequestOptions`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// let options = azure_data_cosmos_store::RequestOptions::builder()
    ///     .with_timeout(Duration::from_secs(5))
    ///     .build();
    /// assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    /// ```
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    /// Runs `future` under this option's stop token and timeout.
    pub(crate) async fn run<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        let bounded = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, future)
                    .await
                    .map_err(|_| Error::new(ErrorKind::Timeout))?,
                None => future.await,
            }
        };
        match &self.stop_token {
            Some(token) => bounded
                .timeout_at(token.clone())
                .await
                .map_err(|_| Error::new(ErrorKind::Cancelled))?,
            None => bounded.await,
        }
    }
}

/// Builder used to construct a [`RequestOptions`].
///
/// Obtain a [`RequestOptionsBuilder`] by calling [`RequestOptions::builder()`]
#[derive(Default)]
pub struct RequestOptionsBuilder(RequestOptions);

impl RequestOptionsBuilder {
    /// Cancels the operation when the token's source is dropped.
    pub fn with_stop_token(&mut self, stop_token: StopToken) -> &mut Self {
        self.0.stop_token = Some(stop_token);
        self
    }

    /// Fails the operation with [`ErrorKind::Timeout`] after `timeout`.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.0.timeout = Some(timeout);
        self
    }

    /// Builds a [`RequestOptions`] from the builder.
    ///
    /// This does not consume the builder, and can be called multiple times.
    pub fn build(&self) -> RequestOptions {
        self.0.clone()
    }
}

/// Options for query operations.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub request: RequestOptions,

    /// An upper bound on items per page. The store picks the page size when `None`.
    pub max_item_count: Option<u32>,
}
