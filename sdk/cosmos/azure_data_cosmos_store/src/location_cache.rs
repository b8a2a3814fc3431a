// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Maps preferred regions to regional endpoints.

use url::Url;

use crate::models::DatabaseAccount;

/// Whether a request reads or writes, which decides the endpoints it may go to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OperationType {
    Read,
    Write,
}

/// The endpoints requests are routed to, computed once when the connection is built.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LocationCache {
    default_endpoint: Url,
    write_endpoint: Url,
    /// Read endpoints in routing order: preferred regions first, then the remaining
    /// readable regions, then the account endpoint.
    read_endpoints: Vec<Url>,
}

impl LocationCache {
    pub fn new(default_endpoint: Url, account: &DatabaseAccount, preferred_regions: &[String]) -> Self {
        let write_endpoint = account
            .writable_locations
            .first()
            .map(|location| location.endpoint.clone())
            .unwrap_or_else(|| default_endpoint.clone());

        let mut read_endpoints: Vec<Url> = Vec::new();
        let mut push = |endpoint: &Url| {
            if !read_endpoints.contains(endpoint) {
                read_endpoints.push(endpoint.clone());
            }
        };
        for preferred in preferred_regions {
            if let Some(location) = account
                .readable_locations
                .iter()
                .find(|location| &location.name == preferred)
            {
                push(&location.endpoint);
            }
        }
        for location in &account.readable_locations {
            push(&location.endpoint);
        }
        push(&default_endpoint);

        Self {
            default_endpoint,
            write_endpoint,
            read_endpoints,
        }
    }

    /// The endpoints to try for an operation, in order.
    pub fn endpoints(&self, operation: OperationType) -> Vec<Url> {
        match operation {
            OperationType::Read => self.read_endpoints.clone(),
            OperationType::Write => {
                let mut endpoints = vec![self.write_endpoint.clone()];
                if self.write_endpoint != self.default_endpoint {
                    endpoints.push(self.default_endpoint.clone());
                }
                endpoints
            }
        }
    }

    pub fn write_endpoint(&self) -> &Url {
        &self.write_endpoint
    }
}
