// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::{connection::Connector, CostAccountant, RegionResolver};

/// Options used when constructing a [`CosmosStoreClient`](crate::CosmosStoreClient).
///
/// Every field falls back to a production default: the HTTPS gateway connector, a fresh
/// cost accountant, and a region resolver reading the deployment environment.
#[derive(Clone, Debug, Default)]
pub struct CosmosStoreClientOptions {
    pub connector: Option<Arc<dyn Connector>>,

    /// Shares one request-charge total between several clients.
    pub cost_accountant: Option<Arc<CostAccountant>>,

    pub region_resolver: Option<RegionResolver>,
}
