// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Clients used to communicate with the document store.

mod cosmos_store_client;

pub use cosmos_store_client::{
    Confirmation, CosmosStoreClient, CosmosStoreClientMethods, DeleteAllSummary,
};
