// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

#![doc = include_str!("../README.md")]
// Docs.rs build is done with the nightly compiler, so we can enable nightly features in that build.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(docsrs, feature(doc_cfg_hide))]

pub mod clients;
mod config;
pub mod connection;
pub mod constants;
mod cost;
mod diagnostics;
mod error;
mod location_cache;
pub mod models;
mod options;
mod partition_key;
pub(crate) mod pipeline;
pub mod query;
mod region;
pub(crate) mod resource_context;
mod retry;
mod session;

#[doc(inline)]
pub use clients::{
    Confirmation, CosmosStoreClient, CosmosStoreClientMethods, DeleteAllSummary,
};

pub use config::{ClientConfig, ConnectionMode, ConsistencyLevel, RetryOptions};
pub use cost::CostAccountant;
pub use diagnostics::DiagnosticsReport;
pub use error::{Error, ErrorKind, ItemFailure, OperationContext, Result};
pub use options::*;
pub use partition_key::PartitionKey;
pub use query::{CursorState, Query, QueryIterator, QueryPage, QueryParameter};
pub use region::RegionResolver;
