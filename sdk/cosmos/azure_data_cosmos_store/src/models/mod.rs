// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Model types sent to and received from the store.

mod account_properties;
mod container_properties;
mod throughput_properties;

pub use account_properties::*;
pub use container_properties::*;
pub use throughput_properties::*;

use serde::{Deserialize, Serialize};

/// Common system properties returned for most resources.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq)]
pub struct SystemProperties {
    /// The resource's etag, used for optimistic concurrency.
    #[serde(default)]
    #[serde(skip_serializing)]
    #[serde(rename = "_etag")]
    pub etag: Option<String>,

    /// The internal resource id.
    #[serde(default)]
    #[serde(skip_serializing)]
    #[serde(rename = "_rid")]
    pub resource_id: Option<String>,

    /// The last-modified timestamp, in seconds since the Unix epoch.
    #[serde(default)]
    #[serde(skip_serializing)]
    #[serde(rename = "_ts")]
    pub last_modified: Option<u64>,
}
