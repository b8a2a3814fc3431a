// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::models::SystemProperties;

/// Properties of a container: its id and the partition-key path fixed at creation.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    pub id: String,
    pub partition_key: PartitionKeyDefinition,
    #[serde(flatten)]
    pub system_properties: SystemProperties,
}

impl ContainerProperties {
    pub fn new(id: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: PartitionKeyDefinition::from(partition_key_path.into()),
            system_properties: SystemProperties::default(),
        }
    }

    /// The single partition-key path, e.g. `/author`.
    pub fn partition_key_path(&self) -> &str {
        self.partition_key
            .paths
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// How documents in a container are distributed across partitions.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "Hash".to_string()
}

impl Default for PartitionKeyDefinition {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            kind: default_kind(),
        }
    }
}

impl From<String> for PartitionKeyDefinition {
    fn from(path: String) -> Self {
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            paths: vec![path],
            kind: default_kind(),
        }
    }
}

impl From<&str> for PartitionKeyDefinition {
    fn from(path: &str) -> Self {
        Self::from(path.to_string())
    }
}
