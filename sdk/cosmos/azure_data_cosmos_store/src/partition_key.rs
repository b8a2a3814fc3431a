// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, ErrorKind};

/// The value of a document's partition key.
///
/// Containers in this client are keyed by a single partition-key path, so a partition key
/// is a single JSON scalar (a string, a number, a boolean or `null`) or
/// [`undefined`](PartitionKey::undefined) for items with no value at the path.
///
/// ```rust
/// use azure_data_cosmos_store::PartitionKey;
///
/// let by_author = PartitionKey::from("alice");
/// let by_year = PartitionKey::from(2024);
/// assert_eq!(by_author.to_string(), r#"["alice"]"#);
/// assert_eq!(by_year.to_string(), "[2024]");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(Value);

impl PartitionKey {
    /// A partition key whose value is JSON `null`.
    pub const NULL: PartitionKey = PartitionKey(Value::Null);

    /// Extracts the partition key from a document, following a `/a/b` style path.
    pub fn from_document(document: &Value, path: &str) -> crate::Result<Self> {
        let mut current = document;
        for segment in path_segments(path) {
            current = current.get(segment).ok_or_else(|| {
                Error::message(
                    ErrorKind::DataConversion,
                    format!("document has no value at partition key path '{path}'"),
                )
            })?;
        }
        Self::try_from(current.clone())
    }

    /// The partition holding items that have no value at the partition key path.
    ///
    /// The store addresses it as `[{}]`, which is a different partition from `[null]`.
    pub fn undefined() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(&self.0, Value::Object(map) if map.is_empty())
    }

    /// The raw JSON value; `{}` for the undefined partition.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// The value as sent in the `x-ms-documentdb-partitionkey` header: a one-element JSON array.
    pub fn header_value(&self) -> String {
        Value::Array(vec![self.0.clone()]).to_string()
    }
}

/// Splits a partition key path such as `/author` or `/address/city` into its segments.
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

impl TryFrom<Value> for PartitionKey {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(_) | Value::Object(_) => Err(Error::message(
                ErrorKind::DataConversion,
                "a partition key must be a string, number, boolean or null",
            )),
            scalar => Ok(Self(scalar)),
        }
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<&String> for PartitionKey {
    fn from(value: &String) -> Self {
        Self(Value::String(value.clone()))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<i32> for PartitionKey {
    fn from(value: i32) -> Self {
        Self(Value::from(value))
    }
}

impl From<bool> for PartitionKey {
    fn from(value: bool) -> Self {
        Self(Value::Bool(value))
    }
}

impl From<f64> for PartitionKey {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}
