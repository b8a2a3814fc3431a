// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Error types returned by every store operation.

use std::{fmt, time::Duration};

use crate::PartitionKey;

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of failure reported by the store client.
///
/// Callers should match on [`Error::kind()`] rather than on the error message.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A point read or delete targeted an id and partition key that do not exist.
    #[error("resource not found")]
    NotFound,

    /// A create targeted an id that already exists in the partition.
    #[error("resource already exists")]
    Conflict,

    /// The store throttled the request and the retry budget was exhausted.
    #[error("request rate too large")]
    RateLimited {
        /// The back-off the store asked for on the last attempt, if any.
        retry_after: Option<Duration>,
    },

    /// A scalar query produced no rows.
    #[error("query returned no results")]
    EmptyResult,

    /// The query needs execution planning the gateway cannot do on the client's behalf.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Startup settings are missing or invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A bulk operation completed with per-item failures.
    #[error("{} of {attempted} item operations failed", failures.len())]
    PartialFailure {
        /// How many item operations were issued.
        attempted: usize,
        /// The items that could not be processed, with the reason.
        failures: Vec<ItemFailure>,
    },

    /// An operation was issued before [`CosmosStoreClient::init()`](crate::CosmosStoreClient::init()) completed.
    #[error("the client has not been initialized")]
    NotInitialized,

    /// A destructive operation was attempted without naming its target.
    #[error("confirmation does not match '{expected}'")]
    ConfirmationRequired {
        /// The identifier the confirmation must match.
        expected: String,
    },

    /// The caller's stop token fired before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation did not complete within the caller's timeout.
    #[error("operation timed out")]
    Timeout,

    /// The store or the network was temporarily unavailable.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// The store answered with an unexpected HTTP status.
    #[error("HTTP {status}{}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    HttpResponse {
        status: u16,
        /// The store's error code from the response body, if present.
        code: Option<String>,
    },

    /// A payload could not be converted to or from JSON.
    #[error("data conversion failed")]
    DataConversion,

    /// A local I/O operation failed.
    #[error("I/O failure")]
    Io,
}

/// One failed item inside a [`ErrorKind::PartialFailure`].
#[derive(Debug)]
pub struct ItemFailure {
    pub id: String,
    pub partition_key: PartitionKey,
    pub error: Error,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.partition_key, self.error)
    }
}

/// Describes the operation an error came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationContext {
    pub operation: &'static str,
    pub container_id: Option<String>,
    pub item_id: Option<String>,
    pub partition_key: Option<PartitionKey>,
}

impl OperationContext {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            ..Default::default()
        }
    }

    pub(crate) fn container(mut self, container_id: &str) -> Self {
        self.container_id = Some(container_id.to_string());
        self
    }

    pub(crate) fn item(mut self, item_id: &str) -> Self {
        self.item_id = Some(item_id.to_string());
        self
    }

    pub(crate) fn partition_key(mut self, partition_key: &PartitionKey) -> Self {
        self.partition_key = Some(partition_key.clone());
        self
    }
}

impl fmt::Display for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(container_id) = &self.container_id {
            write!(f, " container={container_id}")?;
        }
        if let Some(item_id) = &self.item_id {
            write!(f, " id={item_id}")?;
        }
        if let Some(partition_key) = &self.partition_key {
            write!(f, " partition_key={partition_key}")?;
        }
        Ok(())
    }
}

/// An error returned by the store client.
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    context: Option<OperationContext>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: None,
            source: None,
        }
    }

    /// Creates an error with a human-readable detail message.
    pub fn message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(kind)
        }
    }

    /// Creates an error that wraps the underlying cause.
    pub fn full<E>(kind: ErrorKind, source: E, message: impl Into<String>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: Some(message.into()),
            source: Some(Box::new(source)),
            ..Self::new(kind)
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The operation this error was raised by, when known.
    pub fn context(&self) -> Option<&OperationContext> {
        self.context.as_ref()
    }

    /// Attaches operation context, keeping any context that is already present.
    pub(crate) fn with_context(mut self, context: OperationContext) -> Self {
        if self.context.is_none() {
            self.context = Some(context);
        }
        self
    }

    /// Replaces the operation context, for operations composed from other operations.
    pub(crate) fn in_context(mut self, context: OperationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether the store asked the caller to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    pub fn http_status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::NotFound => Some(404),
            ErrorKind::Conflict => Some(409),
            ErrorKind::RateLimited { .. } => Some(429),
            ErrorKind::HttpResponse { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::full(ErrorKind::DataConversion, error, "invalid JSON payload")
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Self::full(
            ErrorKind::Configuration(error.to_string()),
            error,
            "invalid endpoint URL",
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::full(ErrorKind::Io, error, "I/O failure")
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() || error.is_connect() || error.is_request() {
            ErrorKind::ServiceUnavailable
        } else if error.is_decode() {
            ErrorKind::DataConversion
        } else {
            ErrorKind::Io
        };
        Self::full(kind, error, "HTTP transport failure")
    }
}
