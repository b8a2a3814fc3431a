// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::fmt;

/// Errors that can occur when parsing session tokens.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Error {
    /// The input string is empty.
    EmptyInput,
    /// The token lacks the partition key range id, version or global LSN.
    MissingComponents,
    /// A numeric component could not be parsed.
    InvalidNumber(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "session token is empty"),
            Error::MissingComponents => {
                write!(f, "session token is missing required components")
            }
            Error::InvalidNumber(s) => write!(f, "invalid number in session token: '{}'", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for crate::Error {
    fn from(error: Error) -> Self {
        crate::Error::full(
            crate::ErrorKind::DataConversion,
            error,
            "session token invalid",
        )
    }
}
