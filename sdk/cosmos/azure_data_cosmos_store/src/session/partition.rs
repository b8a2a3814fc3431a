// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{fmt, str::FromStr};

use super::Error;

/// A partition-local session token: `{pkrange_id}:{version}#{global_lsn}[#{region}={lsn}...]`.
///
/// Only the range id and global LSN are interpreted; the rest is carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PartitionSessionToken {
    pub pkrange_id: String,
    pub global_lsn: u64,
    vector: String,
}

impl PartitionSessionToken {
    /// Whether this token has progressed at least as far as `other`.
    pub fn is_at_least(&self, other: &PartitionSessionToken) -> bool {
        self.global_lsn >= other.global_lsn
    }
}

impl FromStr for PartitionSessionToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::EmptyInput);
        }

        let (pkrange_id, vector) = s.split_once(':').ok_or(Error::MissingComponents)?;
        if pkrange_id.is_empty() || vector.is_empty() {
            return Err(Error::MissingComponents);
        }

        let mut components = vector.split('#');
        let version = components.next().ok_or(Error::MissingComponents)?;
        version
            .parse::<u64>()
            .map_err(|_| Error::InvalidNumber(version.to_string()))?;
        let global_lsn = components.next().ok_or(Error::MissingComponents)?;
        let global_lsn = global_lsn
            .parse::<u64>()
            .map_err(|_| Error::InvalidNumber(global_lsn.to_string()))?;

        Ok(PartitionSessionToken {
            pkrange_id: pkrange_id.to_string(),
            global_lsn,
            vector: vector.to_string(),
        })
    }
}

impl fmt::Display for PartitionSessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pkrange_id, self.vector)
    }
}
