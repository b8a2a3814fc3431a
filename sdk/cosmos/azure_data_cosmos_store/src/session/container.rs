// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{collections::HashMap, str::FromStr, sync::RwLock};

use super::{Error, PartitionSessionToken};

/// The session for one container: the latest token seen per partition key range.
#[derive(Debug, Default)]
pub(crate) struct ContainerSession {
    partition_tokens: RwLock<HashMap<String, PartitionSessionToken>>,
}

impl ContainerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a comma-separated list of partition session tokens.
    ///
    /// A token only replaces the stored one for its range if it is at least as recent,
    /// so responses arriving out of order never move the session backwards.
    pub fn set_session_token(&self, token: &str) -> Result<(), Error> {
        if token.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let parsed = token
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(PartitionSessionToken::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        let mut partition_tokens = self
            .partition_tokens
            .write()
            .unwrap_or_else(|e| e.into_inner());
        for partition_token in parsed {
            match partition_tokens.get(&partition_token.pkrange_id) {
                Some(existing) if !partition_token.is_at_least(existing) => {}
                _ => {
                    partition_tokens.insert(partition_token.pkrange_id.clone(), partition_token);
                }
            }
        }
        Ok(())
    }

    /// Serializes the tracked tokens into a single container session token.
    pub fn get_session_token(&self) -> Option<String> {
        let partition_tokens = self
            .partition_tokens
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if partition_tokens.is_empty() {
            return None;
        }

        let mut tokens: Vec<String> = partition_tokens.values().map(|t| t.to_string()).collect();
        // Sort for consistent output
        tokens.sort();
        Some(tokens.join(","))
    }
}
