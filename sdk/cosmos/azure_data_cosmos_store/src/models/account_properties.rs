// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use url::Url;

/// A region the account is replicated to, as reported by the account metadata.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRegion {
    pub name: String,
    #[serde(rename = "databaseAccountEndpoint")]
    pub endpoint: Url,
}

/// A region and whether reads may be routed to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub name: String,
    pub endpoint: Url,
    pub readable: bool,
}

/// Account-level metadata returned by a `GET` on the account endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub writable_locations: Vec<AccountRegion>,
    #[serde(default)]
    pub readable_locations: Vec<AccountRegion>,
}

impl DatabaseAccount {
    /// Every region of the account, in the order reported, flagged by readability.
    ///
    /// Readable regions come first; write-only regions follow with `readable == false`.
    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self
            .readable_locations
            .iter()
            .map(|location| Region {
                name: location.name.clone(),
                endpoint: location.endpoint.clone(),
                readable: true,
            })
            .collect();
        for location in &self.writable_locations {
            if !regions.iter().any(|r| r.name == location.name) {
                regions.push(Region {
                    name: location.name.clone(),
                    endpoint: location.endpoint.clone(),
                    readable: false,
                });
            }
        }
        regions
    }

    /// The regions reads may be routed to, in the order reported.
    pub fn readable_regions(&self) -> Vec<Region> {
        self.regions().into_iter().filter(|r| r.readable).collect()
    }
}
