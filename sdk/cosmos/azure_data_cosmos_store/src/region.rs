// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Startup selection of the region reads are routed to.
//!
//! The choice is deliberately approximate: if the process runs in a region the account
//! can be read from, that region is used; otherwise the first readable region reported by
//! the account is used. No latency is measured and the choice is never re-evaluated after
//! startup, so a process that moves, or an account that gains a closer replica, keeps its
//! startup routing until restart.

use tracing::{debug, info};

use crate::{
    connection::Connector,
    constants,
    models::{DatabaseAccount, Region},
    ClientConfig, Error, ErrorKind, Result,
};

/// Determines the current region and the nearest readable region of the account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionResolver {
    current_region: String,
}

impl Default for RegionResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RegionResolver {
    /// Reads the current region from the `REGION_NAME` deployment variable, falling back to
    /// `"local"` outside a recognized deployment.
    pub fn from_env() -> Self {
        let current_region = std::env::var(constants::REGION_NAME_ENV)
            .ok()
            .map(|region| region.trim().to_string())
            .filter(|region| !region.is_empty())
            .unwrap_or_else(|| constants::LOCAL_SENTINEL.to_string());
        Self { current_region }
    }

    /// Uses a fixed current region.
    pub fn with_current_region(current_region: impl Into<String>) -> Self {
        Self {
            current_region: current_region.into(),
        }
    }

    /// The region this process runs in, or `"local"`.
    pub fn current_region(&self) -> &str {
        &self.current_region
    }

    /// Queries the account metadata for the regions reads can be routed to.
    pub async fn available_readable_regions(
        &self,
        connector: &dyn Connector,
        config: &ClientConfig,
    ) -> Result<(DatabaseAccount, Vec<Region>)> {
        let account = connector.read_account(config).await?;
        let readable = account.readable_regions();
        debug!(
            account = %account.id,
            regions = ?readable.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "discovered readable regions"
        );
        Ok((account, readable))
    }

    /// Picks the read region: the current region when readable, else the first readable region.
    ///
    /// Fails with [`ErrorKind::Configuration`] when the account reports no readable region.
    pub fn nearest_read_region(&self, readable_regions: &[Region]) -> Result<String> {
        if let Some(region) = readable_regions
            .iter()
            .find(|r| r.readable && r.name == self.current_region)
        {
            info!(region = %region.name, "reading from the current region");
            return Ok(region.name.clone());
        }

        let fallback = readable_regions
            .iter()
            .find(|r| r.readable)
            .ok_or_else(|| {
                Error::new(ErrorKind::Configuration(
                    "the account reports no readable regions".into(),
                ))
            })?;
        info!(
            current_region = %self.current_region,
            region = %fallback.name,
            "current region is not readable; reading from the first readable region"
        );
        Ok(fallback.name.clone())
    }
}
