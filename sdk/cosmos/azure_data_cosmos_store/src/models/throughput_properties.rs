// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// Throughput provisioned on a container at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputProperties {
    offer_throughput: u32,
}

impl ThroughputProperties {
    /// Manually provisioned throughput, in request units per second.
    pub fn manual(throughput: u32) -> Self {
        Self {
            offer_throughput: throughput,
        }
    }

    pub fn throughput(&self) -> u32 {
        self.offer_throughput
    }
}
