// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use serde::de::DeserializeOwned;
use tracing::debug;

use super::QueryIterator;
use crate::Result;

/// Drains a query, concatenating every page in order.
///
/// An empty container yields no items after a single round trip; the loop treats zero,
/// one and many pages the same way. Each page's charge is already recorded by the
/// pipeline; the sum is returned for the caller's logs.
pub(crate) async fn collect_all<T: DeserializeOwned>(
    mut iterator: QueryIterator<T>,
) -> Result<(Vec<T>, f64)> {
    let mut results = Vec::new();
    let mut request_charge = 0.0;
    let mut pages = 0usize;

    while iterator.has_more() {
        let Some(page) = iterator.next_page().await? else {
            break;
        };
        pages += 1;
        request_charge += page.request_charge();
        results.extend(page.into_items());
    }

    debug!(pages, items = results.len(), request_charge, "query drained");
    Ok((results, request_charge))
}
