// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Cumulative request-charge accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// A running total of the request units consumed by completed round trips.
///
/// The total is stored as the bit pattern of an `f64` and updated with a compare-and-swap
/// loop, so concurrent callers never lose an update. One accountant is usually shared by
/// every client in the process through an `Arc`, but nothing stops a caller from owning
/// several (for example one per tenant, or one per test).
#[derive(Debug, Default)]
pub struct CostAccountant {
    total_bits: AtomicU64,
}

impl CostAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `charge` request units to the total.
    ///
    /// Non-finite or negative charges are ignored: the total only ever grows between resets.
    pub fn add(&self, charge: f64) {
        if !charge.is_finite() || charge <= 0.0 {
            return;
        }
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .total_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + charge).to_bits())
            });
    }

    /// Resets the total to zero. Intended for operator use only.
    pub fn reset(&self) {
        self.total_bits.store(0f64.to_bits(), Ordering::Release);
    }

    /// The request units consumed since creation or the last [`reset`](Self::reset).
    pub fn total(&self) -> f64 {
        f64::from_bits(self.total_bits.load(Ordering::Acquire))
    }
}
