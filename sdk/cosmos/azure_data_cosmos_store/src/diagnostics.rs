// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! An operator-facing snapshot of the client's configuration and accumulated cost.

use std::fmt;

use crate::{constants, ConnectionMode, ConsistencyLevel};

/// A read-only snapshot produced by [`CosmosStoreClient::diagnostics()`](crate::CosmosStoreClient::diagnostics()).
///
/// Formatting has no side effects and never includes credentials, so the report is safe
/// to show to operators. `Display` renders plain text; [`to_html`](Self::to_html) renders
/// an HTML fragment with every value escaped.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticsReport {
    /// The deployment (site) name, or `"local"`.
    pub deployment: String,
    /// The region this process runs in, or `"local"`.
    pub current_region: String,
    pub request_charge: f64,
    pub endpoint: String,
    /// The endpoint writes are routed to, once initialized.
    pub service_endpoint: Option<String>,
    pub consistency_level: ConsistencyLevel,
    pub connection_mode: ConnectionMode,
    pub max_connection_limit: usize,
    pub preferred_regions: Vec<String>,
}

const NOT_INITIALIZED: &str = "(not initialized)";

impl DiagnosticsReport {
    /// The deployment name from `APPSETTING_WEBSITE_SITE_NAME`, or `"local"`.
    pub(crate) fn deployment_from_env() -> String {
        std::env::var(constants::SITE_NAME_ENV)
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| constants::LOCAL_SENTINEL.to_string())
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Server name", self.deployment.clone()),
            ("Region", self.current_region.clone()),
            ("Total RequestCharge", format!("{:.2}", self.request_charge)),
            ("EndpointUrl", self.endpoint.clone()),
            (
                "ServiceEndpoint",
                self.service_endpoint
                    .clone()
                    .unwrap_or_else(|| NOT_INITIALIZED.to_string()),
            ),
            ("ConsistencyLevel", self.consistency_level.to_string()),
            ("ConnectionMode", self.connection_mode.to_string()),
            ("MaxConnectionLimit", self.max_connection_limit.to_string()),
            ("PreferredLocations", self.preferred_regions.join(", ")),
        ]
    }

    /// Renders the report as an HTML fragment, one `<br/>`-terminated line per value.
    pub fn to_html(&self) -> String {
        self.rows()
            .into_iter()
            .map(|(label, value)| format!("{label}: {} <br/>\n", escape_html(&value)))
            .collect()
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.rows() {
            writeln!(f, "{label}: {value}")?;
        }
        Ok(())
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
