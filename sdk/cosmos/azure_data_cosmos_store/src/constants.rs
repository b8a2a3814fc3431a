// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Header names and fixed values used by the Cosmos DB REST protocol.

pub const API_VERSION: &str = "2018-12-31";

pub const AUTHORIZATION: &str = "authorization";
pub const MS_DATE: &str = "x-ms-date";
pub const VERSION: &str = "x-ms-version";
pub const CONSISTENCY_LEVEL: &str = "x-ms-consistency-level";
pub const SESSION_TOKEN: &str = "x-ms-session-token";
pub const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
pub const IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
pub const OFFER_THROUGHPUT: &str = "x-ms-offer-throughput";
pub const QUERY: &str = "x-ms-documentdb-isquery";
pub const QUERY_ENABLE_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
pub const CONTINUATION: &str = "x-ms-continuation";
pub const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
pub const REQUEST_CHARGE: &str = "x-ms-request-charge";
pub const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

pub const CONTENT_TYPE: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_QUERY_JSON: &str = "application/query+json";

/// Environment variable carrying the Azure region the process runs in.
pub const REGION_NAME_ENV: &str = "REGION_NAME";

/// Environment variable carrying the App Service site name.
pub const SITE_NAME_ENV: &str = "APPSETTING_WEBSITE_SITE_NAME";

/// Reported when no deployment signal is available.
pub const LOCAL_SENTINEL: &str = "local";
