// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Master-key request signing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha2::Sha256;
use time::{macros::format_description, OffsetDateTime};

use crate::{resource_context::ResourceLink, Error, ErrorKind, Result};

/// Signs requests with the account's master key.
#[derive(Clone)]
pub(crate) struct MasterKeyCredential {
    key: Vec<u8>,
}

impl std::fmt::Debug for MasterKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyCredential").finish_non_exhaustive()
    }
}

impl MasterKeyCredential {
    /// Decodes a base64 master key.
    pub fn new(auth_key: &str) -> Result<Self> {
        let key = STANDARD.decode(auth_key.trim()).map_err(|e| {
            Error::full(
                ErrorKind::Configuration("auth_key is not valid base64".into()),
                e,
                "invalid auth key",
            )
        })?;
        Ok(Self { key })
    }

    /// Builds the `authorization` header value for a request.
    ///
    /// `date` must be the exact value sent in the `x-ms-date` header.
    pub fn authorization(&self, method: &str, link: &ResourceLink, date: &str) -> Result<String> {
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n\n",
            method.to_lowercase(),
            link.resource_type().path_segment(),
            link.link_for_signing(),
            date.to_lowercase()
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).map_err(|e| {
            Error::message(
                ErrorKind::Configuration("auth_key cannot be used as an HMAC key".into()),
                e.to_string(),
            )
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={signature}");
        Ok(utf8_percent_encode(&token, NON_ALPHANUMERIC).to_string())
    }
}

/// Formats `now` as an RFC 7231 date, as required by `x-ms-date`.
pub(crate) fn format_date(now: OffsetDateTime) -> Result<String> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    now.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .map_err(|e| Error::full(ErrorKind::DataConversion, e, "failed to format request date"))
}
