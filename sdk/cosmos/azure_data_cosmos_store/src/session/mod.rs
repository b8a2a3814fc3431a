// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Session-token tracking for `Session` consistency.
//!
//! The gateway returns an `x-ms-session-token` header on every response. Replaying the
//! latest token for a container on later requests gives read-your-writes within the client.

mod container;
mod error;
mod partition;

pub(crate) use container::ContainerSession;
pub(crate) use error::Error;
pub(crate) use partition::PartitionSessionToken;

use std::{collections::HashMap, sync::RwLock};

/// Session state for every container used by one connection, keyed by container id.
#[derive(Debug, Default)]
pub(crate) struct SessionContainer {
    container_sessions: RwLock<HashMap<String, ContainerSession>>,
}

impl SessionContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a container session token (as returned by the gateway) into the tracked state.
    pub fn set_session_token(&self, container_id: &str, token: &str) -> Result<(), Error> {
        {
            let sessions = self
                .container_sessions
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(session) = sessions.get(container_id) {
                return session.set_session_token(token);
            }
        }

        // Validate before inserting so a bad token never leaves an empty entry behind.
        let session = ContainerSession::new();
        session.set_session_token(token)?;

        let mut sessions = self
            .container_sessions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        match sessions.get(container_id) {
            Some(existing) => existing.set_session_token(token),
            None => {
                sessions.insert(container_id.to_string(), session);
                Ok(())
            }
        }
    }

    /// The token to send with the next request against `container_id`, if any.
    pub fn get_session_token(&self, container_id: &str) -> Option<String> {
        let sessions = self
            .container_sessions
            .read()
            .unwrap_or_else(|e| e.into_inner());
        sessions
            .get(container_id)
            .and_then(ContainerSession::get_session_token)
    }

    /// Forgets every tracked session, e.g. after the database is deleted.
    pub fn clear_all(&self) {
        self.container_sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
