// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use url::Url;

/// The kind of resource a request addresses, as used in request signing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResourceType {
    DatabaseAccount,
    Databases,
    Containers,
    Items,
}

impl ResourceType {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceType::DatabaseAccount => "",
            ResourceType::Databases => "dbs",
            ResourceType::Containers => "colls",
            ResourceType::Items => "docs",
        }
    }
}

/// Identifies a resource, or a feed of resources, relative to the account endpoint.
///
/// A feed link (`dbs/db1/colls`) is signed with the link of its parent (`dbs/db1`),
/// an item link (`dbs/db1/colls/c1`) is signed with its own path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResourceLink {
    parent: Option<String>,
    item_id: Option<String>,
    resource_type: ResourceType,
}

impl ResourceLink {
    /// The account itself.
    pub fn root() -> Self {
        Self {
            parent: None,
            item_id: None,
            resource_type: ResourceType::DatabaseAccount,
        }
    }

    /// The feed of all databases in the account.
    pub fn databases() -> Self {
        Self {
            parent: None,
            item_id: None,
            resource_type: ResourceType::Databases,
        }
    }

    /// A feed of children of type `resource_type` below this resource.
    pub fn feed(&self, resource_type: ResourceType) -> Self {
        Self {
            parent: Some(self.path()),
            item_id: None,
            resource_type,
        }
    }

    /// A single resource inside this feed.
    pub fn item(&self, item_id: &str) -> Self {
        Self {
            parent: self.parent.clone(),
            item_id: Some(item_id.to_string()),
            resource_type: self.resource_type,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The path of this link, e.g. `dbs/db1/colls/c1`.
    pub fn path(&self) -> String {
        let mut segments = Vec::new();
        if let Some(parent) = self.parent.as_deref().filter(|p| !p.is_empty()) {
            segments.push(parent.to_string());
        }
        let segment = self.resource_type.path_segment();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        if let Some(id) = &self.item_id {
            segments.push(id.clone());
        }
        segments.join("/")
    }

    /// The resource link used to sign requests against this link.
    pub fn link_for_signing(&self) -> String {
        match &self.item_id {
            Some(_) => self.path(),
            None => self.parent.clone().unwrap_or_default(),
        }
    }

    /// Resolves this link against an account or regional endpoint.
    pub fn url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in self.path().split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        if self.resource_type == ResourceType::DatabaseAccount {
            url.set_path("/");
        }
        url
    }
}
