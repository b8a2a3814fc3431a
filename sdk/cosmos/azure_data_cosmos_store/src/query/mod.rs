// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Parameterized queries and the machinery that drives them across pages.

mod executor;
mod iterator;

pub(crate) use executor::collect_all;
pub use iterator::{CursorState, QueryIterator, QueryPage};

use serde::Serialize;

use crate::{Error, ErrorKind};

/// A SQL-like query with named parameters.
///
/// Caller-supplied values are bound as parameters and sent separately from the query text,
/// so they are never interpreted as query syntax.
///
/// ```rust
/// use azure_data_cosmos_store::Query;
///
/// let query = Query::from("SELECT * FROM articles a WHERE ARRAY_CONTAINS(a.tags, @tag)")
///     .with_parameter("@tag", "rust")
///     .unwrap();
/// assert_eq!(query.parameters().count(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Query {
    #[serde(rename = "query")]
    text: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<QueryParameter>,
}

/// A single named parameter bound to a [`Query`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryParameter {
    name: String,
    value: serde_json::Value,
}

impl QueryParameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl Query {
    /// Binds `value` to the parameter `name`, replacing any earlier binding of the same name.
    ///
    /// Parameter names must start with `@` followed by letters, digits or underscores.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> crate::Result<Self> {
        let name = name.into();
        if !is_valid_parameter_name(&name) {
            return Err(Error::message(
                ErrorKind::DataConversion,
                format!("invalid query parameter name '{name}'"),
            ));
        }
        let value = serde_json::to_value(value)?;

        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.parameters.push(QueryParameter { name, value }),
        }
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> impl Iterator<Item = &QueryParameter> {
        self.parameters.iter()
    }

    /// Looks up the value bound to `name`.
    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// The aggregate function called in the select clause, if any: `COUNT` for
    /// `SELECT VALUE COUNT(1) FROM c`.
    pub(crate) fn aggregate(&self) -> Option<&'static str> {
        let text = self.text.to_ascii_uppercase();
        let selection = match word_positions(&text, "FROM").next() {
            Some(end) => &text[..end],
            None => &text,
        };
        AGGREGATES.into_iter().find(|&name| {
            word_positions(selection, name)
                .any(|i| selection[i + name.len()..].trim_start().starts_with('('))
        })
    }
}

const AGGREGATES: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Positions of `word` in `text` that are not part of a longer identifier.
fn word_positions<'a>(text: &'a str, word: &'a str) -> impl Iterator<Item = usize> + 'a {
    let is_identifier = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(word).map(|(i, _)| i).filter(move |&i| {
        !text[..i].chars().next_back().is_some_and(is_identifier)
            && !text[i + word.len()..].chars().next().is_some_and(is_identifier)
    })
}

fn is_valid_parameter_name(name: &str) -> bool {
    match name.strip_prefix('@') {
        Some(rest) => {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self {
            text,
            parameters: Vec::new(),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::from(text.to_string())
    }
}

impl From<&String> for Query {
    fn from(text: &String) -> Self {
        Self::from(text.clone())
    }
}
