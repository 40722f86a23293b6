//! The environment layer.
//!
//! Variables are matched against a prefix derived from the application name
//! (`my-app` becomes `MY_APP_`), stripped of it, normalized to an index key
//! and resolved to a path through the [`Index`]. Matches are applied in
//! ascending path order so that collection elements are created the same way
//! on every run, whatever order the OS lists the environment in.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::document::Document;
use crate::error::LayerfigError;
use crate::index::Index;
use crate::schema::Schema;

/// Environment prefix for an application name: uppercased, `.` and `-`
/// replaced by `_`, with a trailing `_`. An empty name gives no prefix.
pub fn prefix(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let mut prefix = name.to_uppercase().replace(['.', '-'], "_");
    prefix.push('_');
    prefix
}

/// The process environment, skipping entries that are not valid UTF-8.
pub fn vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Applies environment variables to a record outside of a full load.
///
/// ```ignore
/// let cfg = EnvLayer::new().name("my-app").strict(true).apply(cfg)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvLayer {
    prefix: String,
    strict: bool,
    index: Option<Index>,
    renames: Vec<(String, String)>,
}

impl EnvLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider variables prefixed with [`prefix(name)`](prefix).
    pub fn name(mut self, name: &str) -> Self {
        self.prefix = prefix(name);
        self
    }

    /// Fail on variables that match the prefix but no index key.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve keys through `index` instead of one built from the record.
    pub fn index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    /// Rename a substring of field names when deriving keys.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    /// Applies the process environment to `record`.
    pub fn apply<C>(&self, record: C) -> Result<C, LayerfigError>
    where
        C: Schema + Serialize + DeserializeOwned,
    {
        self.apply_vars(record, vars())
    }

    /// Applies the given variables to `record`.
    pub fn apply_vars<C>(
        &self,
        record: C,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<C, LayerfigError>
    where
        C: Schema + Serialize + DeserializeOwned,
    {
        let mut doc = Document::from_record(&record)?;
        self.apply_document(&mut doc, vars)?;
        doc.into_record()
    }

    /// Applies the given variables to a document. Returns how many were applied.
    pub fn apply_document(
        &self,
        doc: &mut Document,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<usize, LayerfigError> {
        match &self.index {
            Some(index) => apply_env(doc, index, &self.prefix, self.strict, vars),
            None => {
                let index = Index::from_shape(doc.shape(), &self.renames)?;
                apply_env(doc, &index, &self.prefix, self.strict, vars)
            }
        }
    }
}

pub(crate) fn apply_env(
    doc: &mut Document,
    index: &Index,
    prefix: &str,
    strict: bool,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<usize, LayerfigError> {
    let mut matched = BTreeMap::new();

    for (key, value) in vars {
        let key = if prefix.is_empty() {
            key.as_str()
        } else {
            match key.strip_prefix(prefix) {
                Some(rest) => rest,
                None => continue,
            }
        };
        let key = key
            .trim_matches(|c: char| c == '_' || c.is_whitespace())
            .to_uppercase();
        if key.is_empty() {
            continue;
        }

        let Some(path) = index.find(&key) else {
            if strict {
                return Err(LayerfigError::KeyNotFound(key));
            }
            trace!(key, "no index entry, skipping");
            continue;
        };
        matched.insert(path, value.trim().to_string());
    }

    let mut applied = 0;
    for (path, value) in matched {
        match doc.set(&path, &Value::String(value)) {
            Ok(_) => applied += 1,
            Err(err) if err.is_not_found() && !strict => {
                trace!(path, "no such field, skipping");
            }
            Err(err) => return Err(err),
        }
    }
    debug!(prefix, applied, "applied environment");
    Ok(applied)
}
