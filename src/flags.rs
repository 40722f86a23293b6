//! The flag layer.
//!
//! Command-line flags are parsed elsewhere; this module only binds parsed
//! flags to record paths and writes the ones the user actually passed.
//! A flag that was not given on the command line is never applied, even if
//! it has a default, so it cannot mask a value from the environment.
//!
//! Any parser can take part by implementing [`FlagSource`]. With the `clap`
//! feature, [`ArgFlag`](crate::ArgFlag) adapts `clap::ArgMatches`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::document::Document;
use crate::error::LayerfigError;
use crate::index::Index;
use crate::schema::Schema;

/// Declared value kind of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Bool,
    Int,
    Uint,
    Float,
    Duration,
    Ip,
    StringList,
    BoolList,
    IntList,
    UintList,
    FloatList,
    DurationList,
    IpList,
    /// Any other kind; read through the raw string representation.
    Other,
}

/// A typed flag value.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Duration(Duration),
    Ip(IpAddr),
    List(Vec<FlagValue>),
}

impl From<FlagValue> for Value {
    fn from(value: FlagValue) -> Self {
        match value {
            FlagValue::Str(s) => Value::String(s),
            FlagValue::Bool(b) => Value::Bool(b),
            FlagValue::Int(i) => Value::from(i),
            FlagValue::Uint(u) => Value::from(u),
            FlagValue::Float(f) => Value::from(f),
            FlagValue::Duration(d) => serde_json::json!({
                "secs": d.as_secs(),
                "nanos": d.subsec_nanos(),
            }),
            FlagValue::Ip(ip) => Value::String(ip.to_string()),
            FlagValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

/// A parsed command-line flag.
pub trait FlagSource {
    fn name(&self) -> &str;

    /// True only if the user passed the flag; defaults do not count.
    fn is_set(&self) -> bool;

    fn kind(&self) -> FlagKind;

    /// The value read through the accessor for `kind`.
    fn typed_value(&self, kind: FlagKind) -> Result<FlagValue, String>;

    /// The value as the parser saw it, for kinds without a typed accessor.
    fn raw_value(&self) -> Option<String>;
}

/// A flag bound to a target path.
pub struct Flag {
    source: Box<dyn FlagSource>,
    parent: Option<String>,
    persistent: bool,
}

impl Flag {
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Name of the command the flag was registered on, if known.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Whether the flag is inherited by subcommands.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_set(&self) -> bool {
        self.source.is_set()
    }

    /// The flag's current value, typed by its declared kind.
    pub fn value(&self) -> Result<FlagValue, LayerfigError> {
        let kind = self.source.kind();
        let value = match kind {
            FlagKind::Other => self.source.raw_value().map(FlagValue::Str).ok_or_else(|| "flag has no value".to_string()),
            kind => self.source.typed_value(kind),
        };
        value.map_err(|reason| LayerfigError::FlagValue {
            flag: self.name().to_string(),
            reason,
        })
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name())
            .field("set", &self.is_set())
            .field("parent", &self.parent)
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// Flags bound to target paths, applied in path order.
#[derive(Debug, Default)]
pub struct Flags {
    flags: BTreeMap<String, Flag>,
    index: Option<Index>,
}

impl Flags {
    /// With an index, targets may be given as index keys and are checked
    /// against it. Without one, targets are taken as paths.
    pub fn new(index: Option<Index>) -> Self {
        Self {
            flags: BTreeMap::new(),
            index,
        }
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn flags(&self) -> &BTreeMap<String, Flag> {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Binds `source` to `target`, a path like `Sub.Name` or an index key.
    pub fn bind(&mut self, target: &str, source: impl FlagSource + 'static) -> Result<(), LayerfigError> {
        self.insert(target, Box::new(source), None, false)
    }

    /// Like [`bind`](Self::bind), recording the command the flag belongs to.
    pub fn bind_scoped(
        &mut self,
        target: &str,
        source: impl FlagSource + 'static,
        parent: impl Into<String>,
        persistent: bool,
    ) -> Result<(), LayerfigError> {
        self.insert(target, Box::new(source), Some(parent.into()), persistent)
    }

    pub(crate) fn insert(
        &mut self,
        target: &str,
        source: Box<dyn FlagSource>,
        parent: Option<String>,
        persistent: bool,
    ) -> Result<(), LayerfigError> {
        let path = self.resolve_target(target)?;
        self.flags.insert(
            path,
            Flag {
                source,
                parent,
                persistent,
            },
        );
        Ok(())
    }

    pub(crate) fn resolve_target(&self, target: &str) -> Result<String, LayerfigError> {
        if target.is_empty() {
            return Err(LayerfigError::EmptyTarget);
        }
        let lowered = target.to_lowercase();
        match &self.index {
            Some(index) if !index.is_empty() => {
                if let Some(path) = index.find(target) {
                    Ok(path)
                } else if index.path_exists(&lowered) {
                    Ok(lowered)
                } else {
                    Err(LayerfigError::TargetNotFound(target.to_string()))
                }
            }
            _ => Ok(lowered),
        }
    }

    /// Writes every flag the user passed into `doc`. Returns how many were applied.
    pub fn apply(&self, doc: &mut Document) -> Result<usize, LayerfigError> {
        let mut applied = 0;
        for (path, flag) in &self.flags {
            if !flag.is_set() {
                continue;
            }
            let value = Value::from(flag.value()?);
            doc.set(path, &value)?;
            applied += 1;
        }
        debug!(applied, "applied flags");
        Ok(applied)
    }

    /// Writes every flag the user passed into `record`.
    pub fn apply_to<C>(&self, record: C) -> Result<C, LayerfigError>
    where
        C: Schema + Serialize + DeserializeOwned,
    {
        let mut doc = Document::from_record(&record)?;
        self.apply(&mut doc)?;
        doc.into_record()
    }
}
