//! An in-memory configuration document addressed by dotted paths.
//!
//! A [`Document`] pairs a [`Shape`] with a JSON value of that shape. Layers
//! write into it through [`Document::set`] using paths like
//! `server.settings[1].tags[abc]`; missing intermediate containers are created
//! on the way down (sequences grow, map keys are inserted, absent optional
//! records are allocated with their defaults). When all layers are applied the
//! document is deserialized into the caller's record type.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::coerce::{coerce, is_zero};
use crate::error::LayerfigError;
use crate::merge;
use crate::schema::{Schema, Shape};

/// How many elements past its end a sequence may grow in one write.
const MAX_SEQ_GROWTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(String),
}

fn parse_path(path: &str) -> Result<Vec<Step>, LayerfigError> {
    let mut steps = Vec::new();
    let mut segment = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !segment.is_empty() {
                    steps.push(Step::Field(std::mem::take(&mut segment)));
                }
            }
            '[' => {
                if !segment.is_empty() {
                    steps.push(Step::Field(std::mem::take(&mut segment)));
                }
                let mut content = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    content.push(c);
                }
                if !closed {
                    return Err(LayerfigError::PathNotFound(path.to_string()));
                }
                steps.push(Step::Index(content));
            }
            _ => segment.push(c),
        }
    }
    if !segment.is_empty() {
        steps.push(Step::Field(segment));
    }
    if steps.is_empty() {
        return Err(LayerfigError::PathNotFound(path.to_string()));
    }
    Ok(steps)
}

enum Action<'v> {
    Assign(&'v Value),
    Create,
}

#[derive(Debug, Clone)]
pub struct Document {
    shape: Shape,
    value: Value,
}

impl Document {
    /// A zero-valued document: no defaults applied, optional values absent.
    pub fn new(shape: Shape) -> Self {
        let value = shape.zero();
        Self { shape, value }
    }

    pub fn of<C: Schema>() -> Self {
        Self::new(C::shape())
    }

    /// A document seeded from an existing record.
    pub fn from_record<C: Schema + Serialize>(record: &C) -> Result<Self, LayerfigError> {
        let value = serde_json::to_value(record).map_err(LayerfigError::InvalidConfig)?;
        Ok(Self {
            shape: C::shape(),
            value,
        })
    }

    pub fn into_record<C: DeserializeOwned>(self) -> Result<C, LayerfigError> {
        serde_json::from_value(self.value).map_err(LayerfigError::InvalidConfig)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Writes `value` at `path`, coercing it to the field's type.
    ///
    /// Returns whether the stored value changed. Fails with
    /// [`LayerfigError::PathNotFound`] when the path names no field and with
    /// [`LayerfigError::InvalidValue`] when the value cannot be coerced.
    pub fn set(&mut self, path: &str, value: &Value) -> Result<bool, LayerfigError> {
        let steps = parse_path(path)?;
        let changed = walk_mut(&self.shape, &mut self.value, &steps, Action::Assign(value), path)?;
        trace!(path, changed, "set value");
        Ok(changed)
    }

    /// Allocates the optional value at `path` (and any optional values on
    /// the way to it) without assigning a leaf.
    pub fn create(&mut self, path: &str) -> Result<(), LayerfigError> {
        let steps = parse_path(path)?;
        walk_mut(&self.shape, &mut self.value, &steps, Action::Create, path)?;
        Ok(())
    }

    /// Whether a non-null value is present at `path`. Never mutates.
    pub fn exists(&self, path: &str) -> Result<bool, LayerfigError> {
        let steps = parse_path(path)?;
        let found = lookup(&self.shape, &self.value, &steps, path)?;
        Ok(found.is_some_and(|value| !value.is_null()))
    }

    /// Fills every zero-valued field that declares a default. Absent
    /// optional values stay absent. Running it twice changes nothing.
    pub fn apply_defaults(&mut self) {
        fill_defaults(&self.shape, &mut self.value);
    }

    /// Deep-merges a decoded file document on top of this one.
    pub fn merge(&mut self, overlay: Value) {
        merge::merge(&self.shape, &mut self.value, overlay);
    }
}

/// Zero value of `shape` with defaults filled in, used for every value the
/// setter has to allocate.
pub(crate) fn materialize(shape: &Shape) -> Value {
    let mut value = shape.zero();
    fill_defaults(shape, &mut value);
    value
}

fn walk_mut(
    shape: &Shape,
    slot: &mut Value,
    steps: &[Step],
    action: Action<'_>,
    path: &str,
) -> Result<bool, LayerfigError> {
    let Some((step, rest)) = steps.split_first() else {
        return finish(shape, slot, action, path);
    };
    let not_found = || LayerfigError::PathNotFound(path.to_string());

    match shape {
        Shape::Optional(inner) => {
            if slot.is_null() {
                *slot = materialize(inner);
            }
            walk_mut(inner, slot, steps, action, path)
        }
        Shape::Record(record) => {
            let Step::Field(name) = step else {
                return Err(not_found());
            };
            let field = record.find(name).ok_or_else(not_found)?;
            if !slot.is_object() {
                *slot = shape.zero();
            }
            let Value::Object(map) = slot else {
                return Err(not_found());
            };
            let child = map
                .entry(field.name())
                .or_insert_with(|| field.shape().zero());
            walk_mut(field.shape(), child, rest, action, path)
        }
        Shape::Seq(elem) => {
            let Step::Index(raw) = step else {
                return Err(not_found());
            };
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let Value::Array(items) = slot else {
                return Err(not_found());
            };
            let idx = if raw.is_empty() {
                items.len()
            } else {
                raw.trim().parse::<usize>().map_err(|_| not_found())?
            };
            if idx > items.len() + MAX_SEQ_GROWTH {
                return Err(LayerfigError::InvalidValue {
                    key: path.to_string(),
                    reason: format!(
                        "index {idx} is too far past the end ({} elements)",
                        items.len()
                    ),
                });
            }
            while items.len() <= idx {
                items.push(materialize(elem));
            }
            walk_mut(elem, &mut items[idx], rest, action, path)
        }
        Shape::Array(len, elem) => {
            let Step::Index(raw) = step else {
                return Err(not_found());
            };
            let idx = raw.trim().parse::<usize>().map_err(|_| not_found())?;
            if idx >= *len {
                return Err(not_found());
            }
            if !slot.is_array() {
                *slot = shape.zero();
            }
            let Value::Array(items) = slot else {
                return Err(not_found());
            };
            while items.len() < *len {
                items.push(elem.zero());
            }
            walk_mut(elem, &mut items[idx], rest, action, path)
        }
        Shape::Map(elem) => {
            let key = match step {
                Step::Field(key) | Step::Index(key) => key.to_lowercase(),
            };
            if !slot.is_object() {
                *slot = Value::Object(Default::default());
            }
            let Value::Object(map) = slot else {
                return Err(not_found());
            };
            let child = map.entry(key).or_insert_with(|| materialize(elem));
            walk_mut(elem, child, rest, action, path)
        }
        Shape::Scalar(_) | Shape::Text(_) => Err(not_found()),
    }
}

fn finish(shape: &Shape, slot: &mut Value, action: Action<'_>, path: &str) -> Result<bool, LayerfigError> {
    match action {
        Action::Assign(value) => {
            let coerced = coerce(shape, value).map_err(|reason| LayerfigError::InvalidValue {
                key: path.to_string(),
                reason,
            })?;
            let changed = *slot != coerced;
            *slot = coerced;
            Ok(changed)
        }
        Action::Create => match shape {
            Shape::Optional(inner) if slot.is_null() => {
                *slot = materialize(inner);
                Ok(true)
            }
            _ => Ok(false),
        },
    }
}

fn lookup<'v>(
    shape: &Shape,
    value: &'v Value,
    steps: &[Step],
    path: &str,
) -> Result<Option<&'v Value>, LayerfigError> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(Some(value));
    };
    let not_found = || LayerfigError::PathNotFound(path.to_string());

    match shape {
        Shape::Optional(inner) => {
            if value.is_null() {
                Ok(None)
            } else {
                lookup(inner, value, steps, path)
            }
        }
        Shape::Record(record) => {
            let Step::Field(name) = step else {
                return Err(not_found());
            };
            let field = record.find(name).ok_or_else(not_found)?;
            match value.get(field.name()) {
                Some(child) => lookup(field.shape(), child, rest, path),
                None => Ok(None),
            }
        }
        Shape::Seq(elem) | Shape::Array(_, elem) => {
            let Step::Index(raw) = step else {
                return Err(not_found());
            };
            let idx = raw.trim().parse::<usize>().map_err(|_| not_found())?;
            match value.get(idx) {
                Some(child) => lookup(elem, child, rest, path),
                None => Ok(None),
            }
        }
        Shape::Map(elem) => {
            let key = match step {
                Step::Field(key) | Step::Index(key) => key.to_lowercase(),
            };
            match value.get(key.as_str()) {
                Some(child) => lookup(elem, child, rest, path),
                None => Ok(None),
            }
        }
        Shape::Scalar(_) | Shape::Text(_) => Err(not_found()),
    }
}

fn fill_defaults(shape: &Shape, slot: &mut Value) {
    match shape {
        Shape::Optional(inner) => {
            if !slot.is_null() {
                fill_defaults(inner, slot);
            }
        }
        Shape::Record(record) => {
            let Value::Object(map) = slot else {
                return;
            };
            for field in record.fields() {
                let entry = map
                    .entry(field.name())
                    .or_insert_with(|| field.shape().zero());
                if let Some(default) = field.default_value()
                    && is_zero(entry)
                {
                    match coerce(field.shape(), default) {
                        Ok(value) => *entry = value,
                        Err(reason) => warn!(
                            record = record.name(),
                            field = field.name(),
                            %reason,
                            "ignoring invalid default"
                        ),
                    }
                }
                fill_defaults(field.shape(), entry);
            }
        }
        Shape::Seq(elem) | Shape::Array(_, elem) => {
            if let Value::Array(items) = slot {
                for item in items {
                    fill_defaults(elem, item);
                }
            }
        }
        Shape::Map(elem) => {
            if let Value::Object(map) = slot {
                for item in map.values_mut() {
                    fill_defaults(elem, item);
                }
            }
        }
        Shape::Scalar(_) | Shape::Text(_) => {}
    }
}
