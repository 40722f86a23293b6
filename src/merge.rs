use serde_json::Value;
use tracing::debug;

use crate::coerce::coerce;
use crate::schema::{Scalar, Shape};

/// Deep-merge `overlay` on top of `base`, guided by `shape`.
///
/// Records merge field by field and keep fields the overlay does not mention.
/// Keys the shape does not know are dropped. An absent optional value is
/// allocated as a bare zero value before the overlay lands on it, so nested
/// defaults are not applied here. Text leaves given as strings are parsed,
/// and numbers or booleans given for string fields are stored as text.
/// Everything else is replaced by the overlay.
///
/// A null overlay only clears optional values; anywhere else it changes
/// nothing, so an empty file keeps the defaults.
pub(crate) fn merge(shape: &Shape, base: &mut Value, overlay: Value) {
    if overlay.is_null() && !matches!(shape, Shape::Optional(_)) {
        return;
    }
    match shape {
        Shape::Optional(inner) => {
            if overlay.is_null() {
                *base = Value::Null;
                return;
            }
            if base.is_null() {
                *base = inner.zero();
            }
            merge(inner, base, overlay);
        }
        Shape::Record(record) => {
            let Value::Object(entries) = overlay else {
                *base = overlay;
                return;
            };
            if !base.is_object() {
                *base = shape.zero();
            }
            let Value::Object(slots) = base else {
                return;
            };
            for (key, value) in entries {
                let Some(field) = record.find(&key) else {
                    debug!(record = record.name(), key, "ignoring unknown key");
                    continue;
                };
                let slot = slots
                    .entry(field.name())
                    .or_insert_with(|| field.shape().zero());
                merge(field.shape(), slot, value);
            }
        }
        Shape::Map(elem) => {
            let Value::Object(entries) = overlay else {
                *base = overlay;
                return;
            };
            if !base.is_object() {
                *base = Value::Object(Default::default());
            }
            let Value::Object(slots) = base else {
                return;
            };
            for (key, value) in entries {
                let mut slot = elem.zero();
                merge(elem, &mut slot, value);
                slots.insert(key, slot);
            }
        }
        Shape::Seq(elem) => {
            let Value::Array(items) = overlay else {
                *base = overlay;
                return;
            };
            *base = Value::Array(
                items
                    .into_iter()
                    .map(|item| {
                        let mut slot = elem.zero();
                        merge(elem, &mut slot, item);
                        slot
                    })
                    .collect(),
            );
        }
        Shape::Array(len, elem) => {
            let Value::Array(items) = overlay else {
                *base = overlay;
                return;
            };
            if !base.is_array() {
                *base = shape.zero();
            }
            let Value::Array(slots) = base else {
                return;
            };
            while slots.len() < *len {
                slots.push(elem.zero());
            }
            for (slot, item) in slots.iter_mut().zip(items) {
                merge(elem, slot, item);
            }
        }
        Shape::Text(text) => {
            let parsed = match &overlay {
                Value::String(raw) => text.parse(raw).ok(),
                _ => None,
            };
            *base = parsed.unwrap_or(overlay);
        }
        Shape::Scalar(Scalar::Str) => {
            *base = coerce(shape, &overlay).unwrap_or(overlay);
        }
        Shape::Scalar(_) => *base = overlay,
    }
}
