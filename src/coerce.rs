//! Conversion of raw and typed values into the value a shape expects.
//!
//! Environment variables always arrive as strings; flags and default literals
//! may arrive typed. Either way the result is a JSON value that deserializes
//! into the destination field.

use std::time::Duration;

use serde_json::{Map, Number, Value};

use crate::schema::{Scalar, Shape};

pub(crate) fn coerce(shape: &Shape, value: &Value) -> Result<Value, String> {
    match shape {
        Shape::Optional(inner) => {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                coerce(inner, value)
            }
        }
        Shape::Scalar(scalar) => coerce_scalar(*scalar, value),
        Shape::Text(text) => match value {
            Value::String(raw) => text.parse(raw),
            Value::Null => Err(format!("expected {}, found null", text.name())),
            other => Ok(other.clone()),
        },
        Shape::Seq(elem) => list_items(value)?
            .iter()
            .map(|item| coerce(elem, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Shape::Array(len, elem) => {
            let items = list_items(value)?;
            if items.len() > *len {
                return Err(format!(
                    "expected at most {len} elements, found {}",
                    items.len()
                ));
            }
            let mut out = items
                .iter()
                .map(|item| coerce(elem, item))
                .collect::<Result<Vec<_>, _>>()?;
            out.resize(*len, elem.zero());
            Ok(Value::Array(out))
        }
        Shape::Map(elem) => {
            let object = object_items(value)?;
            object
                .into_iter()
                .map(|(key, item)| Ok((key.to_lowercase(), coerce(elem, &item)?)))
                .collect::<Result<Map<_, _>, String>>()
                .map(Value::Object)
        }
        Shape::Record(record) => {
            let mut out = shape.zero();
            let object = object_items(value)?;
            if let Value::Object(slots) = &mut out {
                for (key, item) in object {
                    let field = record
                        .find(&key)
                        .ok_or_else(|| format!("unknown field '{key}' in {}", record.name()))?;
                    slots.insert(field.name().to_string(), coerce(field.shape(), &item)?);
                }
            }
            Ok(out)
        }
    }
}

fn coerce_scalar(scalar: Scalar, value: &Value) -> Result<Value, String> {
    match (scalar, value) {
        (Scalar::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (Scalar::Bool, Value::String(raw)) => parse_bool(raw).map(Value::Bool),
        (Scalar::Int(bits), Value::Number(n)) => match n.as_i64() {
            Some(i) => check_int(i, bits),
            None => Err(format!("{n} is not a valid i{bits}")),
        },
        (Scalar::Int(bits), Value::String(raw)) => {
            let i = raw.trim().parse::<i64>().map_err(|e| e.to_string())?;
            check_int(i, bits)
        }
        (Scalar::Uint(bits), Value::Number(n)) => match n.as_u64() {
            Some(u) => check_uint(u, bits),
            None => Err(format!("{n} is not a valid u{bits}")),
        },
        (Scalar::Uint(bits), Value::String(raw)) => {
            let u = raw.trim().parse::<u64>().map_err(|e| e.to_string())?;
            check_uint(u, bits)
        }
        (Scalar::Float, Value::Number(n)) => Ok(Value::Number(n.clone())),
        (Scalar::Float, Value::String(raw)) => {
            let f = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("{raw} is not a finite number"))
        }
        (Scalar::Str, Value::String(raw)) => Ok(Value::String(raw.clone())),
        (Scalar::Str, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (Scalar::Str, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (scalar, other) => Err(format!(
            "expected {}, found {}",
            Shape::Scalar(scalar).type_name(),
            describe(other)
        )),
    }
}

fn check_int(i: i64, bits: u32) -> Result<Value, String> {
    let bits = bits.clamp(1, 64);
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << (bits - 1)) - 1;
    if (min..=max).contains(&(i as i128)) {
        Ok(Value::from(i))
    } else {
        Err(format!("{i} is out of range for i{bits}"))
    }
}

fn check_uint(u: u64, bits: u32) -> Result<Value, String> {
    let bits = bits.clamp(1, 64);
    let max = (1u128 << bits) - 1;
    if (u as u128) <= max {
        Ok(Value::from(u))
    } else {
        Err(format!("{u} is out of range for u{bits}"))
    }
}

/// Elements of a list value: a JSON array, a JSON array literal in a string,
/// or a comma-separated string.
fn list_items(value: &Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(raw) if raw.trim_start().starts_with('[') => {
            serde_json::from_str::<Vec<Value>>(raw).map_err(|e| e.to_string())
        }
        Value::String(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Value::String(raw) => Ok(raw
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect()),
        other => Err(format!("expected a list, found {}", describe(other))),
    }
}

fn object_items(value: &Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::String(raw) if raw.trim_start().starts_with('{') => {
            serde_json::from_str::<Map<String, Value>>(raw).map_err(|e| e.to_string())
        }
        other => Err(format!("expected an object, found {}", describe(other))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

pub(crate) fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Ok(true),
        "false" | "f" | "0" | "no" => Ok(false),
        _ => Err(format!("invalid boolean '{raw}'")),
    }
}

/// Parses `1h30m`, `250ms`, `1.5s` style durations. A bare number is seconds.
pub(crate) fn parse_duration(raw: &str) -> Result<Duration, String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if let Ok(secs) = input.parse::<f64>() {
        return from_nanos(secs * 1e9, input);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("missing number in duration '{input}'"));
        }
        let (num, tail) = rest.split_at(num_len);
        let value: f64 = num
            .parse()
            .map_err(|_| format!("invalid number '{num}' in duration '{input}'"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "d" => 86400e9,
            "" => return Err(format!("missing unit in duration '{input}'")),
            other => return Err(format!("unknown unit '{other}' in duration '{input}'")),
        };
        total += value * scale;
        rest = next;
    }
    from_nanos(total, input)
}

fn from_nanos(nanos: f64, input: &str) -> Result<Duration, String> {
    let nanos = nanos.round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(format!("duration '{input}' is out of range"));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

/// Zero in the sense of "never set": null, false, 0, "", and containers
/// holding only zero values.
pub(crate) fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.iter().all(is_zero),
        Value::Object(map) => map.values().all(is_zero),
    }
}
