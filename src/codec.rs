//! Decoders from file bytes into a JSON document.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::types::FileKind;

pub(crate) fn decode(kind: FileKind, bytes: &[u8]) -> Result<Value, DecodeError> {
    match kind {
        FileKind::Json => Ok(serde_json::from_slice(bytes)?),
        FileKind::Yaml => {
            let doc: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
            yaml_to_json(doc)
        }
        FileKind::Toml => {
            let text = std::str::from_utf8(bytes)?;
            let table: toml::Table = toml::from_str(text)?;
            Ok(serde_json::to_value(table)?)
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, DecodeError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn mapping_key(key: serde_yaml::Value) -> Result<String, DecodeError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(DecodeError::MappingKey(format!("{other:?}"))),
    }
}
