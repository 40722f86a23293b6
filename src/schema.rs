//! Shape descriptors for configuration records.
//!
//! A [`Shape`] describes how a type looks to the loader: a record with named
//! fields, a sequence, a fixed-size array, a map, an optional value, a scalar,
//! or an opaque text leaf (a type parsed from a single token, like an IP
//! address). Every type that takes part in loading implements [`Schema`].
//!
//! Scalars, strings, collections, `Option`, `Box` and a handful of common text
//! types are covered here. Records describe themselves with the [`Record`]
//! builder:
//!
//! ```ignore
//! impl Schema for ServerConfig {
//!     fn shape() -> Shape {
//!         Record::of::<Self>()
//!             .field(Field::new::<String>("host").default("localhost"))
//!             .field(Field::new::<u16>("port").default(8080))
//!             .field(Field::new::<Vec<IpAddr>>("white_list").key("WL"))
//!             .into()
//!     }
//! }
//! ```
//!
//! Field names must match the serde names of the fields, since loaded values
//! are deserialized into the record at the end of a load.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce;

/// A type that can describe its own shape.
pub trait Schema {
    fn shape() -> Shape;
}

#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(Scalar),
    Text(Text),
    Record(Record),
    Seq(Box<Shape>),
    Array(usize, Box<Shape>),
    Map(Box<Shape>),
    Optional(Box<Shape>),
}

/// Built-in leaf types. Integer variants carry their bit width so that
/// out-of-range values are rejected when they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    Int(u32),
    Uint(u32),
    Float,
    Str,
}

/// An opaque leaf decoded from a single text token.
#[derive(Debug, Clone)]
pub struct Text {
    name: &'static str,
    zero: Value,
    parse: fn(&str) -> Result<Value, String>,
}

impl Text {
    pub fn new(name: &'static str, zero: Value, parse: fn(&str) -> Result<Value, String>) -> Self {
        Self { name, zero, parse }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        (self.parse)(raw)
    }
}

impl Shape {
    pub fn of<T: Schema>() -> Shape {
        T::shape()
    }

    /// An opaque text leaf for any type that parses from a string.
    /// The zero value is `null`, so such fields need a default or an `Option`.
    pub fn text<T>() -> Shape
    where
        T: FromStr + Serialize + 'static,
        T::Err: Display,
    {
        Shape::Text(Text::new(short_type_name::<T>(), Value::Null, parse_from_str::<T>))
    }

    /// Strips any `Option` wrappers.
    pub fn unwrap_optional(&self) -> &Shape {
        let mut shape = self;
        while let Shape::Optional(inner) = shape {
            shape = inner;
        }
        shape
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self.unwrap_optional() {
            Shape::Record(record) => Some(record),
            _ => None,
        }
    }

    /// The value a freshly allocated instance of this shape holds before any
    /// default or layer touches it. Optional values start out absent.
    pub fn zero(&self) -> Value {
        match self {
            Shape::Scalar(Scalar::Bool) => Value::Bool(false),
            Shape::Scalar(Scalar::Int(_) | Scalar::Uint(_)) => Value::from(0),
            Shape::Scalar(Scalar::Float) => Value::from(0.0),
            Shape::Scalar(Scalar::Str) => Value::String(String::new()),
            Shape::Text(text) => text.zero.clone(),
            Shape::Record(record) => Value::Object(
                record
                    .fields
                    .iter()
                    .map(|field| (field.name.to_string(), field.shape.zero()))
                    .collect(),
            ),
            Shape::Seq(_) => Value::Array(Vec::new()),
            Shape::Array(len, elem) => Value::Array(vec![elem.zero(); *len]),
            Shape::Map(_) => Value::Object(Map::new()),
            Shape::Optional(_) => Value::Null,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Shape::Scalar(Scalar::Bool) => "bool".into(),
            Shape::Scalar(Scalar::Int(bits)) => format!("i{bits}"),
            Shape::Scalar(Scalar::Uint(bits)) => format!("u{bits}"),
            Shape::Scalar(Scalar::Float) => "float".into(),
            Shape::Scalar(Scalar::Str) => "string".into(),
            Shape::Text(text) => text.name.into(),
            Shape::Record(record) => record.name.into(),
            Shape::Seq(elem) => format!("Vec<{}>", elem.type_name()),
            Shape::Array(len, elem) => format!("[{}; {len}]", elem.type_name()),
            Shape::Map(elem) => format!("Map<string, {}>", elem.type_name()),
            Shape::Optional(inner) => format!("Option<{}>", inner.type_name()),
        }
    }
}

/// How a field takes part in environment key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMode {
    /// Key token derived from the field name.
    Derived,
    /// Key token given explicitly.
    Explicit(&'static str),
    /// No token of its own; children are keyed under the parent's prefix.
    Flatten,
    /// Invisible to the index, including everything below it.
    Skip,
}

/// A record (struct) shape.
#[derive(Debug, Clone)]
pub struct Record {
    name: &'static str,
    fields: Vec<Field>,
}

impl Record {
    /// Starts a record named after `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self::named(short_type_name::<T>())
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by path segment (case-insensitive).
    pub fn find(&self, segment: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name == segment)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|field| field.name.eq_ignore_ascii_case(segment))
            })
    }
}

impl From<Record> for Shape {
    fn from(record: Record) -> Self {
        Shape::Record(record)
    }
}

/// One field of a [`Record`] plus its loader annotations.
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    mode: KeyMode,
    default: Option<Value>,
    shape: Shape,
}

impl Field {
    pub fn new<T: Schema>(name: &'static str) -> Self {
        Self::with_shape(name, T::shape())
    }

    pub fn with_shape(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            mode: KeyMode::Derived,
            default: None,
            shape,
        }
    }

    /// Use `key` as this field's environment token instead of its name.
    pub fn key(mut self, key: &'static str) -> Self {
        self.mode = KeyMode::Explicit(key);
        self
    }

    /// Key this field's children under the parent's prefix.
    pub fn flatten(mut self) -> Self {
        self.mode = KeyMode::Flatten;
        self
    }

    /// Hide this field and its subtree from the index.
    pub fn skip(mut self) -> Self {
        self.mode = KeyMode::Skip;
        self
    }

    /// Default literal. Strings are coerced to the field's shape when the
    /// default is applied, so `default("8080")` works for a `u16`.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Path segment for this field: the lowercase field name.
    pub fn segment(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn mode(&self) -> &KeyMode {
        &self.mode
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn parse_from_str<T>(raw: &str) -> Result<Value, String>
where
    T: FromStr + Serialize,
    T::Err: Display,
{
    let parsed = raw.parse::<T>().map_err(|e| e.to_string())?;
    serde_json::to_value(parsed).map_err(|e| e.to_string())
}

fn parse_duration(raw: &str) -> Result<Value, String> {
    let duration = coerce::parse_duration(raw)?;
    serde_json::to_value(duration).map_err(|e| e.to_string())
}

macro_rules! scalar_schema {
    ($($ty:ty => $scalar:expr),* $(,)?) => {
        $(
            impl Schema for $ty {
                fn shape() -> Shape {
                    Shape::Scalar($scalar)
                }
            }
        )*
    };
}

scalar_schema! {
    bool => Scalar::Bool,
    i8 => Scalar::Int(8),
    i16 => Scalar::Int(16),
    i32 => Scalar::Int(32),
    i64 => Scalar::Int(64),
    isize => Scalar::Int(64),
    u8 => Scalar::Uint(8),
    u16 => Scalar::Uint(16),
    u32 => Scalar::Uint(32),
    u64 => Scalar::Uint(64),
    usize => Scalar::Uint(64),
    f32 => Scalar::Float,
    f64 => Scalar::Float,
    String => Scalar::Str,
}

macro_rules! text_schema {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Schema for $ty {
                fn shape() -> Shape {
                    Shape::text::<$ty>()
                }
            }
        )*
    };
}

text_schema!(IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr);

impl Schema for PathBuf {
    fn shape() -> Shape {
        Shape::Text(Text::new(
            "PathBuf",
            Value::String(String::new()),
            parse_from_str::<PathBuf>,
        ))
    }
}

impl Schema for Duration {
    fn shape() -> Shape {
        let zero = serde_json::json!({ "secs": 0, "nanos": 0 });
        Shape::Text(Text::new("Duration", zero, parse_duration))
    }
}

impl<T: Schema> Schema for Vec<T> {
    fn shape() -> Shape {
        Shape::Seq(Box::new(T::shape()))
    }
}

impl<T: Schema, const N: usize> Schema for [T; N] {
    fn shape() -> Shape {
        Shape::Array(N, Box::new(T::shape()))
    }
}

impl<K, V: Schema, S> Schema for HashMap<K, V, S> {
    fn shape() -> Shape {
        Shape::Map(Box::new(V::shape()))
    }
}

impl<K, V: Schema> Schema for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Map(Box::new(V::shape()))
    }
}

impl<T: Schema> Schema for Option<T> {
    fn shape() -> Shape {
        match T::shape() {
            inner @ Shape::Optional(_) => inner,
            inner => Shape::Optional(Box::new(inner)),
        }
    }
}

impl<T: Schema> Schema for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}
