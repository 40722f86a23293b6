//! The path index: environment-style keys mapped to field paths.
//!
//! Building walks a record's [`Shape`] once and records, for every reachable
//! field, an upper snake-case key (`SERVER_SETTINGS[]_TAGS`) and the matching
//! lowercase dotted path (`server.settings[].tags`). Each collection dimension
//! crossed adds a `[]` placeholder to both, plus a synthetic entry for one
//! element of the collection.
//!
//! At runtime, keys carry concrete indices (`SERVER_SETTINGS[1]_TAGS[abc]`).
//! [`Index::find`] canonicalizes them, looks up the entry and substitutes the
//! bracket contents back into the path, left to right.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LayerfigError;
use crate::schema::{KeyMode, Schema, Shape};

static BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]").expect("bracket pattern is valid"));

pub(crate) const PLACEHOLDER: &str = "[]";

/// One entry of an [`Index`].
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Lowercase dotted path with `[]` placeholders.
    pub path: String,
    /// Shape of the value at the path.
    pub shape: Shape,
    /// The value at the path is an `Option` and starts out absent.
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn new(path: impl Into<String>, shape: Shape) -> Self {
        let optional = matches!(shape, Shape::Optional(_));
        Self {
            path: path.into(),
            shape,
            optional,
        }
    }
}

/// Immutable mapping from normalized key to [`FieldDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: BTreeMap<String, FieldDescriptor>,
}

impl Index {
    /// Builds the index for `C`. `renames` are literal substring
    /// replacements applied, in order, to field names before case
    /// normalization. Explicit keys are not renamed.
    ///
    /// A type that is not a record yields an empty index.
    pub fn build<C: Schema>(renames: &[(String, String)]) -> Result<Self, LayerfigError> {
        Self::from_shape(&C::shape(), renames)
    }

    pub fn from_shape(shape: &Shape, renames: &[(String, String)]) -> Result<Self, LayerfigError> {
        if shape.as_record().is_none() {
            return Ok(Self::default());
        }
        let mut collector = Collector::new(renames);
        collector.collect(shape.unwrap_optional(), &mut Vec::new(), &mut Vec::new(), false)?;
        Ok(Self {
            entries: collector.entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a runtime key to a concrete path.
    ///
    /// `SERVER_SETTINGS[1]_TAGS[abc]` resolves to `server.settings[1].tags[abc]`.
    pub fn find(&self, key: &str) -> Option<String> {
        let params: Vec<&str> = BRACES
            .captures_iter(key)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
            .collect();
        let canonical = BRACES.replace_all(key, PLACEHOLDER);
        let descriptor = self.entries.get(canonical.as_ref())?;

        let mut pieces = descriptor.path.split(PLACEHOLDER);
        let mut path = pieces.next().unwrap_or_default().to_string();
        let mut params = params.into_iter();
        for piece in pieces {
            path.push('[');
            path.push_str(params.next().unwrap_or_default());
            path.push(']');
            path.push_str(piece);
        }
        Some(path)
    }

    /// Whether `key`, ignoring bracket contents, is in the index.
    pub fn exists(&self, key: &str) -> bool {
        let canonical = BRACES.replace_all(key, PLACEHOLDER);
        self.entries.contains_key(canonical.as_ref())
    }

    /// Whether `path`, ignoring bracket contents, is the path of any entry.
    pub fn path_exists(&self, path: &str) -> bool {
        let canonical = BRACES.replace_all(path, PLACEHOLDER);
        self.entries
            .values()
            .any(|descriptor| descriptor.path == canonical)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// All descriptors, sorted by path.
    pub fn items(&self) -> Vec<&FieldDescriptor> {
        let mut items: Vec<_> = self.entries.values().collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    /// Paths of every optional entry, sorted.
    pub fn optional_paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self
            .entries
            .values()
            .filter(|descriptor| descriptor.optional)
            .map(|descriptor| descriptor.path.as_str())
            .collect();
        paths.sort_unstable();
        paths
    }
}

impl FromIterator<(String, FieldDescriptor)> for Index {
    fn from_iter<I: IntoIterator<Item = (String, FieldDescriptor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Lists the index as YAML, one `- KEY: {path: type}` item per entry.
impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<BTreeMap<&str, BTreeMap<&str, String>>> = self
            .entries
            .iter()
            .map(|(key, descriptor)| {
                let entry = BTreeMap::from([(descriptor.path.as_str(), descriptor.shape.type_name())]);
                BTreeMap::from([(key.as_str(), entry)])
            })
            .collect();
        let yaml = serde_yaml::to_string(&items).map_err(|_| fmt::Error)?;
        f.write_str(&yaml)
    }
}

struct Collector<'r> {
    renames: &'r [(String, String)],
    entries: BTreeMap<String, FieldDescriptor>,
}

impl<'r> Collector<'r> {
    fn new(renames: &'r [(String, String)]) -> Self {
        Self {
            renames,
            entries: BTreeMap::new(),
        }
    }

    fn collect(
        &mut self,
        shape: &Shape,
        keys: &mut Vec<String>,
        path: &mut Vec<String>,
        flatten: bool,
    ) -> Result<(), LayerfigError> {
        match shape.unwrap_optional() {
            Shape::Seq(elem) | Shape::Array(_, elem) | Shape::Map(elem) => {
                if flatten {
                    // A flattened field has no key segment to carry the
                    // placeholder, so nothing below it may produce entries.
                    let mut nested = Collector::new(self.renames);
                    nested.collect(elem, keys, path, true)?;
                    if !nested.entries.is_empty() {
                        return Err(LayerfigError::FlattenThroughCollection(path.join(".")));
                    }
                    return Ok(());
                }
                self.add(keys, path, shape)?;
                let (Some(key), Some(segment)) = (keys.last_mut(), path.last_mut()) else {
                    return Ok(());
                };
                key.push_str(PLACEHOLDER);
                segment.push_str(PLACEHOLDER);
                let result = self.collect(elem, keys, path, false);
                if let (Some(key), Some(segment)) = (keys.last_mut(), path.last_mut()) {
                    key.truncate(key.len() - PLACEHOLDER.len());
                    segment.truncate(segment.len() - PLACEHOLDER.len());
                }
                result
            }
            Shape::Record(record) => {
                if !flatten && !path.is_empty() {
                    self.add(keys, path, shape)?;
                }
                for field in record.fields() {
                    let token = match field.mode() {
                        KeyMode::Skip => continue,
                        KeyMode::Flatten => None,
                        KeyMode::Explicit(key) => Some(normalize_key(key)),
                        KeyMode::Derived => Some(normalize_key(&self.rename(field.name()))),
                    };
                    path.push(field.segment());
                    let result = match token {
                        Some(token) => {
                            keys.push(token);
                            let result = self.collect(field.shape(), keys, path, false);
                            keys.pop();
                            result
                        }
                        None => self.collect(field.shape(), keys, path, true),
                    };
                    path.pop();
                    result?;
                }
                Ok(())
            }
            Shape::Scalar(_) | Shape::Text(_) | Shape::Optional(_) => {
                if !flatten {
                    self.add(keys, path, shape)?;
                }
                Ok(())
            }
        }
    }

    fn rename(&self, name: &str) -> String {
        self.renames
            .iter()
            .fold(name.to_string(), |name, (from, to)| name.replace(from.as_str(), to))
    }

    fn add(&mut self, keys: &[String], path: &[String], shape: &Shape) -> Result<(), LayerfigError> {
        let key = keys.join("_");
        let descriptor = FieldDescriptor::new(path.join("."), shape.clone());
        if let Some(existing) = self.entries.get(&key) {
            return Err(LayerfigError::DuplicateKey {
                key,
                first: existing.path.clone(),
                second: descriptor.path,
            });
        }
        self.entries.insert(key, descriptor);
        Ok(())
    }
}

/// Normalizes a key token to upper snake case.
///
/// Single-cased tokens are only uppercased (`ALLCAPS`, `white_list`). Mixed
/// case gets an underscore at every lower-to-upper boundary, so runs of
/// capitals stay together: `ServerHost` is `SERVER_HOST`, `APIUrl` is `APIURL`.
pub fn normalize_key(token: &str) -> String {
    let token: String = token
        .chars()
        .map(|c| if matches!(c, '-' | '.' | ' ') { '_' } else { c })
        .collect();
    if token == token.to_uppercase() || token == token.to_lowercase() {
        return token.to_uppercase();
    }

    let mut out = String::with_capacity(token.len() + 4);
    let mut prev: Option<char> = None;
    for c in token.chars() {
        if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            out.push('_');
        }
        out.extend(c.to_uppercase());
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{IndexTestConfig, TestLoadConfig};
    use crate::schema::{Field, Record};

    fn index() -> Index {
        Index::build::<IndexTestConfig>(&[]).unwrap()
    }

    #[test]
    fn builds_every_entry() {
        let expected = [
            ("DB", "db"),
            ("DB_TAGS", "db.tags"),
            ("DB_TAGS[]", "db.tags[]"),
            ("DB_USER", "db.user"),
            ("SERVER", "server"),
            ("SERVER_API_URL", "server.api_url"),
            ("SERVER_FLAGS", "server.flags"),
            ("SERVER_FLAGS[]", "server.flags[]"),
            ("SERVER_HOST", "server.host"),
            ("SERVER_NAME", "server.settings2.name"),
            ("SERVER_PORT", "server.port"),
            ("SERVER_ROUTE", "server.route"),
            ("SERVER_ROUTE[]", "server.route[]"),
            ("SERVER_SETTINGS", "server.settings"),
            ("SERVER_SETTINGS[]", "server.settings[]"),
            ("SERVER_SETTINGS[]_NAME", "server.settings[].name"),
            ("SERVER_SETTINGS[]_TAGS", "server.settings[].tags"),
            ("SERVER_SETTINGS[]_TAGS[]", "server.settings[].tags[]"),
            ("SERVER_SETTINGS[]_VALUE", "server.settings[].value"),
            ("SERVER_VERY_LONG_NAME", "server.very_long_name"),
            ("SERVER_WL", "server.white_list"),
            ("SERVER_WL[]", "server.white_list[]"),
        ];
        let idx = index();
        let keys: Vec<&str> = expected.iter().map(|(key, _)| *key).collect();
        assert_eq!(idx.keys(), keys);
        for (key, path) in expected {
            assert_eq!(idx.get(key).unwrap().path, path, "{key}");
        }
    }

    #[test]
    fn records_element_types() {
        let idx = index();
        assert_eq!(idx.get("SERVER_WL").unwrap().shape.type_name(), "Vec<IpAddr>");
        assert_eq!(idx.get("SERVER_WL[]").unwrap().shape.type_name(), "IpAddr");
        assert_eq!(idx.get("SERVER_ROUTE[]").unwrap().shape.type_name(), "IpAddr");
        assert_eq!(idx.get("SERVER_FLAGS").unwrap().shape.type_name(), "[bool; 2]");
        assert_eq!(idx.get("SERVER_SETTINGS[]").unwrap().shape.type_name(), "IndexSettings");
    }

    #[test]
    fn find_substitutes_indices_left_to_right() {
        let idx = index();
        let cases = [
            ("SERVER", "server"),
            ("SERVER_WL", "server.white_list"),
            ("SERVER_FLAGS[xyz]", "server.flags[xyz]"),
            ("SERVER_SETTINGS[1]_TAGS[abc]", "server.settings[1].tags[abc]"),
            ("SERVER_SETTINGS[]_NAME", "server.settings[].name"),
            ("SERVER_API_URL", "server.api_url"),
            ("SERVER_VERY_LONG_NAME", "server.very_long_name"),
        ];
        for (key, path) in cases {
            assert_eq!(idx.find(key).as_deref(), Some(path), "{key}");
        }
    }

    #[test]
    fn find_round_trips_static_keys() {
        let idx = Index::build::<TestLoadConfig>(&[]).unwrap();
        for key in idx.keys() {
            if key.contains(PLACEHOLDER) {
                continue;
            }
            assert_eq!(idx.find(key).unwrap(), idx.get(key).unwrap().path);
        }
    }

    #[test]
    fn find_misses() {
        assert!(index().find("SERVER_INVALID_FIELD").is_none());
        assert!(index().find("SERVER_SETTINGS2_NAME").is_none());
    }

    #[test]
    fn skipped_fields_are_invisible() {
        let idx = index();
        assert!(!idx.path_exists("server.settings3"));
        assert!(!idx.path_exists("server.settings3.name"));
        assert!(!idx.path_exists("server.hidden"));
        assert!(!idx.path_exists("server.settings2"));
    }

    #[test]
    fn exists_ignores_bracket_contents() {
        let idx = index();
        assert!(idx.exists("SERVER_HOST"));
        assert!(idx.exists("SERVER_SETTINGS[]_NAME"));
        assert!(idx.exists("SERVER_SETTINGS[123]_NAME"));
        assert!(!idx.exists("NON_EXISTENT"));
    }

    #[test]
    fn path_exists_ignores_bracket_contents() {
        let idx = index();
        assert!(idx.path_exists("server.host"));
        assert!(idx.path_exists("server.settings[].name"));
        assert!(idx.path_exists("server.settings[123].name"));
        assert!(!idx.path_exists("non.existent"));
    }

    #[test]
    fn items_sorted_by_path() {
        let idx = index();
        let items = idx.items();
        assert_eq!(items.len(), 22);
        assert_eq!(items[0].path, "db");
        assert_eq!(items[items.len() - 1].path, "server.white_list[]");
    }

    #[test]
    fn display_lists_entries_as_yaml() {
        let text = index().to_string();
        assert!(text.starts_with("- DB:\n    db: IndexDb\n"));
        assert!(text.contains("- SERVER_HOST:\n    server.host: string\n"));
        assert!(text.contains("server.settings[].value: i64"));
    }

    #[test]
    fn non_record_yields_empty_index() {
        assert!(Index::build::<u16>(&[]).unwrap().is_empty());
        assert!(Index::build::<Option<u16>>(&[]).unwrap().is_empty());
    }

    struct Pointers;

    impl Schema for Pointers {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<Option<i32>>("ptr_field"))
                .field(Field::new::<Option<IndexInner>>("struct_ptr"))
                .into()
        }
    }

    struct IndexInner;

    impl Schema for IndexInner {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<i32>("nested"))
                .into()
        }
    }

    #[test]
    fn optional_entries() {
        let idx = Index::build::<Pointers>(&[]).unwrap();
        assert!(idx.get("PTR_FIELD").unwrap().optional);
        assert!(idx.get("STRUCT_PTR").unwrap().optional);
        assert!(!idx.get("STRUCT_PTR_NESTED").unwrap().optional);
        assert_eq!(idx.optional_paths(), vec!["ptr_field", "struct_ptr"]);
    }

    struct TextList;

    impl Schema for TextList {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<Vec<std::net::SocketAddr>>("list"))
                .into()
        }
    }

    #[test]
    fn text_elements_are_leaves() {
        let idx = Index::build::<TextList>(&[]).unwrap();
        assert!(idx.exists("LIST"));
        assert!(idx.exists("LIST[]"));
        assert_eq!(idx.len(), 2);
    }

    struct Camel;

    impl Schema for Camel {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("FooBar"))
                .field(Field::new::<String>("APIUrl"))
                .into()
        }
    }

    #[test]
    fn renames_apply_before_case_normalization() {
        let idx = Index::build::<Camel>(&[]).unwrap();
        assert!(idx.exists("FOO_BAR"));
        assert!(idx.exists("APIURL"));

        let renames = vec![
            ("Foo".to_string(), "Baz".to_string()),
            ("API".to_string(), "Api".to_string()),
        ];
        let idx = Index::build::<Camel>(&renames).unwrap();
        assert!(idx.exists("BAZ_BAR"));
        assert!(!idx.exists("FOO_BAR"));
        assert_eq!(idx.find("API_URL").as_deref(), Some("apiurl"));
    }

    struct FlattenedList;
    struct Top;

    impl Schema for FlattenedList {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<Top>("top").flatten())
                .into()
        }
    }

    impl Schema for Top {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<Vec<IndexInner>>("nested").flatten())
                .field(Field::new::<Vec<String>>("names").flatten())
                .into()
        }
    }

    #[test]
    fn flatten_through_collection_fails() {
        let err = Index::build::<FlattenedList>(&[]).unwrap_err();
        assert!(matches!(err, LayerfigError::FlattenThroughCollection(ref p) if p == "top.nested"));
    }

    struct Clash;

    impl Schema for Clash {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("api_url"))
                .field(Field::new::<String>("url").key("API_URL"))
                .into()
        }
    }

    #[test]
    fn colliding_keys_fail() {
        let err = Index::build::<Clash>(&[]).unwrap_err();
        assert!(matches!(err, LayerfigError::DuplicateKey { ref key, .. } if key == "API_URL"));
    }

    struct CaseClash;

    impl Schema for CaseClash {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("Name"))
                .field(Field::new::<i64>("name"))
                .into()
        }
    }

    #[test]
    fn fields_differing_only_in_case_collide() {
        let err = Index::build::<CaseClash>(&[]).unwrap_err();
        assert!(matches!(
            err,
            LayerfigError::DuplicateKey { ref key, ref first, ref second }
                if key == "NAME" && first == "name" && second == "name"
        ));
    }

    #[test]
    fn key_normalization() {
        let cases = [
            ("Simple", "SIMPLE"),
            ("camelCase", "CAMEL_CASE"),
            ("APIUrl", "APIURL"),
            ("ALLCAPS", "ALLCAPS"),
            ("alllower", "ALLLOWER"),
            ("ServerHost", "SERVER_HOST"),
            ("very_long_name", "VERY_LONG_NAME"),
            ("my-key", "MY_KEY"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_key(input), expected, "{input}");
        }
    }
}
