//! Core resolution pipeline: layer defaults, file, environment and flags
//! into a typed config.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Start from a zero document and apply default literals
//! 2. Build the index (unless one was supplied)
//! 3. Decode the file, merge it in and type-check the result
//! 4. Reload: rebuild the document with every optional record the file
//!    populated allocated up front, so those records get their own defaults
//! 5. Apply environment variables
//! 6. Apply explicitly set flags (highest priority)
//! 7. Deserialize the document into `C`

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec;
use crate::document::Document;
use crate::env;
use crate::error::LayerfigError;
use crate::flags::Flags;
use crate::index::{Index, PLACEHOLDER};
use crate::schema::Schema;
use crate::types::FileKind;

/// A config file read into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

/// All pre-loaded data needed to resolve a config. No I/O happens here.
#[derive(Debug, Default)]
pub struct ResolveInput<'a> {
    /// The file to merge, if one was found.
    pub file: Option<SourceFile>,
    /// Raw environment variable pairs (pass `env::vars().collect()` or synthetic data).
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix (e.g. `"MYAPP_"`). `None` means env disabled.
    pub env_prefix: Option<String>,
    /// Index to resolve environment keys with. Built from `C` when `None`.
    pub index: Option<Index>,
    /// Field-name renames used when the index is built here.
    pub renames: Vec<(String, String)>,
    /// Whether unknown environment keys are errors.
    pub strict: bool,
    /// Bound flags, applied last.
    pub flags: Option<&'a Flags>,
}

/// Resolve configuration from pre-loaded inputs.
pub fn resolve<C>(input: ResolveInput<'_>) -> Result<C, LayerfigError>
where
    C: Schema + DeserializeOwned,
{
    let mut doc = Document::of::<C>();
    doc.apply_defaults();

    let index = match input.index {
        Some(index) => index,
        None => Index::build::<C>(&input.renames)?,
    };
    // Optional values inside collections are allocated by the merge itself.
    let optional: Vec<&str> = index
        .optional_paths()
        .into_iter()
        .filter(|path| !path.contains(PLACEHOLDER))
        .collect();

    if let Some(file) = &input.file {
        let overlay = codec::decode(file.kind, &file.bytes).map_err(|source| LayerfigError::ParseError {
            path: file.path.clone(),
            source,
        })?;
        doc.merge(overlay.clone());
        check::<C>(&doc, &file.path)?;

        let mut present = Vec::new();
        for path in &optional {
            if doc.exists(path)? {
                present.push(*path);
            }
        }
        if !present.is_empty() {
            debug!(paths = ?present, "reloading optional records");
            let mut fresh = Document::of::<C>();
            fresh.apply_defaults();
            for path in &present {
                fresh.create(path)?;
            }
            fresh.merge(overlay);
            doc = fresh;
        }
    }

    if let Some(prefix) = &input.env_prefix {
        env::apply_env(&mut doc, &index, prefix, input.strict, input.env_vars)?;
    }

    if let Some(flags) = input.flags {
        flags.apply(&mut doc)?;
    }

    doc.into_record()
}

/// Checks that the merged document still deserializes into `C`.
fn check<C: DeserializeOwned>(doc: &Document, path: &Path) -> Result<(), LayerfigError> {
    serde_json::from_value::<C>(doc.value().clone())
        .map(drop)
        .map_err(|source| LayerfigError::FileContent {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::test::{Mode, TestLoadConfig, TestSub2};
    use crate::flags::test_flag::TestFlag;
    use crate::flags::{FlagKind, FlagValue};
    use std::time::Duration;

    fn yaml(content: &str) -> Option<SourceFile> {
        Some(SourceFile {
            path: "config.yaml".into(),
            kind: FileKind::Yaml,
            bytes: content.as_bytes().to_vec(),
        })
    }

    fn env_input<'a>(file: Option<SourceFile>, vars: &[(&str, &str)]) -> ResolveInput<'a> {
        ResolveInput {
            file,
            env_vars: vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            env_prefix: Some("MYAPP_".into()),
            ..ResolveInput::default()
        }
    }

    #[test]
    fn defaults_only() {
        let config: TestLoadConfig = resolve(ResolveInput::default()).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert!(config.enabled);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.mode, Mode::Fast);
        assert_eq!(config.sub.name, "sub-default");
        assert_eq!(config.sub2, None);
        assert!(config.slice.is_empty());
        assert!(config.servers.is_empty());
    }

    #[test]
    fn file_overrides_default() {
        let input = ResolveInput {
            file: yaml("port: 9090\ntimeout: 1m\n"),
            ..ResolveInput::default()
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn env_overrides_file() {
        let input = env_input(yaml("port: 9090\n"), &[("MYAPP_PORT", "9999")]);
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 9999);
    }

    #[test]
    fn set_flag_overrides_env() {
        let mut flags = Flags::new(None);
        flags
            .bind("Port", TestFlag::set("port", FlagKind::Int, FlagValue::Int(12345)))
            .unwrap();
        flags
            .bind("Host", TestFlag::unset("host", FlagKind::String, FlagValue::Str("flag".into())))
            .unwrap();

        let input = ResolveInput {
            flags: Some(&flags),
            ..env_input(yaml("port: 9090\nhost: filehost\n"), &[("MYAPP_PORT", "9999")])
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 12345);
        assert_eq!(config.host, "filehost");
    }

    #[test]
    fn env_disabled_ignores_vars() {
        let input = ResolveInput {
            env_prefix: None,
            ..env_input(None, &[("MYAPP_PORT", "9999")])
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn untouched_optional_stays_absent() {
        let input = ResolveInput {
            file: yaml("sub:\n  name: from-file\n"),
            ..ResolveInput::default()
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.sub.name, "from-file");
        assert_eq!(config.sub2, None);
    }

    #[test]
    fn partial_optional_gets_its_defaults() {
        let input = ResolveInput {
            file: yaml("host: filehost\nsub2:\n  name: given\n"),
            ..ResolveInput::default()
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.host, "filehost");
        assert_eq!(
            config.sub2,
            Some(TestSub2 {
                name: "given".into(),
                other: "sub2-default".into(),
            })
        );
    }

    #[test]
    fn env_can_allocate_optional() {
        let input = env_input(None, &[("MYAPP_SUB2_NAME", "from-env")]);
        let config: TestLoadConfig = resolve(input).unwrap();
        let sub2 = config.sub2.unwrap();
        assert_eq!(sub2.name, "from-env");
        assert_eq!(sub2.other, "sub2-default");
    }

    #[test]
    fn collection_elements_from_file_and_env() {
        let input = env_input(
            yaml("servers:\n  - port: 80\n"),
            &[("MYAPP_SERVERS[1]_PORT", "81"), ("MYAPP_SLICE", "a,b")],
        );
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].port, 80);
        assert_eq!(config.servers[1].port, 81);
        assert_eq!(config.servers[1].host, "0.0.0.0");
        assert_eq!(config.slice, vec!["a", "b"]);
    }

    #[test]
    fn strict_rejects_unknown_env_key() {
        let input = ResolveInput {
            strict: true,
            ..env_input(None, &[("MYAPP_NOPE", "1")])
        };
        let err = resolve::<TestLoadConfig>(input).unwrap_err();
        assert!(matches!(err, LayerfigError::KeyNotFound(_)));
    }

    #[test]
    fn lenient_ignores_unknown_env_key() {
        let input = env_input(None, &[("MYAPP_NOPE", "1"), ("OTHER_PORT", "1")]);
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn bad_env_value_is_fatal() {
        let input = env_input(None, &[("MYAPP_PORT", "abc")]);
        let err = resolve::<TestLoadConfig>(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
    }

    #[test]
    fn empty_files_keep_defaults() {
        let json_null = Some(SourceFile {
            path: "config.json".into(),
            kind: FileKind::Json,
            bytes: b"null".to_vec(),
        });
        for file in [yaml(""), yaml("# nothing here\n"), json_null] {
            let input = ResolveInput {
                file,
                ..ResolveInput::default()
            };
            let config: TestLoadConfig = resolve(input).unwrap();
            assert_eq!(config.port, 8080);
            assert_eq!(config.host, "localhost");
            assert_eq!(config.sub2, None);
        }
    }

    #[test]
    fn numbers_in_string_fields() {
        let input = ResolveInput {
            file: yaml("host: 1.2
sub2:
  name: 7
  other: true
"),
            ..ResolveInput::default()
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.host, "1.2");
        let sub2 = config.sub2.unwrap();
        assert_eq!(sub2.name, "7");
        assert_eq!(sub2.other, "true");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let input = ResolveInput {
            file: Some(SourceFile {
                path: "config.json".into(),
                kind: FileKind::Json,
                bytes: b"{ \"port\": ".to_vec(),
            }),
            ..ResolveInput::default()
        };
        let err = resolve::<TestLoadConfig>(input).unwrap_err();
        assert!(matches!(err, LayerfigError::ParseError { .. }));
    }

    #[test]
    fn wrong_type_in_file_is_content_error() {
        let input = ResolveInput {
            file: yaml("port: not-a-number\n"),
            ..ResolveInput::default()
        };
        let err = resolve::<TestLoadConfig>(input).unwrap_err();
        assert!(matches!(err, LayerfigError::FileContent { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn toml_file() {
        let input = ResolveInput {
            file: Some(SourceFile {
                path: "config.toml".into(),
                kind: FileKind::Toml,
                bytes: b"port = 7000\n[sub2]\nname = \"t\"\n".to_vec(),
            }),
            ..ResolveInput::default()
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.sub2.unwrap().other, "sub2-default");
    }

    #[test]
    fn supplied_index_is_used() {
        let index = Index::build::<TestLoadConfig>(&[("port".into(), "listen_port".into())]).unwrap();
        let input = ResolveInput {
            index: Some(index),
            ..env_input(None, &[("MYAPP_LISTEN_PORT", "4000"), ("MYAPP_PORT", "5000")])
        };
        let config: TestLoadConfig = resolve(input).unwrap();
        assert_eq!(config.port, 4000);
    }
}
