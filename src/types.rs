use std::path::PathBuf;

/// Where to search for config files.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    /// `Home("")` is the home directory itself.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit path.
    Path(PathBuf),
}

/// Content syntax of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Json,
    Yaml,
    Toml,
}

/// Maps a file name suffix to the codec used for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub suffix: String,
    pub kind: FileKind,
}

impl Extension {
    pub fn new(suffix: &str, kind: FileKind) -> Self {
        Self {
            suffix: suffix.to_string(),
            kind,
        }
    }
}

/// The suffix table used when the builder is not given one. Order matters:
/// the first matching suffix wins.
pub fn default_extensions() -> Vec<Extension> {
    vec![
        Extension::new(".json", FileKind::Json),
        Extension::new(".yaml", FileKind::Yaml),
        Extension::new(".yml", FileKind::Yaml),
        Extension::new(".toml", FileKind::Toml),
    ]
}

/// A loaded configuration together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<C> {
    pub config: C,
    /// The config file that was read, or `None` when no file was found.
    pub file: Option<PathBuf>,
}
