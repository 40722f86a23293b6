use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::env;
use crate::error::LayerfigError;
use crate::file;
use crate::flags::Flags;
use crate::index::Index;
use crate::resolve::{self, ResolveInput, SourceFile};
use crate::schema::Schema;
use crate::types::{Extension, FileKind, Loaded, SearchPath, default_extensions};

/// File name stem searched for when no name is set.
pub const DEFAULT_NAME: &str = "config";

/// Entry point for building a layerfig configuration.
pub struct Layerfig;

impl Layerfig {
    pub fn builder<C: Schema>() -> LayerfigBuilder<C> {
        LayerfigBuilder::new()
    }
}

/// Builder for configuring and loading layered configuration.
///
/// Layers, lowest priority first: default literals, the config file,
/// environment variables, flags.
///
/// - **File**: [`file()`](Self::file), the `CONFIG` environment variable, or
///   a search for `{name}.{ext}` over [`search_paths()`](Self::search_paths),
///   the working directory and the home directory.
/// - **Environment**: enabled by [`name()`](Self::name) or
///   [`env_prefix()`](Self::env_prefix), keys resolved through the
///   [`Index`].
/// - **Flags**: [`flags()`](Self::flags), only the ones the user passed.
pub struct LayerfigBuilder<C: Schema> {
    file: Option<PathBuf>,
    name: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    extensions: Option<Vec<Extension>>,
    index: Option<Index>,
    renames: Vec<(String, String)>,
    strict: bool,
    env_prefix: Option<String>,
    env_enabled: bool,
    flags: Option<Flags>,
    _phantom: PhantomData<C>,
}

impl<C: Schema> LayerfigBuilder<C> {
    fn new() -> Self {
        Self {
            file: None,
            name: None,
            search_paths: None,
            extensions: None,
            index: None,
            renames: Vec::new(),
            strict: false,
            env_prefix: None,
            env_enabled: true,
            flags: None,
            _phantom: PhantomData,
        }
    }

    /// Load this file and skip discovery. The path must not contain `..`
    /// and must end in a known extension.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Set the application name. This derives:
    /// - the searched file stem (default: `"config"`)
    /// - the env prefix: `"my-app"` → `"MY_APP_"`
    /// - the platform config directory for [`SearchPath::Platform`]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Replace the search paths entirely. They are scanned in order, before
    /// the working directory and the home directory.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths.get_or_insert_with(Vec::new).push(path);
        self
    }

    /// Recognize only files ending in `suffix`.
    pub fn extension(mut self, suffix: &str, kind: FileKind) -> Self {
        self.extensions = Some(vec![Extension::new(suffix, kind)]);
        self
    }

    /// Replace the extension table. The first matching suffix wins.
    pub fn extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Resolve environment keys through `index` instead of one built from `C`.
    pub fn index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    /// Rename a substring of field names when deriving environment keys.
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_string(), to.to_string()));
        self
    }

    /// Enable or disable strict mode (default: `false`).
    /// In strict mode, prefixed environment variables that match no field
    /// are errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Derive the env prefix from `name` instead of the application name.
    pub fn env_prefix(mut self, name: &str) -> Self {
        self.env_prefix = Some(name.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Apply these flags on top of every other layer.
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = Some(flags);
        self
    }

    fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        self.search_paths.clone().unwrap_or_default()
    }

    fn effective_extensions(&self) -> Vec<Extension> {
        self.extensions.clone().unwrap_or_else(default_extensions)
    }

    /// Resolve the effective env prefix (None if env disabled or unnamed).
    fn effective_env_prefix(&self) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        self.env_prefix
            .as_deref()
            .or(self.name.as_deref())
            .map(env::prefix)
    }

    /// Build the `ResolveInput` from current builder state.
    fn build_input(&self) -> Result<ResolveInput<'_>, LayerfigError> {
        let config_var = std::env::var(file::CONFIG_VAR).ok();
        let found = file::locate(
            self.file.as_deref(),
            config_var.as_deref(),
            self.effective_name(),
            &self.effective_search_paths(),
            &self.effective_extensions(),
        )?;

        let file = match found {
            Some((path, kind)) => {
                debug!(path = %path.display(), ?kind, "loading config file");
                let bytes = file::read(&path)?;
                Some(SourceFile { path, kind, bytes })
            }
            None => {
                debug!(name = self.effective_name(), "no config file found");
                None
            }
        };

        let env_prefix = self.effective_env_prefix();
        let env_vars = match env_prefix {
            Some(_) => env::vars().collect(),
            None => Vec::new(),
        };

        Ok(ResolveInput {
            file,
            env_vars,
            env_prefix,
            index: self.index.clone(),
            renames: self.renames.clone(),
            strict: self.strict,
            flags: self.flags.as_ref(),
        })
    }

    /// Load and resolve the configuration through all layers.
    pub fn load(self) -> Result<Loaded<C>, LayerfigError>
    where
        C: DeserializeOwned,
    {
        let input = self.build_input()?;
        let file = input.file.as_ref().map(|source| source.path.clone());
        let config = resolve::resolve(input)?;
        Ok(Loaded { config, file })
    }
}
