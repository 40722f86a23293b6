//! Locating and reading the config file.
//!
//! # Selection
//!
//! At most one file is used per load. In order of precedence:
//!
//! 1. An explicit path set on the builder.
//! 2. The path named by the `CONFIG` environment variable.
//! 3. A search: every directory from the configured [`SearchPath`]s, then the
//!    current working directory, then the home directory, is scanned for a
//!    file named `{name}.{ext}`. The first hit wins.
//!
//! Explicit and `CONFIG` paths are rejected if they contain `..`, and must
//! end in a known suffix. During a search, files with an unknown suffix are
//! simply passed over. Finding nothing is not an error.
//!
//! # File kinds
//!
//! The file kind is picked by matching the file name against an ordered
//! list of [`Extension`]s; the first matching suffix wins.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::LayerfigError;
use crate::types::{Extension, FileKind, SearchPath};

/// Name of the environment variable that points straight at a config file.
pub const CONFIG_VAR: &str = "CONFIG";

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// `app_name` is used by `SearchPath::Platform` to construct the platform-specific
/// config directory (e.g. `~/.config/{app_name}/` on Linux).
///
/// Returns `None` if the path cannot be resolved (e.g. no home directory found).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// The kind of `path`, by the first extension whose suffix ends its name.
pub fn file_kind(path: &Path, extensions: &[Extension]) -> Option<FileKind> {
    let name = path.to_string_lossy();
    extensions
        .iter()
        .find(|ext| name.ends_with(ext.suffix.as_str()))
        .map(|ext| ext.kind)
}

/// Validates a path given directly (builder option or `CONFIG`).
pub fn check_explicit(path: &Path, extensions: &[Extension]) -> Result<FileKind, LayerfigError> {
    if path.to_string_lossy().contains("..") {
        return Err(LayerfigError::PathTraversal {
            path: path.to_path_buf(),
        });
    }
    file_kind(path, extensions).ok_or_else(|| LayerfigError::UnknownFileType {
        path: path.to_path_buf(),
    })
}

/// Settles which file to load, if any.
///
/// `config_var` is the value of the `CONFIG` environment variable, passed in
/// so that callers control where it comes from.
pub fn locate(
    explicit: Option<&Path>,
    config_var: Option<&str>,
    name: &str,
    search_paths: &[SearchPath],
    extensions: &[Extension],
) -> Result<Option<(PathBuf, FileKind)>, LayerfigError> {
    if let Some(path) = explicit {
        let kind = check_explicit(path, extensions)?;
        return Ok(Some((path.to_path_buf(), kind)));
    }

    if let Some(raw) = config_var.filter(|raw| !raw.is_empty()) {
        let path = Path::new(raw);
        check_explicit(path, extensions)?;
        let path = std::path::absolute(path).map_err(|source| LayerfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let kind = check_explicit(&path, extensions)?;
        debug!(path = %path.display(), "config file from {CONFIG_VAR}");
        return Ok(Some((path, kind)));
    }

    let dirs = search_dirs(search_paths, name);
    Ok(search(&dirs, name, extensions))
}

/// Directories to scan, in order: the configured search paths, the
/// working directory, the home directory.
pub fn search_dirs(search_paths: &[SearchPath], app_name: &str) -> Vec<PathBuf> {
    search_paths
        .iter()
        .chain([SearchPath::Cwd, SearchPath::Home("")].iter())
        .filter_map(|sp| resolve_search_path(sp, app_name))
        .collect()
}

/// Scans `dirs` for `{name}.{ext}`. Unreadable directories are skipped.
pub fn search(dirs: &[PathBuf], name: &str, extensions: &[Extension]) -> Option<(PathBuf, FileKind)> {
    for dir in dirs {
        let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.clone());
        let Ok(entries) = std::fs::read_dir(&dir) else {
            trace!(dir = %dir.display(), "cannot read search directory");
            continue;
        };

        let mut files: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|ft| !ft.is_dir()))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();

        for file_name in files {
            if file_name.len() < 4 || file_name.starts_with('.') || file_name.contains("..") {
                continue;
            }
            let path = dir.join(&file_name);
            if path.extension().is_none() || path.file_stem().is_none_or(|stem| stem != name) {
                continue;
            }
            if let Some(kind) = file_kind(&path, extensions) {
                debug!(path = %path.display(), "found config file");
                return Some((path, kind));
            }
        }
    }
    None
}

/// Reads the whole file.
pub fn read(path: &Path) -> Result<Vec<u8>, LayerfigError> {
    std::fs::read(path).map_err(|source| LayerfigError::IoError {
        path: path.to_path_buf(),
        source,
    })
}
