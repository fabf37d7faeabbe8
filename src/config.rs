use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::names::NameSet;
use crate::store::DEFAULT_BOOK_STRIDE;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = ".scriptref.toml";

/// Module file extension used when a module is given by name.
pub const MODULE_EXTENSION: &str = "SQLite3";

/// Which name set citations are resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameSource {
    /// The embedded set, or `names_file` when configured.
    #[default]
    Default,
    /// The module's own `books` table, falling back to the default set when it has none.
    Module,
}

/// Project configuration loaded from `.scriptref.toml`.
/// Relative paths are resolved against the directory the config was loaded from.
#[derive(Debug, Clone)]
pub struct Config {
    /// Step between consecutive canonical book ids.
    pub book_stride: u32,
    /// Where chapter index artifacts are written.
    pub cache_dir: PathBuf,
    /// Where modules are looked up by name.
    pub module_dir: PathBuf,
    /// Which name set parses citations.
    pub names: NameSource,
    /// JSON name table replacing the embedded default set.
    pub names_file: Option<PathBuf>,
}

/// Raw TOML structure for `.scriptref.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptrefTomlConfig {
    #[serde(default)]
    book_stride: Option<u32>,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    module_dir: Option<PathBuf>,
    #[serde(default)]
    names: NameSource,
    #[serde(default)]
    names_file: Option<PathBuf>,
}

impl Config {
    /// Load config from `.scriptref.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed. Never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::defaults_under(root)),
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: ScriptrefTomlConfig = toml::from_str(&content)?;
        let defaults = Self::defaults_under(root);
        return Ok(Self {
            book_stride: raw.book_stride.unwrap_or(defaults.book_stride),
            cache_dir: raw.cache_dir.map_or(defaults.cache_dir, |p| return root.join(p)),
            module_dir: raw.module_dir.map_or(defaults.module_dir, |p| return root.join(p)),
            names: raw.names,
            names_file: raw.names_file.map(|p| return root.join(p)),
        });
    }

    /// The default name set: `names_file` if configured, otherwise the embedded one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io`, `Error::Json`, or `Error::NameTable` if the table cannot be loaded.
    pub fn default_names(&self) -> Result<NameSet, Error> {
        return match &self.names_file {
            Some(path) => NameSet::from_json_file(path),
            None => NameSet::default_set(),
        };
    }

    /// Resolve a module argument: an existing file path is used as-is,
    /// anything else is looked up as `<module_dir>/<name>.SQLite3`.
    ///
    /// Returns the module key used for caching together with the file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::ModuleNotFound` if neither form exists.
    pub fn resolve_module(&self, module: &str) -> Result<(String, PathBuf), Error> {
        let direct = PathBuf::from(module);
        if direct.is_file() {
            let key = direct
                .file_stem()
                .map_or_else(|| return module.to_string(), |s| return s.to_string_lossy().into_owned());
            return Ok((key, direct));
        }

        let named = self.module_dir.join(format!("{module}.{MODULE_EXTENSION}"));
        if named.is_file() {
            return Ok((module.to_string(), named));
        }

        return Err(Error::ModuleNotFound {
            dir: self.module_dir.clone(),
            name: module.to_string(),
        });
    }

    /// Defaults with relative directories anchored at `root`.
    fn defaults_under(root: &Path) -> Self {
        return Self {
            book_stride: DEFAULT_BOOK_STRIDE,
            cache_dir: root.join(".scriptref-cache"),
            module_dir: root.to_path_buf(),
            names: NameSource::Default,
            names_file: None,
        };
    }
}
