//! Loading plugin units from disk.
//!
//! Production plugins are cdylibs exporting [`PLUGIN_ENTRY`]. The
//! [`PluginLoader`] trait keeps the manager testable with in-memory plugins.

use crate::error::PluginError;
use crate::plugin::Plugin;
use libloading::{Library, Symbol};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exported constructor every plugin unit must provide:
/// `extern "C" fn() -> *mut dyn Plugin`, returning a `Box::into_raw`ed
/// instance.
pub const PLUGIN_ENTRY: &[u8] = b"strafe_plugin_create";

/// A constructed plugin together with the library it came from.
///
/// Field order matters: the instance must drop before the library that
/// contains its code is unmapped.
pub struct PluginHandle {
    pub plugin: Box<dyn Plugin>,
    pub _library: Option<Library>,
}

/// Source of plugin instances, keyed by plugin name.
pub trait PluginLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<PluginHandle, PluginError>;
    fn exists(&self, name: &str) -> bool;
}

/// Loads plugins from cdylib units in a directory.
///
/// A plugin named `motd` is expected at `<dir>/<DLL_PREFIX>motd<DLL_SUFFIX>`
/// (`libmotd.so` on Linux). Reload reopens the unit from disk, so replacing
/// the file and reloading picks up new code.
pub struct DylibLoader {
    directory: PathBuf,
}

impl DylibLoader {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{DLL_PREFIX}{name}{DLL_SUFFIX}"))
    }
}

impl PluginLoader for DylibLoader {
    fn load(&self, name: &str) -> Result<PluginHandle, PluginError> {
        let path = self.unit_path(name);
        debug!(plugin = name, path = %path.display(), "opening plugin unit");

        let library = unsafe { Library::new(&path) }.map_err(|e| PluginError::LoadFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let plugin = {
            let constructor: Symbol<unsafe extern "C" fn() -> *mut dyn Plugin> =
                unsafe { library.get(PLUGIN_ENTRY) }
                    .map_err(|_| PluginError::BadEntryPoint(name.to_string()))?;
            let raw = unsafe { constructor() };
            if raw.is_null() {
                return Err(PluginError::BadEntryPoint(name.to_string()));
            }
            unsafe { Box::from_raw(raw) }
        };

        if plugin.name() != name {
            return Err(PluginError::NameMismatch {
                unit: name.to_string(),
                declared: plugin.name().to_string(),
            });
        }

        Ok(PluginHandle {
            plugin,
            _library: Some(library),
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.unit_path(name).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_unit_is_load_failed_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DylibLoader::new(dir.path());

        assert!(!loader.exists("ghost"));
        assert!(matches!(
            loader.load("ghost"),
            Err(PluginError::LoadFailed { .. })
        ));
    }

    #[test]
    fn unit_paths_use_platform_naming() {
        let loader = DylibLoader::new("/srv/plugins");
        let path = loader.unit_path("motd");
        let file = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(file, format!("{DLL_PREFIX}motd{DLL_SUFFIX}"));
    }
}
