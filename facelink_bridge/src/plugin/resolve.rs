//! Per-load dependency resolution for module libraries.
//!
//! A module may ship its own builds of shared dependencies; those must bind
//! to the copies sitting next to the module binary, not to whatever the host
//! happens to link. The exception is the host-shared set: the contract crate
//! (and the math types it re-exports) must be the host's own copy, or tracking
//! data handed across the boundary would land in the wrong instance.

use crate::error::{BridgeError, BridgeResult};
use libloading::Library;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Names that always resolve to the host's already-loaded copies. Everything
/// else resolves against the module's own directory.
pub const HOST_SHARED: &[&str] = &["facelink_api", "glam"];

/// Outcome of resolving one dependency name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching library file next to the module binary.
    PluginLocal(PathBuf),
    /// Defer to the host's loaded copy.
    HostShared,
    /// Nothing matched; the caller must fail the load.
    NotFound,
}

/// Isolated lookup scope for one module load.
///
/// Lives exactly as long as the module it loaded: dropping the context drops
/// the preloaded dependency handles, invalidating every reference obtained
/// through them.
pub struct ResolutionContext {
    plugin_path: PathBuf,
    plugin_dir: PathBuf,
    preloaded: Vec<Library>,
}

/// Canonical dependency name for a library file: `lib` prefix stripped,
/// dashes folded to underscores.
fn library_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.strip_prefix("lib").unwrap_or(stem);
    Some(stem.replace('-', "_"))
}

fn normalize(name: &str) -> String {
    name.replace('-', "_")
}

impl ResolutionContext {
    /// Construct a scope rooted at the module binary's directory.
    pub fn new(plugin_path: &Path) -> BridgeResult<Self> {
        let plugin_path = std::fs::canonicalize(plugin_path).map_err(|e| {
            BridgeError::load(format!("module '{}': {}", plugin_path.display(), e))
        })?;
        let plugin_dir = plugin_path
            .parent()
            .ok_or_else(|| BridgeError::load("module path has no parent directory"))?
            .to_path_buf();

        Ok(Self {
            plugin_path,
            plugin_dir,
            preloaded: Vec::new(),
        })
    }

    pub fn plugin_path(&self) -> &Path {
        &self.plugin_path
    }

    /// Resolve a dependency name within this scope. File names may spell the
    /// name with dashes or underscores; both are checked.
    pub fn resolve(&self, name: &str) -> Resolution {
        let name = normalize(name);
        if HOST_SHARED.contains(&name.as_str()) {
            return Resolution::HostShared;
        }

        let ext = std::env::consts::DLL_EXTENSION;
        let dashed = name.replace('_', "-");
        for stem in [name.as_str(), dashed.as_str()] {
            for candidate in [
                self.plugin_dir.join(format!("lib{}.{}", stem, ext)),
                self.plugin_dir.join(format!("{}.{}", stem, ext)),
            ] {
                if candidate.is_file() {
                    return Resolution::PluginLocal(candidate);
                }
            }
        }
        Resolution::NotFound
    }

    /// Load every plugin-local dependency library found next to the module,
    /// so the module's own load binds against those builds. Host-shared names
    /// and the module binary itself are skipped. Handles are held for the
    /// lifetime of this context.
    pub fn preload(&mut self) -> BridgeResult<()> {
        let mut stems: Vec<String> = std::fs::read_dir(&self.plugin_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                (path.is_file() || path.is_symlink())
                    && path.extension().and_then(|e| e.to_str())
                        == Some(std::env::consts::DLL_EXTENSION)
                    // Dangling symlinks fail to canonicalize; keep them so
                    // resolve() can report them.
                    && std::fs::canonicalize(path)
                        .map(|p| p != self.plugin_path)
                        .unwrap_or(true)
            })
            .filter_map(|path| library_stem(&path))
            .collect();
        stems.sort();
        stems.dedup();

        for stem in stems {
            match self.resolve(&stem) {
                Resolution::HostShared => {
                    debug!("dependency '{}' is host-shared, not preloading", stem);
                }
                // Listed by the directory scan but not resolvable as a file:
                // a dangling symlink left by a broken module install.
                Resolution::NotFound => {
                    return Err(BridgeError::DependencyNotFound(stem));
                }
                Resolution::PluginLocal(path) => {
                    let library = open_global(&path).map_err(|e| {
                        BridgeError::load(format!(
                            "failed to preload dependency '{}': {}",
                            path.display(),
                            e
                        ))
                    })?;
                    info!("preloaded module dependency '{}'", path.display());
                    self.preloaded.push(library);
                }
            }
        }
        Ok(())
    }

    /// Number of dependency libraries held by this context.
    pub fn preloaded_count(&self) -> usize {
        self.preloaded.len()
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("plugin_path", &self.plugin_path)
            .field("preloaded", &self.preloaded.len())
            .finish()
    }
}

/// Open a dependency so later loads in this process resolve against it.
#[cfg(unix)]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    // RTLD_GLOBAL exposes the dependency's symbols to the module's load;
    // RTLD_NOW surfaces missing symbols here rather than mid-tick.
    let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL)? };
    Ok(library.into())
}

#[cfg(not(unix))]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    // Windows resolves imports per-module from the load directory.
    unsafe { Library::new(path) }
}
