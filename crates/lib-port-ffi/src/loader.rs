//! Dynamic library loading for estimator port modules.
//!
//! This module handles loading a precompiled estimator module and
//! extracting its three model-specific entry points.

use crate::abi::{EstimatorPortFn, InitializationFn, TerminationFn};
use crate::error::{PortError, PortResult};
use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default symbol prefix of the reference state-space model.
pub const DEFAULT_MODEL: &str = "StateSpaceModel1";

/// Default base name of the compiled module.
pub const DEFAULT_MODULE_STEM: &str = "EstimatorPortN";

/// The three lifecycle entry points of one model.
#[derive(Clone, Copy, Debug)]
pub struct EntryPoints {
    /// `<Model>_Initialization`
    pub initialization: InitializationFn,

    /// `<Model>_EstimatorPort`
    pub estimator_port: EstimatorPortFn,

    /// `<Model>_EstimatorPortTermination`
    pub termination: TerminationFn,
}

impl EntryPoints {
    /// Exported symbol names for a model prefix, in lifecycle order.
    pub fn symbol_names(model: &str) -> [String; 3] {
        [
            format!("{model}_Initialization"),
            format!("{model}_EstimatorPort"),
            format!("{model}_EstimatorPortTermination"),
        ]
    }
}

/// Loaded estimator module with extracted function pointers.
pub struct EstimatorLibrary {
    /// Keeps the module mapped for as long as the entry points are used.
    /// `None` when the entry points are linked into the host.
    library: Option<Library>,

    /// Path to the module file.
    pub path: String,

    /// Model symbol prefix.
    pub model: String,

    /// Module format detected from the path.
    pub format: LibraryFormat,

    entry: EntryPoints,
}

impl EstimatorLibrary {
    /// Load an estimator module from a shared library file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.dll` (Windows), `.so` (Linux) or `.dylib` (macOS) file
    /// * `model` - Symbol prefix, e.g. `StateSpaceModel1`
    ///
    /// # Safety
    ///
    /// The module must export entry points with the signatures in [`crate::abi`].
    /// A module with mismatched signatures causes undefined behavior when called.
    pub fn load<P: AsRef<Path>>(path: P, model: &str) -> PortResult<Arc<Self>> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        // Checked up front so a missing file never reaches the dynamic loader
        if !path.is_file() {
            return Err(PortError::ModuleNotFound { path: path_str });
        }

        let format = LibraryFormat::from_path(path);
        if format != LibraryFormat::native() {
            tracing::warn!(
                path = %path_str,
                format = ?format,
                native = ?LibraryFormat::native(),
                "Module extension does not match the platform library format"
            );
        }

        let library = unsafe { Library::new(loader_path(path)) }
            .map_err(|e| PortError::load_error(&path_str, e))?;

        let [init_name, port_name, term_name] = EntryPoints::symbol_names(model);
        let entry = unsafe {
            EntryPoints {
                initialization: resolve(&library, &init_name, &path_str)?,
                estimator_port: resolve(&library, &port_name, &path_str)?,
                termination: resolve(&library, &term_name, &path_str)?,
            }
        };

        tracing::info!(path = %path_str, model, "Loaded estimator module");

        Ok(Arc::new(Self {
            library: Some(library),
            path: path_str,
            model: model.to_string(),
            format,
            entry,
        }))
    }

    /// Build a library from entry points linked into the host process.
    pub fn from_entry_points(model: &str, entry: EntryPoints) -> Arc<Self> {
        tracing::debug!(model, "Using in-process estimator entry points");

        Arc::new(Self {
            library: None,
            path: format!("<in-process:{model}>"),
            model: model.to_string(),
            format: LibraryFormat::Unknown,
            entry,
        })
    }

    /// Whether the entry points come from a dynamically loaded module.
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    /// Get the initializer function pointer.
    pub fn initialization_fn(&self) -> InitializationFn {
        self.entry.initialization
    }

    /// Get the per-step port function pointer.
    pub fn estimator_port_fn(&self) -> EstimatorPortFn {
        self.entry.estimator_port
    }

    /// Get the terminator function pointer.
    pub fn termination_fn(&self) -> TerminationFn {
        self.entry.termination
    }
}

/// Path handed to the dynamic loader.
///
/// A bare file name is anchored to the current directory so the loader opens
/// the file that was checked above instead of searching the library path.
fn loader_path(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => path.to_path_buf(),
        _ => Path::new(".").join(path),
    }
}

/// Resolve one exported function.
///
/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &str, path: &str) -> PortResult<T> {
    unsafe {
        library
            .get::<T>(symbol.as_bytes())
            .map(|s| *s)
            .map_err(|_| PortError::symbol_not_found(symbol, path))
    }
}

/// Platform-specific library format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryFormat {
    /// Windows DLL.
    Dll,
    /// Linux/Unix shared object.
    So,
    /// macOS dynamic library.
    Dylib,
    /// Unknown format.
    Unknown,
}

impl LibraryFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("dll") | Some("DLL") => Self::Dll,
            Some("so") => Self::So,
            Some("dylib") => Self::Dylib,
            _ => Self::Unknown,
        }
    }

    /// File extension for this format, if known.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Dll => Some("dll"),
            Self::So => Some("so"),
            Self::Dylib => Some("dylib"),
            Self::Unknown => None,
        }
    }

    /// Default module path for this format under `dir`.
    pub fn default_module_path<P: AsRef<Path>>(self, dir: P) -> PathBuf {
        let file = match self.extension() {
            Some(ext) => format!("{DEFAULT_MODULE_STEM}.{ext}"),
            None => DEFAULT_MODULE_STEM.to_string(),
        };
        dir.as_ref().join(file)
    }

    /// Get the default format for the current platform.
    #[cfg(target_os = "windows")]
    pub fn native() -> Self {
        Self::Dll
    }

    #[cfg(target_os = "linux")]
    pub fn native() -> Self {
        Self::So
    }

    #[cfg(target_os = "macos")]
    pub fn native() -> Self {
        Self::Dylib
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    pub fn native() -> Self {
        Self::Unknown
    }
}
