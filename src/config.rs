//! Configuration of the native layer.
//!
//! The library search path comes from, in order of precedence:
//! 1. an explicit library home ([`NativeConfig::with_library_home`])
//! 2. the environment variable named by `library_path_env`
//! 3. the directory holding the running executable
//!
//! An optional built-in JNI directory is appended after whichever of these
//! applies.

use std::path::PathBuf;

use crate::library::DEFAULT_CAPACITY;
use crate::mangle::SymbolNaming;

/// Default environment variable consulted for the library path.
pub const LIBRARY_PATH_ENV: &str = "JVM_NATIVE_LIBRARY_PATH";

/// Base name of the runtime's own native library.
pub const NATIVE_LIBRARY: &str = "libnative";

/// Separator between entries of a library path.
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

fn library_suffix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ".dll"
    }
    #[cfg(target_os = "macos")]
    {
        ".dylib"
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        ".so"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeConfig {
    pub library_home: Option<String>,
    pub library_path_env: String,
    pub builtin_jni_path: Option<String>,
    pub native_library: String,
    pub library_suffix: String,
    pub max_libraries: usize,
    pub naming: SymbolNaming,
}

impl Default for NativeConfig {
    fn default() -> Self {
        NativeConfig {
            library_home: None,
            library_path_env: LIBRARY_PATH_ENV.to_string(),
            builtin_jni_path: None,
            native_library: NATIVE_LIBRARY.to_string(),
            library_suffix: library_suffix().to_string(),
            max_libraries: DEFAULT_CAPACITY,
            naming: SymbolNaming::default(),
        }
    }
}

impl NativeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the search path, ignoring the environment.
    pub fn with_library_home(mut self, home: impl Into<String>) -> Self {
        self.library_home = Some(home.into());
        self
    }

    pub fn with_library_path_env(mut self, var: impl Into<String>) -> Self {
        self.library_path_env = var.into();
        self
    }

    pub fn with_builtin_jni_path(mut self, path: impl Into<String>) -> Self {
        self.builtin_jni_path = Some(path.into());
        self
    }

    pub fn with_native_library(mut self, name: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.native_library = name.into();
        self.library_suffix = suffix.into();
        self
    }

    pub fn with_max_libraries(mut self, max: usize) -> Self {
        self.max_libraries = max;
        self
    }

    pub fn with_naming(mut self, naming: SymbolNaming) -> Self {
        self.naming = naming;
        self
    }

    /// The composed library search path.
    pub fn library_path(&self) -> String {
        let base = self
            .library_home
            .clone()
            .or_else(|| std::env::var(&self.library_path_env).ok())
            .or_else(discover_library_home);

        let mut path = base.unwrap_or_default();
        if let Some(builtin) = &self.builtin_jni_path {
            path.push(PATH_SEPARATOR);
            path.push_str(builtin);
        }
        path
    }

    /// Candidate files for the runtime's own library, in search order.
    pub fn default_library_candidates(&self) -> Vec<String> {
        self.library_path()
            .split(PATH_SEPARATOR)
            .filter(|dir| !dir.is_empty())
            .map(|dir| format!("{dir}/{}{}", self.native_library, self.library_suffix))
            .collect()
    }
}

/// Directory of the running executable.
fn discover_library_home() -> Option<String> {
    let exe: PathBuf = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.to_str().unwrap_or(".").to_string())
}
