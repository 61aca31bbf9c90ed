//! Data flowing through the build pipeline.

use std::path::Path;

use serde::Serialize;

/// A loaded and transformed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Path as given to [`Compiler::run`](crate::Compiler::run).
    pub path: String,
    /// Source after loaders and transforms.
    pub source: String,
}

impl Module {
    /// Returns the file extension, or `""` if there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }
}

/// An output file produced from a [`Module`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Output file name; always ends in `.js`.
    pub name: String,
    /// Output contents.
    pub content: String,
}

impl From<&Module> for Asset {
    fn from(module: &Module) -> Self {
        let stem = Path::new(&module.path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("index");
        Self {
            name: format!("{stem}.js"),
            content: module.source.clone(),
        }
    }
}

/// Summary of one [`Compiler::run`](crate::Compiler::run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Name of the compiler that produced this build.
    pub compiler: String,
    /// Modules left after optimization.
    pub modules: usize,
    /// Modules removed during optimization.
    pub removed: usize,
    /// Assets handed to the `emit` hook.
    pub assets: usize,
    /// Whether the `should_emit` hook allowed emitting.
    pub emitted: bool,
}

pub(crate) fn extension_of(path: &str) -> &str {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
}
