//! Syncable file classification

use std::path::Path;

/// Extensions the game accepts as script or text files
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".script", ".ns", ".txt"];

/// Extension allow-list, matched case-sensitively against the path suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileClassifier {
    extensions: Vec<String>,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()))
    }
}

impl FileClassifier {
    /// Build a classifier, keeping the first occurrence of each extension.
    ///
    /// Extensions given without a leading dot get one.
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.trim();
            if ext.is_empty() || ext == "." {
                continue;
            }
            let ext = if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{}", ext)
            };
            if !unique.contains(&ext) {
                unique.push(ext);
            }
        }
        Self { extensions: unique }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether the path ends with one of the configured extensions
    pub fn is_syncable(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Extensions without the dot, comma separated, for glob braces
    pub fn glob_alternatives(&self) -> String {
        self.extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.'))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Human readable list, e.g. "`.js`, `.script`"
    pub fn describe(&self) -> String {
        self.extensions
            .iter()
            .map(|ext| format!("`{}`", ext))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
