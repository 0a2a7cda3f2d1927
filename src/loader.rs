//! Template sources
//!
//! Template names are `/`-separated paths. Relative references from
//! `extends` and `include` are resolved against the directory of the
//! referencing template before reaching the loader.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Source of template text by name
pub trait TemplateLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<String>;
}

/// Loads templates from a base directory
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    base_dir: PathBuf,
}

impl FileSystemLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Full path of template `name`, refusing relative paths that leave the
    /// base directory
    ///
    /// Absolute names are used as given.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if Path::new(name).is_absolute() {
            return Ok(PathBuf::from(name));
        }
        let normalized = normalize(name);
        if normalized.is_empty() {
            return Err(Error::resolution("Empty template name"));
        }
        if normalized == ".." || normalized.starts_with("../") {
            return Err(Error::resolution(format!(
                "Template path '{}' escapes the template directory",
                name
            )));
        }
        Ok(self.base_dir.join(normalized))
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        log::debug!("Loading template '{}' from {}", name, path.display());

        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::resolution(format!(
                "Template '{}' not found in '{}'",
                name,
                self.base_dir.display()
            )),
            _ => Error::from(e).with_context(format!("Failed to read template '{}'", name)),
        })
    }
}

/// In-memory name → source map
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(normalize(&name.into()), source.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| Error::resolution(format!("Template '{}' not found", name)))
    }
}

/// Resolve `target` against the directory of template `current`
///
/// A leading `/` makes `target` relative to the loader root instead. Targets
/// relative to an absolute `current` stay absolute.
pub fn resolve_relative(current: &str, target: &str) -> String {
    if let Some(rooted) = target.strip_prefix('/') {
        return normalize(rooted);
    }
    let joined = match current.rsplit_once('/') {
        Some((dir, _)) => normalize(&format!("{}/{}", dir, target)),
        None => normalize(target),
    };
    if current.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Lexically collapse `.`, `..` and empty segments
///
/// Leading `..` segments that cannot be collapsed are kept so loaders can
/// reject them.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("page.html", "part.html"), "part.html");
        assert_eq!(resolve_relative("a/b/page.html", "part.html"), "a/b/part.html");
        assert_eq!(resolve_relative("a/b/page.html", "../part.html"), "a/part.html");
        assert_eq!(resolve_relative("a/page.html", "./x/../y.html"), "a/y.html");
        assert_eq!(resolve_relative("a/page.html", "/root.html"), "root.html");
        assert_eq!(resolve_relative("page.html", "../up.html"), "../up.html");
        assert_eq!(
            resolve_relative("/srv/views/page.html", "parts/nav.html"),
            "/srv/views/parts/nav.html"
        );
        assert_eq!(resolve_relative("/srv/views/page.html", "/nav.html"), "nav.html");
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with("a/b.html", "hello");
        assert_eq!(loader.load("a/b.html").unwrap(), "hello");
        assert_eq!(loader.load("a/./b.html").unwrap(), "hello");
        assert!(matches!(loader.load("c.html"), Err(Error::Resolution(_))));
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn test_file_system_loader() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/nav.html"), "<nav>").unwrap();

        let loader = FileSystemLoader::new(dir.path());
        assert_eq!(loader.load("partials/nav.html").unwrap(), "<nav>");
        assert!(matches!(
            loader.load("partials/missing.html"),
            Err(Error::Resolution(_))
        ));
    }

    #[test]
    fn test_file_system_loader_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileSystemLoader::new(dir.path().join("templates"));
        assert!(matches!(
            loader.load("../secret.txt"),
            Err(Error::Resolution(msg)) if msg.contains("escapes")
        ));
        assert!(loader.resolve("a/../../b").is_err());
        assert!(loader.resolve("a/../b").is_ok());
    }

    #[test]
    fn test_file_system_loader_absolute_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "page").unwrap();

        let loader = FileSystemLoader::new("templates");
        let name = path.to_str().unwrap();
        assert_eq!(loader.resolve(name).unwrap(), path);
        assert_eq!(loader.load(name).unwrap(), "page");
    }
}
