use crate::error::Error;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Backing content of a compilation unit or of emitted object code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    File(PathBuf),
    Text { name: String, text: String },
    Memory { name: String, bytes: Vec<u8> },
}

impl Resource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Resource::File(path.into())
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Resource::Text {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Resource::Memory {
            name: name.into(),
            bytes,
        }
    }

    pub fn identifier(&self) -> String {
        match self {
            Resource::File(path) => path.display().to_string(),
            Resource::Text { name, .. } => name.clone(),
            Resource::Memory { name, .. } => name.clone(),
        }
    }

    pub fn read_to_string(&self) -> Result<String, Error> {
        match self {
            Resource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::ResourceRead(self.identifier(), e)),
            Resource::Text { text, .. } => Ok(text.clone()),
            Resource::Memory { bytes, .. } => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Resource::File(path) => {
                std::fs::read(path).map_err(|e| Error::ResourceRead(self.identifier(), e))
            }
            Resource::Text { text, .. } => Ok(text.as_bytes().to_vec()),
            Resource::Memory { bytes, .. } => Ok(bytes.clone()),
        }
    }

    fn directory(&self) -> Option<PathBuf> {
        match self {
            Resource::File(path) => path.parent().map(Path::to_path_buf),
            Resource::Text { name, .. } | Resource::Memory { name, .. } => {
                Path::new(name).parent().map(Path::to_path_buf)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Resolver

/// Maps an include path to a concrete resource, relative to the including one.
pub trait ResourceResolver {
    fn resolve(&self, path: &str, parent: Option<&Resource>) -> Result<Resource, Error>;
}

#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    include_dirs: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(&self, path: &str, parent: Option<&Resource>) -> Result<Resource, Error> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return match candidate.is_file() {
                true => Ok(Resource::file(candidate)),
                false => Err(Error::UnresolvedInclude(path.to_string())),
            };
        }

        let parent_dir = parent.and_then(Resource::directory);
        let search = parent_dir.into_iter().chain(self.include_dirs.iter().cloned());
        for dir in search {
            let full = dir.join(candidate);
            if full.is_file() {
                return Ok(Resource::file(full));
            }
        }
        if candidate.is_file() {
            return Ok(Resource::file(candidate));
        }
        Err(Error::UnresolvedInclude(path.to_string()))
    }
}

/// In-memory sources keyed by name, for tests and embedded programs.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: IndexMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_string(), text.to_string());
    }

    pub fn resource(&self, name: &str) -> Option<Resource> {
        self.files
            .get(name)
            .map(|text| Resource::text(name, text.as_str()))
    }
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, path: &str, parent: Option<&Resource>) -> Result<Resource, Error> {
        let relative = parent
            .and_then(Resource::directory)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(path).display().to_string());
        relative
            .and_then(|name| self.resource(&name))
            .or_else(|| self.resource(path))
            .ok_or_else(|| Error::UnresolvedInclude(path.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Matcher

/// Decides whether two resources denote the same source.
pub trait ResourceMatcher {
    fn is_same(&self, a: &Resource, b: &Resource) -> bool;
}

/// Compares by identifier; files by their canonical path.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierMatcher;

impl ResourceMatcher for IdentifierMatcher {
    fn is_same(&self, a: &Resource, b: &Resource) -> bool {
        match (a, b) {
            (Resource::File(a), Resource::File(b)) => {
                match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => a == b,
                }
            }
            _ => a.identifier() == b.identifier(),
        }
    }
}
