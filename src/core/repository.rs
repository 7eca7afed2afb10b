// src/core/repository.rs

//! # Repository
//!
//! The filesystem serializer shared by every node kind. It knows where a node lives (its directory is
//! derived from the project root and the node's sPath), which descriptor file represents it, and how
//! to find candidate children: immediate subdirectories that carry the next-level descriptor.
//!
//! Descriptors are written as pretty-printed JSON followed by a newline, so saving an unchanged node
//! twice produces byte-identical files.

use crate::constants::{
    COMPONENT_DESCRIPTOR_FILENAME, FUNCTION_DESCRIPTOR_FILENAME, META_DIR,
    MODULE_DESCRIPTOR_FILENAME, PROJECT_DESCRIPTOR_FILENAME, TEMPLATES_FILENAME,
};
use crate::core::spath::{self, EntityKind};
use crate::core::templates::Templates;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised while reading or writing the project directory.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// An operation needing the project root ran before one was configured.
    #[error("No project path has been set. Run inside a project or set the project path explicitly.")]
    MissingProjectPath,
    /// The descriptor of the requested node is not on disk.
    #[error("The {kind} descriptor '{}' does not exist.", path.display())]
    NotFound {
        /// Kind of node that was being loaded.
        kind: EntityKind,
        /// Descriptor file that was probed.
        path: PathBuf,
    },
    /// A filesystem I/O error occurred.
    #[error("Filesystem error at '{}': {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A file did not contain the JSON shape it should.
    #[error("Error parsing JSON in '{}': {source}", path.display())]
    JsonParse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A value could not be turned into JSON.
    #[error("Failed to serialize to JSON: {0}")]
    JsonSerialize(#[source] serde_json::Error),
    /// Endpoints and events have no descriptor file of their own.
    #[error("A {0} is embedded in its function's descriptor and has no file of its own.")]
    EmbeddedKind(EntityKind),
}

type RepositoryResult<T> = Result<T, RepositoryError>;

/// Reads and parses a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> RepositoryResult<T> {
    let content = fs::read_to_string(path).map_err(|source| RepositoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| RepositoryError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> RepositoryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RepositoryError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut content = serde_json::to_string_pretty(value).map_err(RepositoryError::JsonSerialize)?;
    content.push('\n');
    fs::write(path, content).map_err(|source| RepositoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The descriptor file name of a kind, or `None` for kinds embedded in a function.
pub fn descriptor_filename(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Project => Some(PROJECT_DESCRIPTOR_FILENAME),
        EntityKind::Component => Some(COMPONENT_DESCRIPTOR_FILENAME),
        EntityKind::Module => Some(MODULE_DESCRIPTOR_FILENAME),
        EntityKind::Function => Some(FUNCTION_DESCRIPTOR_FILENAME),
        EntityKind::Endpoint | EntityKind::Event => None,
    }
}

/// Filesystem access rooted at one project directory.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    /// Creates a repository for the project at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the node addressed by `s_path` (the root itself for an empty path).
    pub fn entity_dir(&self, s_path: &str) -> PathBuf {
        spath::full_path(&self.root, s_path)
    }

    /// Location of the descriptor file for a node.
    pub fn descriptor_path(&self, kind: EntityKind, s_path: &str) -> RepositoryResult<PathBuf> {
        let filename = descriptor_filename(kind).ok_or(RepositoryError::EmbeddedKind(kind))?;
        Ok(self.entity_dir(s_path).join(filename))
    }

    /// Returns `true` if the node's descriptor exists.
    pub fn has_descriptor(&self, kind: EntityKind, s_path: &str) -> bool {
        self.descriptor_path(kind, s_path)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Reads a node's descriptor, failing with [`RepositoryError::NotFound`] when it is absent.
    pub fn read_descriptor<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        s_path: &str,
    ) -> RepositoryResult<T> {
        let path = self.descriptor_path(kind, s_path)?;
        if !path.is_file() {
            return Err(RepositoryError::NotFound { kind, path });
        }
        log::debug!("Reading {} descriptor '{}'", kind, path.display());
        read_json_file(&path)
    }

    /// Writes a node's descriptor.
    pub fn write_descriptor<T: Serialize + ?Sized>(
        &self,
        kind: EntityKind,
        s_path: &str,
        value: &T,
    ) -> RepositoryResult<()> {
        let path = self.descriptor_path(kind, s_path)?;
        log::debug!("Writing {} descriptor '{}'", kind, path.display());
        write_json_file(&path, value)
    }

    /// Names of the immediate subdirectories of a node's directory, sorted.
    ///
    /// These are only *candidates*: callers try to load each one and skip those without the expected
    /// descriptor. Hidden directories and the `_meta` directory are never candidates.
    pub fn list_child_dirs(&self, s_path: &str) -> RepositoryResult<Vec<String>> {
        let dir = self.entity_dir(s_path);
        let mut names = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "directory loop"));
                RepositoryError::Io { path, source }
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                log::debug!("Skipping non UTF-8 directory '{}'", entry.path().display());
                continue;
            };
            if name.starts_with('.') || name == META_DIR {
                continue;
            }
            names.push(name.to_string());
        }

        names.sort();
        Ok(names)
    }

    /// Reads the optional `s-templates.json` of a node. Absent file means no templates.
    pub fn read_templates(&self, s_path: &str) -> RepositoryResult<Templates> {
        let path = self.entity_dir(s_path).join(TEMPLATES_FILENAME);
        if !path.is_file() {
            return Ok(Templates::new());
        }
        read_json_file(&path)
    }

    /// Writes a node's templates. Nothing is written for an empty store, and a stale file is removed.
    pub fn write_templates(&self, s_path: &str, templates: &Templates) -> RepositoryResult<()> {
        let path = self.entity_dir(s_path).join(TEMPLATES_FILENAME);
        if templates.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(RepositoryError::Io { path, source }),
            };
        }
        write_json_file(&path, templates)
    }
}
