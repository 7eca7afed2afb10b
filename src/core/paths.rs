// src/core/paths.rs

use crate::constants::{PROJECT_DESCRIPTOR_FILENAME, PROJECT_PATH_ENV};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while locating the project root.
#[derive(Error, Debug)]
pub enum ProjectRootError {
    /// A path could not be canonicalized.
    #[error("Could not resolve path '{}': {source}", path.display())]
    Canonicalize {
        /// The path as given.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// No ancestor of the start directory holds a project descriptor.
    #[error("No '{}' found in '{}' or any of its parents.", PROJECT_DESCRIPTOR_FILENAME, start.display())]
    NotInProject {
        /// Where the search started.
        start: PathBuf,
    },
    /// An explicit or environment-provided root holds no project descriptor.
    #[error("'{}' (from {}) does not contain a '{}'.", path.display(), PROJECT_PATH_ENV, PROJECT_DESCRIPTOR_FILENAME)]
    InvalidOverride {
        /// The rejected root.
        path: PathBuf,
    },
}

/// Finds the project root: the closest directory, starting at `start` and walking up, that holds
/// an `s-project.json`.
///
/// The returned path is canonical (without the `\\?\` prefix on Windows).
pub fn find_project_root(start: &Path) -> Result<PathBuf, ProjectRootError> {
    let start = dunce::canonicalize(start).map_err(|source| ProjectRootError::Canonicalize {
        path: start.to_path_buf(),
        source,
    })?;

    let found = start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DESCRIPTOR_FILENAME).is_file())
        .map(Path::to_path_buf);

    match found {
        Some(root) => {
            log::debug!("Project root resolved to '{}'", root.display());
            Ok(root)
        }
        None => Err(ProjectRootError::NotInProject { start }),
    }
}

/// Resolves the project root for a command.
///
/// An explicit path wins, then the `LAMBDATREE_PROJECT_PATH` environment variable, then a search
/// upwards from the current directory. Explicit and environment paths must point at the root
/// itself.
pub fn resolve_project_root(explicit: Option<&Path>) -> Result<PathBuf, ProjectRootError> {
    let from_env = env::var_os(PROJECT_PATH_ENV).map(PathBuf::from);
    let pinned = explicit.map(Path::to_path_buf).or(from_env);

    if let Some(path) = pinned {
        let root = dunce::canonicalize(&path).map_err(|source| ProjectRootError::Canonicalize {
            path: path.clone(),
            source,
        })?;
        if !root.join(PROJECT_DESCRIPTOR_FILENAME).is_file() {
            return Err(ProjectRootError::InvalidOverride { path: root });
        }
        return Ok(root);
    }

    let cwd = env::current_dir().map_err(|source| ProjectRootError::Canonicalize {
        path: PathBuf::from("."),
        source,
    })?;
    find_project_root(&cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PROJECT_DESCRIPTOR_FILENAME), "{}").unwrap();
        let nested = dir.path().join("api/users/list");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, dunce::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_find_project_root_outside_project() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            find_project_root(dir.path()),
            Err(ProjectRootError::NotInProject { .. })
        ));
    }

    #[test]
    fn test_explicit_root_must_hold_descriptor() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            resolve_project_root(Some(dir.path())),
            Err(ProjectRootError::InvalidOverride { .. })
        ));

        fs::write(dir.path().join(PROJECT_DESCRIPTOR_FILENAME), "{}").unwrap();
        assert_eq!(
            resolve_project_root(Some(dir.path())).unwrap(),
            dunce::canonicalize(dir.path()).unwrap()
        );
    }
}
