// src/core/meta.rs

//! # Meta (variable store)
//!
//! Variables are scoped three ways: project-wide, per stage, and per region within a stage. Lookups
//! go from the narrowest scope to the widest, so a region variable shadows a stage variable of the same
//! name, which in turn shadows a global one.
//!
//! On disk the store is a set of flat JSON maps under `_meta/variables`:
//!
//! | File                                    | Scope                 |
//! |-----------------------------------------|-----------------------|
//! | `s-variables-common.json`               | global                |
//! | `s-variables-<stage>.json`              | stage                 |
//! | `s-variables-<stage>-<regionkey>.json`  | region (dashes removed) |

use crate::constants::{
    COMMON_VARIABLES_STEM, META_DIR, VARIABLES_DIR, VARIABLES_FILE_PREFIX,
};
use crate::core::repository::{self, RepositoryError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, saving or querying the variable store.
#[derive(Error, Debug)]
pub enum MetaError {
    /// A variables file could not be read or written.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// The variables directory could not be listed.
    #[error("Failed to list variables directory '{}': {source}", path.display())]
    Io {
        /// The directory being listed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The named stage is not defined.
    #[error("Stage '{stage}' does not exist in this project.")]
    StageNotFound {
        /// The missing stage.
        stage: String,
    },
    /// The named region is not defined for the stage.
    #[error("Region '{region}' does not exist in stage '{stage}'.")]
    RegionNotFound {
        /// The stage that was searched.
        stage: String,
        /// The missing region.
        region: String,
    },
}

type MetaResult<T> = Result<T, MetaError>;

/// A flat map of variable name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(IndexMap<String, Value>);

impl Variables {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Defines or replaces a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Removes a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    /// Returns `true` if no variable is defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Variables of one region within a stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMeta {
    /// Region-scoped variables.
    pub variables: Variables,
}

/// Variables of one stage and its regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageMeta {
    /// Stage-scoped variables.
    pub variables: Variables,
    /// Regions keyed by their real name (e.g. `us-east-1`).
    pub regions: IndexMap<String, RegionMeta>,
}

/// The whole variable store of a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    /// Project-wide variables.
    pub variables: Variables,
    /// Stages keyed by name.
    pub stages: IndexMap<String, StageMeta>,
}

impl Meta {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `name` for `(stage, region)`: region, then stage, then global.
    pub fn resolve(&self, name: &str, stage: &str, region: &str) -> Option<&Value> {
        let stage_meta = self.stages.get(stage);
        stage_meta
            .and_then(|s| s.regions.get(region))
            .and_then(|r| r.variables.get(name))
            .or_else(|| stage_meta.and_then(|s| s.variables.get(name)))
            .or_else(|| self.variables.get(name))
    }

    /// Names of all stages.
    pub fn stages(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    /// Names of the regions of `stage` (empty if the stage is unknown).
    pub fn regions(&self, stage: &str) -> Vec<&str> {
        self.stages
            .get(stage)
            .map(|s| s.regions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Fails unless `stage` is defined.
    pub fn validate_stage_exists(&self, stage: &str) -> MetaResult<()> {
        if self.stages.contains_key(stage) {
            Ok(())
        } else {
            Err(MetaError::StageNotFound {
                stage: stage.to_string(),
            })
        }
    }

    /// Fails unless `region` is defined within `stage`.
    pub fn validate_region_exists(&self, stage: &str, region: &str) -> MetaResult<()> {
        self.validate_stage_exists(stage)?;
        if self.regions(stage).contains(&region) {
            Ok(())
        } else {
            Err(MetaError::RegionNotFound {
                stage: stage.to_string(),
                region: region.to_string(),
            })
        }
    }

    /// Sets a project-wide variable.
    pub fn set_global_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name, value);
    }

    /// Sets a stage variable, creating the stage if needed.
    pub fn set_stage_variable(
        &mut self,
        stage: &str,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .variables
            .insert(name, value);
    }

    /// Sets a region variable, creating the stage and region if needed.
    pub fn set_region_variable(
        &mut self,
        stage: &str,
        region: &str,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .regions
            .entry(region.to_string())
            .or_default()
            .variables
            .insert(name, value);
    }

    /// Loads `_meta/variables` under `project_root`. A missing directory yields an empty store.
    pub fn load(project_root: &Path) -> MetaResult<Self> {
        let dir = variables_dir(project_root);
        let mut meta = Self::new();
        if !dir.is_dir() {
            log::debug!("No variables directory at '{}'.", dir.display());
            return Ok(meta);
        }

        let io_error = |source| MetaError::Io {
            path: dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if let Some(name) = entry.file_name().to_str().filter(|n| !n.starts_with('.')) {
                files.push(name.to_string());
            }
        }
        files.sort();

        for file_name in files {
            let Some(stem) = file_name
                .strip_prefix(VARIABLES_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            let path = dir.join(&file_name);
            let variables: Variables = repository::read_json_file(&path)?;

            if stem == COMMON_VARIABLES_STEM {
                meta.variables = variables;
                continue;
            }
            match stem.split_once('-') {
                None => {
                    meta.stages.entry(stem.to_string()).or_default().variables = variables;
                }
                Some((stage, region_key)) => {
                    let region = variables
                        .get(REGION_VARIABLE)
                        .and_then(Value::as_str)
                        .filter(|name| region_file_key(name) == region_key)
                        .map(str::to_string)
                        .unwrap_or_else(|| region_key.to_string());
                    meta.stages
                        .entry(stage.to_string())
                        .or_default()
                        .regions
                        .insert(region, RegionMeta { variables });
                }
            }
        }

        log::debug!(
            "Loaded variables for {} stage(s) from '{}'.",
            meta.stages.len(),
            dir.display()
        );
        Ok(meta)
    }

    /// Writes the store back to `_meta/variables` under `project_root`.
    pub fn save(&self, project_root: &Path) -> MetaResult<()> {
        let dir = variables_dir(project_root);
        repository::write_json_file(
            &dir.join(variables_file_name(COMMON_VARIABLES_STEM)),
            &self.variables,
        )?;
        for (stage, stage_meta) in &self.stages {
            repository::write_json_file(
                &dir.join(variables_file_name(stage)),
                &stage_meta.variables,
            )?;
            for (region, region_meta) in &stage_meta.regions {
                // The file key drops dashes, so the real name travels in the `region` variable.
                let mut variables = region_meta.variables.clone();
                if variables.get(REGION_VARIABLE).is_none() {
                    variables.insert(REGION_VARIABLE, region.as_str());
                }
                let stem = format!("{}-{}", stage, region_file_key(region));
                repository::write_json_file(&dir.join(variables_file_name(&stem)), &variables)?;
            }
        }
        Ok(())
    }
}

/// Region variable holding the region's real name.
const REGION_VARIABLE: &str = "region";

fn variables_dir(project_root: &Path) -> PathBuf {
    project_root.join(META_DIR).join(VARIABLES_DIR)
}

fn variables_file_name(stem: &str) -> String {
    format!("{}{}.json", VARIABLES_FILE_PREFIX, stem)
}

/// Region names are stored without dashes: `us-east-1` becomes `useast1`.
fn region_file_key(region: &str) -> String {
    region.to_lowercase().replace('-', "")
}
