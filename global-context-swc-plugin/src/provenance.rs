//! Package provenance: which package does a source file belong to?
//!
//! Resolved by walking up from the file's directory to the nearest
//! `package.json`. Only `name` and `version` are consumed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "package.json";

/// Finds and reads package manifests.
pub trait ManifestLocator {
    /// Path of the nearest manifest in `dir` or any of its ancestors.
    fn locate(&self, dir: &Path) -> Option<PathBuf>;

    fn read(&self, manifest: &Path) -> Result<String>;
}

/// Walks the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsManifestLocator;

impl ManifestLocator for FsManifestLocator {
    fn locate(&self, dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|d| d.join(MANIFEST_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn read(&self, manifest: &Path) -> Result<String> {
        Ok(fs::read_to_string(manifest)?)
    }
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub manifest_path: PathBuf,
    pub package_name: String,
    pub package_version: String,
}

impl Provenance {
    pub fn parse(manifest_path: &Path, content: &str) -> Result<Self> {
        let pkg: PackageJson =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse {
                path: manifest_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let package_name = pkg
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::ManifestField {
                path: manifest_path.to_path_buf(),
                field: "name",
            })?;
        let package_version = pkg
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::ManifestField {
                path: manifest_path.to_path_buf(),
                field: "version",
            })?;

        Ok(Self {
            manifest_path: manifest_path.to_path_buf(),
            package_name,
            package_version,
        })
    }

    pub fn package_root(&self) -> &Path {
        self.manifest_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// `file` relative to the package root, always `/`-separated.
    pub fn relative_path(&self, file: &Path) -> String {
        let rel = file.strip_prefix(self.package_root()).unwrap_or(file);
        normalize_path(rel)
    }
}

/// Resolves the package owning `file`. `Ok(None)` when no manifest exists above it.
pub fn resolve(locator: &dyn ManifestLocator, file: &Path) -> Result<Option<Provenance>> {
    let dir = file.parent().unwrap_or_else(|| Path::new(""));
    let Some(manifest_path) = locator.locate(dir) else {
        return Ok(None);
    };
    let content = locator.read(&manifest_path)?;
    Provenance::parse(&manifest_path, &content).map(Some)
}

fn normalize_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect();
    parts.join("/").replace('\\', "/")
}
