//! API specification document.
//!
//! The OpenAPI document is loaded once at deploy time, summarised for the
//! startup log, and served back verbatim. Its schemas are not interpreted.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read API spec {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API spec {path} is not valid YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("API spec {path} must be a mapping at the top level")]
    NotAMapping { path: String },

    #[error("API spec {path} has no openapi version")]
    MissingVersion { path: String },
}

/// What the startup log says about the loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSummary {
    pub openapi: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub paths: usize,
}

impl fmt::Display for SpecSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (openapi {}, {} paths)",
            self.title.as_deref().unwrap_or("untitled"),
            self.version.as_deref().unwrap_or("unversioned"),
            self.openapi,
            self.paths
        )
    }
}

#[derive(Debug, Clone)]
pub struct ApiSpec {
    path: PathBuf,
    raw: String,
    summary: SpecSummary,
}

impl ApiSpec {
    /// Read and check the document at `path`.
    pub async fn load(path: &Path) -> Result<Self, SpecError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SpecError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::parse(path, raw)
    }

    pub fn parse(path: &Path, raw: String) -> Result<Self, SpecError> {
        let display = || path.display().to_string();

        let document: Value = serde_yaml::from_str(&raw).map_err(|source| SpecError::Yaml {
            path: display(),
            source,
        })?;
        if !document.is_mapping() {
            return Err(SpecError::NotAMapping { path: display() });
        }

        let openapi = document
            .get("openapi")
            .and_then(scalar_to_string)
            .ok_or_else(|| SpecError::MissingVersion { path: display() })?;

        let info = document.get("info");
        let summary = SpecSummary {
            openapi,
            title: info.and_then(|i| i.get("title")).and_then(scalar_to_string),
            version: info.and_then(|i| i.get("version")).and_then(scalar_to_string),
            paths: document
                .get("paths")
                .and_then(Value::as_mapping)
                .map_or(0, |paths| paths.len()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            summary,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn summary(&self) -> &SpecSummary {
        &self.summary
    }
}

// YAML happily reads `openapi: 3.0` as a float.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
