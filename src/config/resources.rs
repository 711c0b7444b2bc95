//! Resource lookup along the configured search path.
//!
//! Resource names are relative file names (`ca.crt`, `account.pem`) resolved
//! against each search directory in order. A `classpath:` prefix is accepted
//! and ignored; absolute paths are used as-is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ResourceConfig;
use crate::error::{LedgerError, LedgerResult};

const CLASSPATH_PREFIX: &str = "classpath:";

/// Resolves resource names to files.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    search_paths: Vec<PathBuf>,
}

impl ResourceResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn from_config(config: &ResourceConfig) -> Self {
        Self::new(config.search_paths.clone())
    }

    /// Find the first existing file for `name`.
    pub fn locate(&self, name: &str) -> LedgerResult<PathBuf> {
        let name = name.trim();
        let name = name.strip_prefix(CLASSPATH_PREFIX).unwrap_or(name);
        if name.is_empty() {
            return Err(LedgerError::Configuration("empty resource name".to_string()));
        }

        let direct = Path::new(name);
        if direct.is_absolute() {
            if direct.is_file() {
                return Ok(direct.to_path_buf());
            }
        } else {
            for dir in &self.search_paths {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(LedgerError::Configuration(format!(
            "resource '{}' not found in search path {:?}",
            name, self.search_paths
        )))
    }

    /// Read the full contents of a resource.
    pub fn read(&self, name: &str) -> LedgerResult<Vec<u8>> {
        let path = self.locate(name)?;
        let bytes = fs::read(&path).map_err(|e| {
            LedgerError::Configuration(format!("cannot read resource {}: {}", path.display(), e))
        })?;
        tracing::debug!(resource = name, path = %path.display(), "Resource loaded");
        Ok(bytes)
    }
}
