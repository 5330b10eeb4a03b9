//! Comparator identity manifest
//!
//! The keyspace order is fixed the moment the first key is written. The
//! `IDENTITY` file records the comparator name at creation and every later
//! open must present the same name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

const IDENTITY_FILE: &str = "IDENTITY";
const COMPARATOR_FIELD: &str = "comparator";

/// Handle on a store's identity file
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    comparator: String,
}

impl Manifest {
    /// Check the stored comparator name, recording it on first open
    ///
    /// Fails with [`AtlasError::Config`] when the store was created with a
    /// different comparator.
    pub fn check_or_create(dir: &Path, comparator: &str) -> Result<Self> {
        let path = dir.join(IDENTITY_FILE);
        if !path.exists() {
            let mut file = fs::File::create(&path)?;
            writeln!(file, "{}={}", COMPARATOR_FIELD, comparator)?;
            file.sync_all()?;
            tracing::debug!(comparator, "Created store identity");
            return Ok(Self {
                path,
                comparator: comparator.to_string(),
            });
        }

        let contents = fs::read_to_string(&path)?;
        let stored = contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .find(|(field, _)| field.trim() == COMPARATOR_FIELD)
            .map(|(_, value)| value.trim().to_string())
            .ok_or_else(|| {
                AtlasError::Config(format!("{} has no comparator entry", path.display()))
            })?;

        if stored != comparator {
            tracing::error!(stored = %stored, requested = comparator, "Comparator mismatch");
            return Err(AtlasError::Config(format!(
                "comparator mismatch: store was created with '{}', opened with '{}'",
                stored, comparator
            )));
        }
        Ok(Self {
            path,
            comparator: stored,
        })
    }

    pub fn comparator(&self) -> &str {
        &self.comparator
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
