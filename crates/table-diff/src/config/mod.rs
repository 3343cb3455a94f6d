//! Configuration loading, validation, and resolution.

mod resolve;
mod types;
mod validation;

pub use resolve::{exclusive_end, resolve_columns, resolve_upper_bound, DiffPlan};
pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// SHA256 fingerprint of the configuration, recorded in run reports.
    ///
    /// Passwords are blanked before hashing.
    pub fn hash(&self) -> String {
        let mut redacted = self.clone();
        redacted.left.password.clear();
        redacted.right.password.clear();

        let yaml = serde_yaml::to_string(&redacted).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
