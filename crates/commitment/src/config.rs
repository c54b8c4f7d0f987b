//! Commitment configuration, loadable from TOML.

use std::fs;
use std::path::Path;

use field::Digest;
use serde::{Deserialize, Serialize};

use crate::CommitmentError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitmentCfg {
    /// Text value hashed into every padding leaf.
    pub padding_value: String,
}

impl CommitmentCfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding_value(mut self, value: impl Into<String>) -> Self {
        self.padding_value = value.into();
        self
    }

    pub fn placeholder_leaf(&self) -> Digest {
        merkle::text_leaf(&self.padding_value)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CommitmentError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CommitmentError> {
        let s = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }
}
