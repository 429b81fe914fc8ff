//! Display-name role tags
//!
//! A fixed lookup from sender name to a tag appended to the display name,
//! e.g. `Mike` becomes `Mike [VOLUNTEER]`. Names are matched exactly.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RoleTable {
    roles: HashMap<String, String>,
}

impl RoleTable {
    pub fn new(roles: HashMap<String, String>) -> Self {
        Self { roles }
    }

    /// Load a JSON object of `{"name": "TAG"}` pairs
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::ConfigError(format!("Failed to read roles file '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| {
            RelayError::ConfigError(format!("Invalid roles file '{}': {}", path.display(), e))
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let roles: HashMap<String, String> = serde_json::from_str(raw)?;
        if let Some((name, _)) = roles.iter().find(|(_, tag)| tag.trim().is_empty()) {
            return Err(RelayError::ConfigError(format!("Empty role tag for '{}'", name)));
        }
        Ok(Self::new(roles))
    }

    pub fn role_of(&self, name: &str) -> Option<&str> {
        self.roles.get(name).map(String::as_str)
    }

    /// Name with its role suffix, or the name unchanged
    pub fn decorate(&self, name: &str) -> String {
        match self.role_of(name) {
            Some(tag) => format!("{} [{}]", name, tag),
            None => name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        let roles = [
            ("Mike", "VOLUNTEER"),
            ("Mark", "VOLUNTEER"),
            ("Rich", "MDPD"),
            ("Jake", "MDFR"),
            ("Jamie", "USCG"),
        ]
        .into_iter()
        .map(|(name, tag)| (name.to_string(), tag.to_string()))
        .collect();
        Self::new(roles)
    }
}
