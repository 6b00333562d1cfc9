//! Client configuration file support.
//!
//! Loads session and discovery settings from TOML. Every field has a
//! default, so an empty file is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::DiscoveryOptions;
use crate::error::{TopologyError, TopologyResult};
use crate::session::SessionParams;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chassis id assigned after connecting
    #[serde(default = "default_chassis_id")]
    pub chassis_id: u16,

    /// Login name used as the owner of reserved ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum device requests in flight during discovery
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

fn default_chassis_id() -> u16 {
    1
}

fn default_max_concurrent_probes() -> usize {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chassis_id: default_chassis_id(),
            owner: None,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> TopologyResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> TopologyResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| TopologyError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded client configuration");
        Self::from_toml_str(&content)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> TopologyResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TopologyError::invalid_config("config", format!("failed to serialize: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> TopologyResult<()> {
        if self.session.chassis_id == 0 {
            return Err(TopologyError::invalid_config(
                "session.chassis_id",
                "must be >= 1",
            ));
        }

        if self.discovery.max_concurrent_probes == 0 {
            return Err(TopologyError::invalid_config(
                "discovery.max_concurrent_probes",
                "must be >= 1",
            ));
        }

        if let Some(owner) = &self.session.owner {
            if owner.trim().is_empty() {
                return Err(TopologyError::invalid_config(
                    "session.owner",
                    "must not be empty when set",
                ));
            }
        }

        Ok(())
    }

    /// Session parameters described by this configuration.
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            chassis_id: self.session.chassis_id,
            owner: self.session.owner.clone(),
            discovery: DiscoveryOptions::concurrent(self.discovery.max_concurrent_probes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.session.chassis_id, 1);
        assert_eq!(config.session.owner, None);
        assert_eq!(config.discovery.max_concurrent_probes, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[session]
owner = "alice"

[discovery]
max_concurrent_probes = 8
"#;
        let config = ClientConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.session.owner.as_deref(), Some("alice"));
        assert_eq!(config.discovery.max_concurrent_probes, 8);
        // Unspecified values should use defaults
        assert_eq!(config.session.chassis_id, 1);

        let params = config.session_params();
        assert_eq!(params.owner.as_deref(), Some("alice"));
        assert_eq!(params.discovery, DiscoveryOptions::concurrent(8));
    }

    #[test]
    fn test_validate_rejects_zero_chassis_id() {
        let err = ClientConfig::from_toml_str("[session]\nchassis_id = 0\n").unwrap_err();
        match err {
            TopologyError::InvalidConfig { field, .. } => assert_eq!(field, "session.chassis_id"),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = ClientConfig::default();
        config.discovery.max_concurrent_probes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_owner() {
        let mut config = ClientConfig::default();
        config.session.owner = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = ClientConfig::from_toml_str("[discovery]\nmax_concurrent_probes = \"many\"\n")
            .unwrap_err();
        assert!(matches!(err, TopologyError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nchassis_id = 2\nowner = \"bob\"").unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.session.chassis_id, 2);
        assert_eq!(config.session.owner.as_deref(), Some("bob"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, TopologyError::ConfigIo { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ClientConfig::default();
        config.session.owner = Some("carol".to_string());
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("owner = \"carol\""));
        assert_eq!(ClientConfig::from_toml_str(&toml_str).unwrap(), config);
    }
}
