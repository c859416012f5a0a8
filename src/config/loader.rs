use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::types::ProvisionerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "provisioner.yaml";

/// Load the config file at `path`. A missing file yields the defaults; a
/// file that exists but does not parse is an error.
pub fn load_config(path: &str) -> Result<ProvisionerConfig> {
    let p = Path::new(path);
    if !p.exists() {
        tracing::debug!(path, "Config file not found, using defaults");
        return Ok(ProvisionerConfig::default());
    }
    if !p.is_file() {
        bail!("Config path '{}' is not a file", path);
    }

    let content =
        fs::read_to_string(p).with_context(|| format!("Failed to read config file: {}", path))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path))?;
    validate(&config)?;
    Ok(config)
}

/// Parse YAML content into a ProvisionerConfig.
pub fn parse_config(content: &str) -> Result<ProvisionerConfig> {
    if content.trim().is_empty() {
        return Ok(ProvisionerConfig::default());
    }
    let config: ProvisionerConfig =
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;
    Ok(config)
}

fn validate(config: &ProvisionerConfig) -> Result<()> {
    if config.state.path.trim().is_empty() {
        bail!("state.path must not be empty");
    }
    if config.waiter.delay_secs > config.waiter.timeout_secs {
        bail!(
            "waiter.delay_secs ({}) exceeds waiter.timeout_secs ({})",
            config.waiter.delay_secs,
            config.waiter.timeout_secs
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = parse_config("waiter:\n  delay_secs: 5\npassword:\n  length: 24\n").unwrap();
        assert_eq!(config.waiter.delay_secs, 5);
        assert_eq!(config.waiter.timeout_secs, 1800);
        assert_eq!(config.password.length, 24);
        assert_eq!(config.state.path, ".provisioner/state.db");
        assert!(config.teardown.wait_for_deletion);
    }

    #[test]
    fn empty_content_is_default() {
        assert_eq!(parse_config("  \n").unwrap(), ProvisionerConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = load_config(&path.to_string_lossy()).unwrap();
        assert_eq!(config, ProvisionerConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provisioner.yaml");
        fs::write(&path, "waiter: [not, a, map]\n").unwrap();
        let err = load_config(&path.to_string_lossy()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn delay_longer_than_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provisioner.yaml");
        fs::write(&path, "waiter:\n  timeout_secs: 10\n  delay_secs: 60\n").unwrap();
        assert!(load_config(&path.to_string_lossy()).is_err());
    }
}
