//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
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
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
remote:
  base_url: https://dms.example.com/DocuWare/Platform/
  username: migrator
  password: hunter2
  organization: Example Org
staging:
  host: localhost
  database: migration
  user: postgres
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.remote.object_id_field, "OBJECT_ID");
        assert_eq!(config.remote.login_timeout_secs, 30);
        assert_eq!(config.remote.upload_timeout_secs, 600);
        assert_eq!(config.staging.port, 5432);
        assert_eq!(config.staging.schema, "public");
        assert_eq!(config.staging.table, "staging_documents");
        assert_eq!(config.staging.ssl_mode, "require");
        assert_eq!(config.upload.delay_ms, 0);
    }

    #[test]
    fn test_base_strips_trailing_slash() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(
            config.remote.base(),
            "https://dms.example.com/DocuWare/Platform"
        );
    }

    #[test]
    fn test_delay_override_from_yaml() {
        let yaml = format!("{}upload:\n  delay_ms: 250\n", MINIMAL);
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.upload.delay(), std::time::Duration::from_millis(250));
    }

    #[test]
    fn test_missing_section_is_yaml_error() {
        let err = Config::from_yaml("remote:\n  base_url: http://x\n").unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Yaml(_)));
    }
}
