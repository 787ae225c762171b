//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::staging::identifier::validate_identifier;
use crate::staging::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Remote validation
    let base = config.remote.base_url.trim();
    if base.is_empty() {
        return Err(MigrateError::Config("remote.base_url is required".into()));
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(MigrateError::Config(format!(
            "remote.base_url must start with http:// or https://, got '{}'",
            base
        )));
    }
    if config.remote.username.is_empty() {
        return Err(MigrateError::Config("remote.username is required".into()));
    }
    if config.remote.organization.is_empty() {
        return Err(MigrateError::Config(
            "remote.organization is required".into(),
        ));
    }
    if config.remote.object_id_field.trim().is_empty() {
        return Err(MigrateError::Config(
            "remote.object_id_field cannot be empty".into(),
        ));
    }
    if config.remote.login_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "remote.login_timeout_secs must be at least 1".into(),
        ));
    }
    if config.remote.upload_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "remote.upload_timeout_secs must be at least 1".into(),
        ));
    }

    // Staging validation
    if config.staging.host.is_empty() {
        return Err(MigrateError::Config("staging.host is required".into()));
    }
    if config.staging.database.is_empty() {
        return Err(MigrateError::Config("staging.database is required".into()));
    }
    if config.staging.user.is_empty() {
        return Err(MigrateError::Config("staging.user is required".into()));
    }
    if config.staging.max_connections == 0 {
        return Err(MigrateError::Config(
            "staging.max_connections must be at least 1".into(),
        ));
    }
    validate_identifier(&config.staging.schema)?;
    validate_identifier(&config.staging.table)?;
    SslMode::parse(&config.staging.ssl_mode)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RemoteConfig, StagingConfig, UploadConfig};

    fn valid_config() -> Config {
        Config {
            remote: RemoteConfig {
                base_url: "https://dms.example.com/DocuWare/Platform".to_string(),
                username: "migrator".to_string(),
                password: "password".to_string(),
                organization: "Example Org".to_string(),
                object_id_field: "OBJECT_ID".to_string(),
                login_timeout_secs: 30,
                upload_timeout_secs: 600,
            },
            staging: StagingConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "migration".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                table: "staging_documents".to_string(),
                ssl_mode: "disable".to_string(),
                max_connections: 2,
            },
            upload: UploadConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_base_url() {
        let mut config = valid_config();
        config.remote.base_url = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_base_url_requires_http_scheme() {
        let mut config = valid_config();
        config.remote.base_url = "ftp://dms.example.com".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_missing_organization() {
        let mut config = valid_config();
        config.remote.organization = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_upload_timeout() {
        let mut config = valid_config();
        config.remote.upload_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_staging_host() {
        let mut config = valid_config();
        config.staging.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.staging.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_name_with_null_byte_rejected() {
        let mut config = valid_config();
        config.staging.table = "docs\0; DROP TABLE x".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_remote_config_debug_redacts_password() {
        let mut config = valid_config();
        config.remote.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.remote);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_staging_config_debug_redacts_password() {
        let mut config = valid_config();
        config.staging.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.staging);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
