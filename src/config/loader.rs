//! Configuration loader with environment variable support

use super::ObservabilityConfig;
use crate::error::Result;
use config::{Environment, File};
use std::path::Path;

/// Prefix for environment variable overrides, e.g. `CARE_TELEMETRY__LOG_LEVEL`
pub const ENV_PREFIX: &str = "CARE_TELEMETRY";

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ObservabilityConfig> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .build()?;

    let cfg: ObservabilityConfig = config.try_deserialize()?;
    Ok(cfg)
}

/// Load configuration from a TOML file with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<ObservabilityConfig> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: ObservabilityConfig = config.try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment as DeployEnvironment;
    use std::io::Write;

    fn write_temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_toml() {
        let path = write_temp_config(
            "telemetry",
            r#"
service = "wearable-sync"
environment = "staging"
log_level = "debug"

[metrics]
buffer_capacity = 250

[alerting]
enable_alerts = true
email_recipients = ["oncall@example.org"]
"#,
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.service, "wearable-sync");
        assert_eq!(config.environment, DeployEnvironment::Staging);
        assert_eq!(config.metrics.buffer_capacity, 250);
        assert_eq!(config.metrics.window_secs, 3600);
        assert_eq!(config.alerting.email_recipients, vec!["oncall@example.org"]);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = load_config("/nonexistent/telemetry.toml");
        assert!(matches!(result, Err(crate::error::TelemetryError::Config(_))));
    }
}
