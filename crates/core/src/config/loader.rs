//! Configuration file loader for the `.mpipe/` directory.
//!
//! This module loads `.mpipe/config.toml`, applies environment overrides
//! and validates the result before the engine is built from it.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use mp_protocol::{GlobalConfig, StepKey};
use std::path::Path;

/// Directory holding the engine configuration, relative to the project root.
pub const CONFIG_DIR: &str = ".mpipe";

/// Environment variable overriding `base_url`.
pub const BASE_URL_ENV: &str = "MPIPE_BASE_URL";

/// Loads configuration from `<root>/.mpipe/config.toml`.
///
/// # Arguments
///
/// * `root` - Directory containing the `.mpipe/` folder
///
/// # Returns
///
/// The validated configuration. A missing directory or file yields the
/// defaults rather than an error. `MPIPE_BASE_URL` overrides `base_url`.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, is not
/// valid TOML, or contains invalid values.
///
/// # Example
///
/// ```rust,no_run
/// use mp_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Talking to {}", config.base_url);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = root.join(CONFIG_DIR).join("config.toml");
    let config = if config_path.exists() {
        read_config_file(&config_path).await?
    } else {
        GlobalConfig::default()
    };

    let config = apply_overrides(config, std::env::var(BASE_URL_ENV).ok());
    validate(&config, &config_path)?;
    Ok(config)
}

/// Loads configuration from an explicit file path.
///
/// Unlike [`load_config`], a missing file is an error.
pub async fn load_config_file(path: &Path) -> ConfigResult<GlobalConfig> {
    let config = read_config_file(path).await?;
    let config = apply_overrides(config, std::env::var(BASE_URL_ENV).ok());
    validate(&config, path)?;
    Ok(config)
}

async fn read_config_file(path: &Path) -> ConfigResult<GlobalConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply the base URL override, ignoring blank values.
pub fn apply_overrides(mut config: GlobalConfig, base_url: Option<String>) -> GlobalConfig {
    if let Some(base_url) = base_url.filter(|url| !url.trim().is_empty()) {
        config.base_url = base_url.trim().to_string();
    }
    config
}

/// Check values the engine cannot work with.
pub fn validate(config: &GlobalConfig, path: &Path) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason,
    };

    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(invalid(format!(
            "base_url must be an http(s) URL, got {:?}",
            config.base_url
        )));
    }

    if config.poll.min_interval_ms == 0 {
        return Err(invalid("poll.min_interval_ms must be greater than 0".to_string()));
    }

    if config.poll.late_interval_ms < config.poll.early_interval_ms {
        return Err(invalid(
            "poll.late_interval_ms must not be shorter than poll.early_interval_ms".to_string(),
        ));
    }

    for (name, overrides) in &config.steps {
        name.parse::<StepKey>().map_err(invalid)?;
        if overrides.artifacts.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid(format!("steps.{name}.artifacts must not be empty")));
        }
    }

    Ok(())
}
