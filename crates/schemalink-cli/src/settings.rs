use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CliError;

/// Settings file looked up in the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "schemalink.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub warnings_as_errors: bool,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            warnings_as_errors: false,
            log_filter: "warn".to_string(),
            log_json: false,
        }
    }
}

/// Load settings from `path`, or from [`DEFAULT_SETTINGS_FILE`] if it exists.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let path = match path {
        Some(path) => path,
        None => {
            let path = Path::new(DEFAULT_SETTINGS_FILE);
            if !path.exists() {
                return Ok(Settings::default());
            }
            path
        }
    };

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings: Settings = toml::from_str("log_json = true").expect("parse settings");
        assert!(settings.log_json);
        assert!(!settings.warnings_as_errors);
        assert_eq!(settings.log_filter, "warn");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("colour = \"red\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = load_settings(Some(Path::new("no/such/schemalink.toml")));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
