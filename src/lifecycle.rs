//! Process setup: logging and settings resolution.

use std::path::{Path, PathBuf};

use crate::domain::models::PersistenceMode;
use crate::domain::settings::RecallSettings;
use crate::error::{AppError, Result};

/// Initialize logging with tracing_subscriber.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap())
        .add_directive("html5ever=warn".parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_ansi(true)
        .init();
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Default, Clone)]
pub struct SettingsOverrides {
    pub persistence_mode: Option<PersistenceMode>,
    pub listing_url: Option<String>,
    pub base_url: Option<String>,
    pub store_path: Option<PathBuf>,
    pub image_dir: Option<PathBuf>,
    pub request_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub track_terminated: bool,
}

/// Resolves settings from an optional JSON file plus overrides.
///
/// The persistence mode has to come from one of the two; there is no fallback.
pub fn load_settings(
    config: Option<&Path>,
    overrides: SettingsOverrides,
) -> Result<RecallSettings> {
    let mut settings = match config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
            let mut value: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
            if let (Some(mode), Some(obj)) = (overrides.persistence_mode, value.as_object_mut()) {
                obj.insert(
                    "persistence_mode".to_string(),
                    serde_json::Value::String(mode.as_str().to_string()),
                );
            }
            serde_json::from_value::<RecallSettings>(value)
                .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?
        }
        None => {
            let mode = overrides.persistence_mode.ok_or_else(|| {
                AppError::config("persistence mode not set: pass --mode or set persistence_mode in the config file")
            })?;
            RecallSettings::defaults_with_mode(mode)
        }
    };

    if let Some(v) = overrides.listing_url {
        settings.listing_url = v;
    }
    if let Some(v) = overrides.base_url {
        settings.base_url = v;
    }
    if let Some(v) = overrides.store_path {
        settings.store_path = v;
    }
    if let Some(v) = overrides.image_dir {
        settings.image_dir = v;
    }
    if let Some(v) = overrides.request_delay_ms {
        settings.request_delay_ms = v;
    }
    if let Some(v) = overrides.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if overrides.track_terminated {
        settings.track_terminated = true;
    }

    settings.validate()?;
    tracing::debug!(
        "[CONFIG] mode={} store={} images={} delay={}ms",
        settings.persistence_mode.as_str(),
        settings.store_path.display(),
        settings.image_dir.display(),
        settings.request_delay_ms
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mode_required_without_file() {
        let err = load_settings(None, SettingsOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("persistence mode not set"));
    }

    #[test]
    fn test_cli_mode_without_file() {
        let settings = load_settings(
            None,
            SettingsOverrides {
                persistence_mode: Some(PersistenceMode::Overwrite),
                request_delay_ms: Some(250),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.persistence_mode, PersistenceMode::Overwrite);
        assert_eq!(settings.request_delay_ms, 250);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r##"{"persistence_mode": "append", "store_path": "from_file.csv", "fixed_hashtags": "#Recall"}"##,
        )
        .unwrap();

        let settings = load_settings(
            Some(file.path()),
            SettingsOverrides {
                persistence_mode: Some(PersistenceMode::Overwrite),
                image_dir: Some(PathBuf::from("photos")),
                track_terminated: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.persistence_mode, PersistenceMode::Overwrite);
        assert_eq!(settings.store_path, PathBuf::from("from_file.csv"));
        assert_eq!(settings.image_dir, PathBuf::from("photos"));
        assert_eq!(settings.fixed_hashtags, "#Recall");
        assert!(settings.track_terminated);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = load_settings(
            None,
            SettingsOverrides {
                persistence_mode: Some(PersistenceMode::Append),
                request_timeout_secs: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
