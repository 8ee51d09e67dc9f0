//! Export configuration.

use crate::capture::DEFAULT_SCALE;
use crate::error::{ExportError, ExportResult};
use crate::raster::RemoteImagePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime settings for the exporter binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Raster pixels per device-independent pixel.
    pub scale: f32,

    /// Directory receiving `<basename>.pdf`.
    pub output_dir: PathBuf,

    pub remote_images: RemoteImagePolicy,

    /// Structured JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            output_dir: PathBuf::from("."),
            remote_images: RemoteImagePolicy::Fetch,
            log_json: false,
        }
    }
}

impl ExportConfig {
    /// Defaults overridden by `EXPORT_SCALE`, `EXPORT_OUTPUT_DIR`,
    /// `EXPORT_REMOTE_IMAGES` and `EXPORT_LOG_JSON`.
    pub fn from_env() -> ExportResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ExportResult<Self> {
        let mut config = Self::default();

        if let Some(scale) = lookup("EXPORT_SCALE") {
            config.scale = scale
                .trim()
                .parse()
                .map_err(|_| ExportError::config(format!("EXPORT_SCALE is not a number: {}", scale)))?;
        }
        if let Some(dir) = lookup("EXPORT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("EXPORT_REMOTE_IMAGES") {
            config.remote_images = policy.parse()?;
        }
        if let Some(json) = lookup("EXPORT_LOG_JSON") {
            config.log_json = parse_flag("EXPORT_LOG_JSON", &json)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExportResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ExportError::config(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> ExportResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ExportError::config(format!("{} is not a boolean: {}", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExportConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.scale, 2.0);
    }

    #[test]
    fn test_env_overrides() {
        let config = ExportConfig::from_lookup(lookup(&[
            ("EXPORT_SCALE", "3"),
            ("EXPORT_OUTPUT_DIR", "/tmp/exports"),
            ("EXPORT_REMOTE_IMAGES", "deny"),
            ("EXPORT_LOG_JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(config.scale, 3.0);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.remote_images, RemoteImagePolicy::Deny);
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(ExportConfig::from_lookup(lookup(&[("EXPORT_SCALE", "big")])).is_err());
        assert!(ExportConfig::from_lookup(lookup(&[("EXPORT_SCALE", "-2")])).is_err());
        assert!(ExportConfig::from_lookup(lookup(&[("EXPORT_REMOTE_IMAGES", "sometimes")])).is_err());
        assert!(ExportConfig::from_lookup(lookup(&[("EXPORT_LOG_JSON", "perhaps")])).is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExportConfig = serde_json::from_str(r#"{"scale": 1.5}"#).unwrap();

        assert_eq!(config.scale, 1.5);
        assert_eq!(config.remote_images, RemoteImagePolicy::Fetch);
    }
}
