use crate::vr::NearFar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoCubeConfig {
    pub main_scale: f32,
    pub spinning_scale: f32,
    pub orbit_radius: f32,
    /// Radians per second about +Y.
    pub angular_velocity: f32,
    /// Distance in front of the LOCAL origin the pair is placed at.
    pub distance: f32,
}

impl Default for DemoCubeConfig {
    fn default() -> Self {
        Self {
            main_scale: 0.25,
            spinning_scale: 0.1,
            orbit_radius: 0.5,
            angular_velocity: std::f32::consts::FRAC_PI_2,
            distance: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmSize {
    Standard,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub account_id: String,
    pub account_key: String,
    pub remote_rendering_domain: String,
    pub account_domain: String,
    pub model_uri: String,
    /// Reuses an existing session instead of creating one.
    pub session_id: Option<String>,
    pub lease_minutes: u32,
    pub vm_size: VmSize,
    pub status_poll_delay_ms: u64,
    pub overlay_distance: f32,
}

impl RemoteConfig {
    pub fn status_poll_delay(&self) -> Duration {
        Duration::from_millis(self.status_poll_delay_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            account_key: String::new(),
            remote_rendering_domain: "westus2.mixedreality.azure.com".to_string(),
            account_domain: "westus2.mixedreality.azure.com".to_string(),
            model_uri: "builtin://Engine".to_string(),
            session_id: None,
            lease_minutes: 10,
            vm_size: VmSize::Standard,
            status_poll_delay_ms: 10_000,
            overlay_distance: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    pub application_name: String,
    pub system_retry_ms: u64,
    pub idle_throttle_ms: u64,
    pub near_z: f32,
    pub far_z: f32,
    pub haptic_amplitude: f32,
    pub hand_cube_scale: f32,
    pub hologram_scale: f32,
    pub demo: DemoCubeConfig,
    pub remote: Option<RemoteConfig>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            application_name: "holo_xr".to_string(),
            system_retry_ms: 1000,
            idle_throttle_ms: 250,
            near_z: 20.0,
            far_z: 0.1,
            haptic_amplitude: 0.5,
            hand_cube_scale: 0.1,
            hologram_scale: 0.1,
            demo: DemoCubeConfig::default(),
            remote: None,
        }
    }
}

impl ProgramConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn system_retry_interval(&self) -> Duration {
        Duration::from_millis(self.system_retry_ms)
    }

    pub fn idle_throttle(&self) -> Duration {
        Duration::from_millis(self.idle_throttle_ms)
    }

    pub fn depth_range(&self) -> NearFar {
        NearFar {
            near: self.near_z,
            far: self.far_z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ProgramConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, ProgramConfig::default());
        assert!(config.depth_range().is_reversed());
        assert_eq!(config.system_retry_interval(), Duration::from_secs(1));
        assert_eq!(config.idle_throttle(), Duration::from_millis(250));
    }

    #[test]
    fn remote_block_fills_missing_fields() {
        let config = ProgramConfig::from_json_str(
            r#"{ "remote": { "account_id": "abc", "vm_size": "premium", "session_id": "s-1" } }"#,
        )
        .expect("parse");
        let remote = config.remote.expect("remote block");
        assert_eq!(remote.account_id, "abc");
        assert_eq!(remote.vm_size, VmSize::Premium);
        assert_eq!(remote.session_id.as_deref(), Some("s-1"));
        assert_eq!(remote.lease_minutes, 10);
        assert_eq!(remote.model_uri, "builtin://Engine");
        assert_eq!(remote.status_poll_delay(), Duration::from_secs(10));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            ProgramConfig::from_json_str("{ \"near_z\": "),
            Err(ConfigError::Json(_))
        ));
    }
}
