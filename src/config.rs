// src/config.rs
//! Startup configuration read from a `.ron` file before the app is built
//! (the render backend has to be known before `RenderPlugin` initialises).

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use bevy::render::settings::{Backends, WgpuSettings};
use serde::{Deserialize, Serialize};

use crate::instancing::DemoSettings;

pub const DEFAULT_CONFIG_PATH: &str = "assets/demo.ron";

/// Graphics API the renderer runs on; the benchmark compares the two.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderBackend {
    /// Vulkan / Metal / DX12 through wgpu's WebGPU API.
    #[default]
    WebGpu,
    /// OpenGL (ES) backend, the native counterpart of WebGL2.
    Gl,
}

impl RenderBackend {
    pub fn backends(self) -> Backends {
        match self {
            RenderBackend::WebGpu => Backends::PRIMARY,
            RenderBackend::Gl => Backends::GL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderBackend::WebGpu => "WebGPU",
            RenderBackend::Gl => "GL",
        }
    }
}

#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub title: String,
    pub backend: RenderBackend,
    /// Fixed seed for reproducible layouts; random when absent.
    pub seed: Option<u64>,
    pub camera_distance: f32,
    pub settings: DemoSettings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Batched vs. merged meshes".to_string(),
            backend: RenderBackend::default(),
            seed: None,
            camera_distance: 30.0,
            settings: DemoSettings::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O while reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("RON parse error in {path}: {message}")]
    Ron { path: PathBuf, message: String },
}

impl DemoConfig {
    pub fn from_ron_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut cfg: DemoConfig = ron::de::from_str(text).map_err(|e| ConfigError::Ron {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.settings.count = DemoSettings::clamp_count(cfg.settings.count as i64);
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text, path)
    }

    pub fn wgpu_settings(&self) -> WgpuSettings {
        WgpuSettings {
            backends: Some(self.backend.backends()),
            ..default()
        }
    }
}

/// Where the config came from; logged once logging is up.
#[derive(Resource, Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { path: PathBuf, reason: String },
}

/// First CLI argument overrides `DEFAULT_CONFIG_PATH`. A missing or broken
/// file falls back to defaults.
pub fn load_from_args() -> (DemoConfig, ConfigSource) {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    match DemoConfig::load(&path) {
        Ok(cfg) => (cfg, ConfigSource::File(path)),
        Err(e) => (DemoConfig::default(), ConfigSource::Defaults { path, reason: e.to_string() }),
    }
}

pub fn log_config_source(source: Res<ConfigSource>, config: Res<DemoConfig>) {
    match &*source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults { path, reason } => {
            warn!("Using default config ({}: {reason})", path.display())
        }
    }
    info!(
        "Backend {}, {} x {}, seed {:?}",
        config.backend.label(),
        config.settings.method,
        config.settings.count,
        config.seed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instancing::builder::MAX_INSTANCE_COUNT;
    use crate::instancing::Method;

    #[test]
    fn partial_file_fills_in_defaults() {
        let text = r#"(
            backend: Gl,
            seed: Some(5),
            settings: (count: 1000, method: Merged),
        )"#;
        let cfg = DemoConfig::from_ron_str(text, Path::new("test.ron")).unwrap();
        assert_eq!(cfg.backend, RenderBackend::Gl);
        assert_eq!(cfg.seed, Some(5));
        assert_eq!(cfg.settings.count, 1000);
        assert_eq!(cfg.settings.method, Method::Merged);
        assert!(cfg.settings.sort_objects);
        assert_eq!(cfg.camera_distance, 30.0);
    }

    #[test]
    fn out_of_range_count_is_clamped() {
        let cfg = DemoConfig::from_ron_str("(settings: (count: 0))", Path::new("a.ron")).unwrap();
        assert_eq!(cfg.settings.count, 1);
        let cfg = DemoConfig::from_ron_str("(settings: (count: 9999999))", Path::new("a.ron")).unwrap();
        assert_eq!(cfg.settings.count, MAX_INSTANCE_COUNT);
    }

    #[test]
    fn bad_ron_reports_path() {
        let err = DemoConfig::from_ron_str("(backend: Vulkan9)", Path::new("bad.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Ron { .. }));
        assert!(err.to_string().contains("bad.ron"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = DemoConfig::load(Path::new("definitely/not/here.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn backend_maps_to_wgpu() {
        let cfg = DemoConfig { backend: RenderBackend::Gl, ..default() };
        assert_eq!(cfg.wgpu_settings().backends, Some(Backends::GL));
    }
}
