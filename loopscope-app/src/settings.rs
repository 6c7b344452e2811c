//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use loopscope_core::{
    filter::params::{MAX_GAIN_DB, MIN_GAIN_DB},
    session::DEFAULT_RESOURCE_ID,
    EngineConfig, FilterKind, FilterSettings, SessionConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub resource_root: PathBuf,
    pub resource_id: String,
    pub preferred_output_device: Option<String>,
    pub buffer_frames: Option<u32>,
    pub scope_capacity: usize,
    /// Samples per channel pulled on each display tick.
    pub scope_window: usize,
    pub display_fps: u32,
    pub meter_width: usize,
    pub filter_kind: FilterKind,
    pub filter_gain_db: f32,
    /// Length of one scripted gesture (press, sweep, release).
    pub sweep_period_secs: f32,
    pub run_seconds: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("assets"),
            resource_id: DEFAULT_RESOURCE_ID.into(),
            preferred_output_device: None,
            buffer_frames: None,
            scope_capacity: 4096,
            scope_window: 1024,
            display_fps: 60,
            meter_width: 32,
            filter_kind: FilterKind::ResonantHighShelf,
            filter_gain_db: -30.0,
            sweep_period_secs: 4.0,
            run_seconds: 20.0,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.resource_id = normalize_resource_id(&self.resource_id);
        self.preferred_output_device = self
            .preferred_output_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.buffer_frames = self.buffer_frames.map(|f| f.clamp(32, 8192));
        self.scope_capacity = self.scope_capacity.clamp(256, 65_536);
        self.scope_window = self.scope_window.clamp(1, self.scope_capacity);
        self.display_fps = self.display_fps.clamp(1, 240);
        self.meter_width = self.meter_width.clamp(4, 120);
        self.filter_gain_db = if self.filter_gain_db.is_finite() {
            self.filter_gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
        } else {
            -30.0
        };
        self.sweep_period_secs = finite_or(self.sweep_period_secs, 4.0).clamp(0.5, 60.0);
        self.run_seconds = finite_or(self.run_seconds, 20.0).clamp(0.5, 3_600.0);
    }

    /// Environment overrides (`LOOPSCOPE_*`) win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(root) = std::env::var_os("LOOPSCOPE_RESOURCE_ROOT") {
            self.resource_root = PathBuf::from(root);
        }
        if let Ok(id) = std::env::var("LOOPSCOPE_RESOURCE_ID") {
            self.resource_id = id;
        }
        if let Ok(device) = std::env::var("LOOPSCOPE_OUTPUT_DEVICE") {
            self.preferred_output_device = Some(device);
        }
        if let Some(secs) = std::env::var("LOOPSCOPE_RUN_SECONDS")
            .ok()
            .and_then(|v| v.trim().parse::<f32>().ok())
        {
            self.run_seconds = secs;
        }
        self.normalize();
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            resource_root: self.resource_root.clone(),
            resource_id: self.resource_id.clone(),
            engine: EngineConfig {
                scope_capacity: self.scope_capacity,
                filter_kind: self.filter_kind,
                initial_filter: FilterSettings {
                    gain: self.filter_gain_db,
                    ..FilterSettings::default()
                },
                preferred_device: self.preferred_output_device.clone(),
                buffer_frames: self.buffer_frames,
                ..EngineConfig::default()
            },
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

pub fn normalize_resource_id(raw: &str) -> String {
    let id = raw.trim();
    if id.is_empty() {
        DEFAULT_RESOURCE_ID.into()
    } else {
        id.into()
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("Loopscope")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("loopscope")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
