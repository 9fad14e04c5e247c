use anyhow::{Context, Result};
use control_table::{load_models_file, ControlTables};
use lcr_calibration::{ArmLayout, CalibrationConfig};
use serde::Deserialize;
use servo_bus::BusSettings;
use servo_transport::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of an arm YAML file (see `configs/lcr.yaml`).
#[derive(Debug, Deserialize)]
pub struct ArmConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub arm: ArmLayout,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Extra control tables, resolved relative to the config file.
    #[serde(default)]
    pub models_file: Option<PathBuf>,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ArmConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading arm config {}", path.display()))?;
        let mut cfg: ArmConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing yaml: {}", path.display()))?;
        cfg.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        cfg.arm
            .validate()
            .with_context(|| format!("arm layout in {}", path.display()))?;
        cfg.calibration
            .validate(cfg.arm.joint_count())
            .with_context(|| format!("calibration poses in {}", path.display()))?;
        Ok(cfg)
    }

    /// Command-line overrides win over the file.
    pub fn override_with(&mut self, port: Option<String>, baud_rate: Option<u32>) {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(baud) = baud_rate {
            self.baud_rate = baud;
        }
    }

    pub fn settings(&self) -> BusSettings {
        BusSettings {
            baud_rate: self.baud_rate,
            timeout_ms: self.timeout_ms,
        }
    }

    /// Built-in X-series tables plus whatever `models_file` adds.
    pub fn control_tables(&self) -> Result<ControlTables> {
        let builtin = ControlTables::builtin();
        match &self.models_file {
            None => Ok(builtin),
            Some(file) => {
                let path = self.base_dir.join(file);
                let extra = load_models_file(&path)?;
                builtin
                    .extended(extra)
                    .with_context(|| format!("models in {}", path.display()))
            }
        }
    }
}
