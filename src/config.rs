use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::camera::{CameraPreference, ControllerConfig, MacroMode};
use crate::detect::DetectorConfig;
use crate::geometry::Size;
use crate::quality::QualityConfig;
use crate::session::{SessionConfig, DEFAULT_NO_DETECTION_THRESHOLD};

const DEFAULT_VIEW_WIDTH: f64 = 390.0;
const DEFAULT_VIEW_HEIGHT: f64 = 844.0;

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    detector: Option<DetectorConfigFile>,
    quality: Option<QualityConfigFile>,
    camera: Option<CameraConfigFile>,
    session: Option<SessionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    min_aspect_ratio: Option<f64>,
    max_aspect_ratio: Option<f64>,
    min_confidence: Option<f32>,
    max_observations: Option<usize>,
    min_size: Option<f64>,
    quadrature_tolerance_degrees: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct QualityConfigFile {
    optimal_area_min: Option<f64>,
    optimal_area_max: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    preferred: Option<String>,
    macro_mode_enabled: Option<bool>,
    history_capacity: Option<usize>,
    switch_threshold: Option<f64>,
    cooldown_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    no_detection_threshold: Option<u32>,
    auto_scan: Option<bool>,
    view_width: Option<f64>,
    view_height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub detector: DetectorConfig,
    pub optimal_area_min: f64,
    pub optimal_area_max: f64,
    pub preferred_camera: CameraPreference,
    pub macro_mode_enabled: bool,
    pub history_capacity: usize,
    pub switch_threshold: f64,
    /// Seconds. Kept as a float until validated; see `cooldown()`.
    pub cooldown_secs: f64,
    pub no_detection_threshold: u32,
    pub auto_scan: bool,
    pub view_size: Size,
}

impl ScanConfig {
    /// Defaults, then the file named by `SCAN_CONFIG` if set, then
    /// `SCAN_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        Self::finish(file_cfg.unwrap_or_default())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::finish(read_config_file(path)?)
    }

    fn finish(file: ScanConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Result<Self> {
        let defaults = DetectorConfig::default();
        let det = file.detector.unwrap_or_default();
        let detector = DetectorConfig {
            min_aspect_ratio: det.min_aspect_ratio.unwrap_or(defaults.min_aspect_ratio),
            max_aspect_ratio: det.max_aspect_ratio.unwrap_or(defaults.max_aspect_ratio),
            min_confidence: det.min_confidence.unwrap_or(defaults.min_confidence),
            max_observations: det.max_observations.unwrap_or(defaults.max_observations),
            min_size: det.min_size.unwrap_or(defaults.min_size),
            quadrature_tolerance_degrees: det
                .quadrature_tolerance_degrees
                .unwrap_or(defaults.quadrature_tolerance_degrees),
        };

        let quality_defaults = QualityConfig::default();
        let quality = file.quality.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let session = file.session.unwrap_or_default();
        let controller = ControllerConfig::default();

        let preferred_camera = match camera.preferred.as_deref() {
            Some(value) => value.parse()?,
            None => CameraPreference::Auto,
        };

        Ok(Self {
            detector,
            optimal_area_min: quality
                .optimal_area_min
                .unwrap_or(quality_defaults.optimal_area_min),
            optimal_area_max: quality
                .optimal_area_max
                .unwrap_or(quality_defaults.optimal_area_max),
            preferred_camera,
            macro_mode_enabled: camera.macro_mode_enabled.unwrap_or(false),
            history_capacity: camera
                .history_capacity
                .unwrap_or(controller.history_capacity),
            switch_threshold: camera
                .switch_threshold
                .unwrap_or(controller.switch_threshold),
            cooldown_secs: camera
                .cooldown_secs
                .unwrap_or(controller.cooldown.as_secs_f64()),
            no_detection_threshold: session
                .no_detection_threshold
                .unwrap_or(DEFAULT_NO_DETECTION_THRESHOLD),
            auto_scan: session.auto_scan.unwrap_or(true),
            view_size: Size::new(
                session.view_width.unwrap_or(DEFAULT_VIEW_WIDTH),
                session.view_height.unwrap_or(DEFAULT_VIEW_HEIGHT),
            ),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(camera) = std::env::var("SCAN_PREFERRED_CAMERA") {
            if !camera.trim().is_empty() {
                self.preferred_camera = camera.parse()?;
            }
        }
        if let Ok(value) = std::env::var("SCAN_MACRO_MODE") {
            self.macro_mode_enabled = parse_bool("SCAN_MACRO_MODE", &value)?;
        }
        if let Ok(value) = std::env::var("SCAN_AUTO_SCAN") {
            self.auto_scan = parse_bool("SCAN_AUTO_SCAN", &value)?;
        }
        if let Ok(value) = std::env::var("SCAN_MIN_CONFIDENCE") {
            self.detector.min_confidence = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_MIN_CONFIDENCE must be a number"))?;
        }
        if let Ok(value) = std::env::var("SCAN_COOLDOWN_SECS") {
            self.cooldown_secs = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_COOLDOWN_SECS must be a number of seconds"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let det = &self.detector;
        if !(det.min_aspect_ratio > 0.0 && det.min_aspect_ratio <= det.max_aspect_ratio) {
            return Err(anyhow!(
                "aspect ratio bounds must satisfy 0 < min <= max (got {} / {})",
                det.min_aspect_ratio,
                det.max_aspect_ratio
            ));
        }
        if !(0.0..=1.0).contains(&det.min_confidence) {
            return Err(anyhow!("min_confidence must be within [0, 1]"));
        }
        if det.max_observations == 0 {
            return Err(anyhow!("max_observations must be at least 1"));
        }
        if !(0.0..=1.0).contains(&det.min_size) {
            return Err(anyhow!("min_size must be within [0, 1]"));
        }
        if !(det.quadrature_tolerance_degrees > 0.0 && det.quadrature_tolerance_degrees < 90.0) {
            return Err(anyhow!("quadrature tolerance must be within (0, 90) degrees"));
        }
        if !(0.0 <= self.optimal_area_min
            && self.optimal_area_min <= self.optimal_area_max
            && self.optimal_area_max <= 1.0)
        {
            return Err(anyhow!("optimal area band must be ordered within [0, 1]"));
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("history_capacity must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.switch_threshold) {
            return Err(anyhow!("switch_threshold must be within [0, 1]"));
        }
        if !(self.cooldown_secs.is_finite() && self.cooldown_secs > 0.0) {
            return Err(anyhow!("cooldown must be greater than zero"));
        }
        if !(self.view_size.width > 0.0 && self.view_size.height > 0.0) {
            return Err(anyhow!("view size must be positive"));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn macro_mode(&self) -> MacroMode {
        MacroMode::from_enabled(self.macro_mode_enabled)
    }

    pub fn quality(&self) -> QualityConfig {
        QualityConfig {
            optimal_area_min: self.optimal_area_min,
            optimal_area_max: self.optimal_area_max,
            min_aspect_ratio: self.detector.min_aspect_ratio,
            max_aspect_ratio: self.detector.max_aspect_ratio,
            quadrature_tolerance_degrees: self.detector.quadrature_tolerance_degrees,
        }
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            history_capacity: self.history_capacity,
            switch_threshold: self.switch_threshold,
            cooldown: self.cooldown(),
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            detector: self.detector,
            quality: self.quality(),
            no_detection_threshold: self.no_detection_threshold,
            auto_scan: self.auto_scan,
            view_size: self.view_size,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} must be a boolean (got '{}')", name, other)),
    }
}
