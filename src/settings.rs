use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "inkmarks";

/// Empirically tuned constants that map tablet geometry onto PDF geometry.
///
/// These were measured on one device model and one rendering backend. They
/// are exposed so they can be recalibrated when firmware or hardware changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Glyph runs closer than this (device units) join the same passage.
    #[serde(default = "default_max_line_gap")]
    pub max_line_gap: f64,

    /// Display height of the tablet in device units.
    #[serde(default = "default_device_height")]
    pub device_height: f64,

    /// Applied to the device y-fraction before comparing with PDF positions.
    #[serde(default = "default_device_to_pdf_scale")]
    pub device_to_pdf_scale: f64,

    /// Quads closer than this fraction of page height belong to one match.
    #[serde(default = "default_cluster_gap_fraction")]
    pub cluster_gap_fraction: f32,

    /// Vertical shrink per side applied to overlay quads.
    #[serde(default = "default_highlight_trim")]
    pub highlight_trim: f32,
}

fn default_max_line_gap() -> f64 {
    100.0
}

fn default_device_height() -> f64 {
    1872.0
}

fn default_device_to_pdf_scale() -> f64 {
    0.70
}

fn default_cluster_gap_fraction() -> f32 {
    0.03
}

fn default_highlight_trim() -> f32 {
    0.20
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            max_line_gap: default_max_line_gap(),
            device_height: default_device_height(),
            device_to_pdf_scale: default_device_to_pdf_scale(),
            cluster_gap_fraction: default_cluster_gap_fraction(),
            highlight_trim: default_highlight_trim(),
        }
    }
}

/// Appearance of generated highlights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// RGB fill for overlay annotations, components in 0..=1
    #[serde(default = "default_overlay_color")]
    pub overlay_color: [f32; 3],

    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f32,

    /// Color tag attached to exported position records
    #[serde(default = "default_export_color")]
    pub export_color: String,
}

fn default_overlay_color() -> [f32; 3] {
    [1.0, 0.92, 0.3]
}

fn default_overlay_opacity() -> f32 {
    0.35
}

fn default_export_color() -> String {
    "#ffd400".to_string()
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            overlay_color: default_overlay_color(),
            overlay_opacity: default_overlay_opacity(),
            export_color: default_export_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub style: HighlightStyle,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            calibration: Calibration::default(),
            style: HighlightStyle::default(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the user config directory, writing defaults when absent.
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Load settings from an explicit file. Returns false when the file could
/// not be read or parsed; the previous settings stay in effect.
pub fn load_settings_from_path(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return false;
        }
    };

    match parse_settings(&content) {
        Ok(settings) => {
            debug!("Loaded settings from {path:?}");

            if settings.version > CURRENT_VERSION {
                warn!(
                    "Settings file {path:?} is version {}, newer than supported v{CURRENT_VERSION}; unknown keys are ignored",
                    settings.version
                );
            }

            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
            true
        }
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            false
        }
    }
}

pub fn parse_settings(content: &str) -> Result<Settings, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content)
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    let mut content = String::from(SETTINGS_HEADER);
    content.push_str(&body);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# inkmarks settings
# ============================================================================
# calibration.max_line_gap        glyph runs closer than this join one passage
# calibration.device_height       tablet display height in device units
# calibration.device_to_pdf_scale scale applied to the device y-fraction
# calibration.cluster_gap_fraction quad gap (fraction of page height) for one match
# calibration.highlight_trim      vertical shrink per side of overlay quads
#
# The calibration values were measured on a single tablet model.

"#;

pub fn get_calibration() -> Calibration {
    SETTINGS
        .read()
        .map(|s| s.calibration.clone())
        .unwrap_or_default()
}

pub fn get_highlight_style() -> HighlightStyle {
    SETTINGS
        .read()
        .map(|s| s.style.clone())
        .unwrap_or_default()
}
