//! Rover configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock DualShock 4 layout:
//!
//! ```toml
//! [device]
//! path = "/dev/input/event4"
//!
//! [drive]
//! deadzone = 6.2
//! shaping_weight = 0.6
//!
//! [[sound.bindings]]
//! channel = "axis_d_pad_y"
//! value = -1
//! clip = "sounds/siren.wav"
//! ```

use crate::controller::{Channel, FrameLayout};
use crate::output::{IndicatorCommand, LedColor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "dualdrive";
const CONFIG_FILE: &str = "config.toml";

// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub drive: DriveConfig,
    pub indicator: IndicatorConfig,
    pub sound: SoundConfig,
    pub accessory: AccessoryConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub layout: FrameLayout,
    /// Upper bound on one blocking wait for input; also bounds stop latency
    pub poll_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/input/event4"),
            layout: FrameLayout::native(),
            poll_timeout_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub steering_axis: Channel,
    pub forward_trigger: Channel,
    pub reverse_trigger: Channel,
    /// Steering in stick mode
    pub stick_steering_axis: Channel,
    /// Throttle in stick mode, pushed away from the driver is forward
    pub stick_throttle_axis: Channel,
    pub deadzone: f64,
    pub shaping_weight: f64,
    pub trigger_max: i32,
    pub tick_interval_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            steering_axis: Channel::AxisLeftStickX,
            forward_trigger: Channel::AxisR2,
            reverse_trigger: Channel::AxisL2,
            stick_steering_axis: Channel::AxisRightStickX,
            stick_throttle_axis: Channel::AxisLeftStickY,
            deadzone: 6.2,
            shaping_weight: 0.6,
            trigger_max: 255,
            tick_interval_ms: 5,
        }
    }
}

/// LED state shown for one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorPattern {
    Off,
    Solid { left: LedColor, right: LedColor },
}

impl IndicatorPattern {
    pub fn solid(color: LedColor) -> Self {
        IndicatorPattern::Solid {
            left: color,
            right: color,
        }
    }

    pub fn command(self) -> IndicatorCommand {
        match self {
            IndicatorPattern::Off => IndicatorCommand::AllOff,
            IndicatorPattern::Solid { left, right } => IndicatorCommand::Set { left, right },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub maneuver_toggle: Channel,
    pub stick_toggle: Channel,
    pub default_pattern: IndicatorPattern,
    pub maneuver_pattern: IndicatorPattern,
    pub stick_pattern: IndicatorPattern,
    pub tick_interval_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            maneuver_toggle: Channel::ButtonTriangle,
            stick_toggle: Channel::ButtonSquare,
            default_pattern: IndicatorPattern::solid(LedColor::Green),
            maneuver_pattern: IndicatorPattern::solid(LedColor::Amber),
            stick_pattern: IndicatorPattern::Solid {
                left: LedColor::Green,
                right: LedColor::Orange,
            },
            tick_interval_ms: 20,
        }
    }
}

/// A clip started by a channel reporting `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundBinding {
    pub channel: Channel,
    pub value: i32,
    pub clip: String,
}

impl SoundBinding {
    pub fn new(channel: Channel, value: i32, clip: impl Into<String>) -> Self {
        Self {
            channel,
            value,
            clip: clip.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub bindings: Vec<SoundBinding>,
    /// Instant beep, independent of the clip that is playing
    pub horn: Option<Channel>,
    pub tick_interval_ms: u64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            bindings: vec![
                SoundBinding::new(Channel::AxisDPadY, -1, "sounds/siren.wav"),
                SoundBinding::new(Channel::AxisDPadY, 1, "sounds/engine.wav"),
                SoundBinding::new(Channel::AxisDPadX, -1, "sounds/fanfare.wav"),
                SoundBinding::new(Channel::AxisDPadX, 1, "sounds/alarm.wav"),
            ],
            horn: Some(Channel::ButtonCircle),
            tick_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    pub axis: Channel,
    /// Flip the axis so pushing the stick away is positive
    pub invert_axis: bool,
    pub override_button: Channel,
    pub override_speed: f64,
    pub deadzone: f64,
    pub tick_interval_ms: u64,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            axis: Channel::AxisRightStickY,
            invert_axis: true,
            override_button: Channel::ButtonR1,
            override_speed: 100.0,
            deadzone: 6.2,
            tick_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub terminate_button: Channel,
    pub watch_interval_ms: u64,
    /// How long shutdown waits for the device reader before giving up on it
    pub source_join_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            terminate_button: Channel::ButtonPs,
            watch_interval_ms: 1,
            source_join_timeout_ms: 500,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/dualdrive/config.toml` or platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Explicit path if given, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(default) if default.exists() => Self::load(&default),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.path.as_os_str().is_empty() {
            return Err(invalid("device.path must not be empty"));
        }
        if self.device.poll_timeout_ms == 0 {
            return Err(invalid("device.poll_timeout_ms must be at least 1"));
        }

        check_deadzone("drive.deadzone", self.drive.deadzone)?;
        check_deadzone("accessory.deadzone", self.accessory.deadzone)?;

        if !(0.0..=1.0).contains(&self.drive.shaping_weight) {
            return Err(invalid(format!(
                "drive.shaping_weight must be within [0, 1], got {}",
                self.drive.shaping_weight
            )));
        }
        if self.drive.trigger_max <= 0 {
            return Err(invalid("drive.trigger_max must be positive"));
        }
        if !(0.0..=100.0).contains(&self.accessory.override_speed.abs()) {
            return Err(invalid("accessory.override_speed must be within [-100, 100]"));
        }
        if self.indicator.maneuver_toggle == self.indicator.stick_toggle {
            return Err(invalid("indicator toggles must use different buttons"));
        }

        let mut seen = HashSet::new();
        for binding in &self.sound.bindings {
            if binding.clip.trim().is_empty() {
                return Err(invalid(format!(
                    "sound binding on {} has an empty clip",
                    binding.channel
                )));
            }
            if !seen.insert((binding.channel, binding.value)) {
                return Err(invalid(format!(
                    "duplicate sound binding for {} = {}",
                    binding.channel, binding.value
                )));
            }
        }

        Ok(())
    }
}

fn check_deadzone(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..100.0).contains(&value) {
        return Err(invalid(format!("{} must be within [0, 100), got {}", name, value)));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn defaults_survive_toml() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [device]
            path = "/dev/input/event2"
            layout = "narrow"

            [drive]
            deadzone = 10.0

            [indicator]
            stick_pattern = "off"
            maneuver_pattern = { solid = { left = "red", right = "yellow" } }

            [[sound.bindings]]
            channel = "button_cross"
            value = 1
            clip = "horn.wav"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.path, PathBuf::from("/dev/input/event2"));
        assert_eq!(config.device.layout, FrameLayout::Narrow);
        assert_eq!(config.device.poll_timeout_ms, 50);
        assert_eq!(config.drive.deadzone, 10.0);
        assert_eq!(config.drive.steering_axis, Channel::AxisLeftStickX);
        assert_eq!(config.indicator.stick_pattern, IndicatorPattern::Off);
        assert_eq!(
            config.indicator.maneuver_pattern,
            IndicatorPattern::Solid {
                left: LedColor::Red,
                right: LedColor::Yellow
            }
        );
        assert_eq!(
            config.sound.bindings,
            vec![SoundBinding::new(Channel::ButtonCross, 1, "horn.wav")]
        );
        config.validate().unwrap();
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.drive.deadzone = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.drive.shaping_weight = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.poll_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.drive.trigger_max = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.indicator.stick_toggle = config.indicator.maneuver_toggle;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let duplicate = config.sound.bindings[0].clone();
        config.sound.bindings.push(duplicate);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sound.bindings[0].clip = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_channel_name_fails_to_parse() {
        let result = Config::from_toml("[orchestrator]\nterminate_button = \"button_home\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nterminate_button = \"button_options\"").unwrap();

        let config = Config::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.orchestrator.terminate_button, Channel::ButtonOptions);

        let missing = Config::load(Path::new("/no/such/dualdrive.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
