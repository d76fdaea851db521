//! Configuration file support for buildhat.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (BUILDHAT_*)
//! 3. Local config file (./buildhat.toml)
//! 4. Global config file (~/.config/buildhat/config.toml)
//!
//! Layers 1 and 2 are handled by clap; this module merges the file layers.

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "buildhat.toml";

/// Serial connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Preferred serial port (e.g., "/dev/serial0").
    pub serial: Option<String>,
}

/// Firmware asset locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// Firmware image path.
    pub firmware: Option<PathBuf>,
    /// Signature path.
    pub signature: Option<PathBuf>,
    /// Directory holding `firmware.bin` and `signature.bin`.
    pub dir: Option<PathBuf>,
}

/// BOOT/RESET line assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpioConfig {
    /// RESET line (BCM numbering).
    pub reset_pin: Option<u8>,
    /// BOOT line (BCM numbering).
    pub boot_pin: Option<u8>,
    /// Hold time in milliseconds.
    pub settle_ms: Option<u64>,
}

/// Upload session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashConfig {
    /// Per-step deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Always reset the Build HAT before `start`.
    #[serde(default)]
    pub reset: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial settings.
    #[serde(default)]
    pub port: PortConfig,
    /// Asset locations.
    #[serde(default)]
    pub firmware: FirmwareConfig,
    /// GPIO settings.
    #[serde(default)]
    pub gpio: GpioConfig,
    /// Session settings.
    #[serde(default)]
    pub flash: FlashConfig,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "buildhat").map(|dirs| {
            dirs.config_dir()
                .to_path_buf()
        })
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set values in `other` win.
    fn merge(&mut self, other: Self) {
        if other.port.serial.is_some() {
            self.port.serial = other.port.serial;
        }

        let fw = other.firmware;
        if fw.firmware.is_some() {
            self.firmware.firmware = fw.firmware;
        }
        if fw.signature.is_some() {
            self.firmware.signature = fw.signature;
        }
        if fw.dir.is_some() {
            self.firmware.dir = fw.dir;
        }

        let gpio = other.gpio;
        if gpio.reset_pin.is_some() {
            self.gpio.reset_pin = gpio.reset_pin;
        }
        if gpio.boot_pin.is_some() {
            self.gpio.boot_pin = gpio.boot_pin;
        }
        if gpio.settle_ms.is_some() {
            self.gpio.settle_ms = gpio.settle_ms;
        }

        if other.flash.timeout_secs.is_some() {
            self.flash.timeout_secs = other.flash.timeout_secs;
        }
        if other.flash.reset {
            self.flash.reset = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.port.serial.is_none());
        assert!(config.firmware.dir.is_none());
        assert!(config.gpio.reset_pin.is_none());
        assert!(config.flash.timeout_secs.is_none());
        assert!(!config.flash.reset);
    }

    #[test]
    fn test_config_merge_overrides_set_values() {
        let mut base = Config::default();
        base.port.serial = Some("/dev/ttyAMA0".to_string());
        base.gpio.reset_pin = Some(4);

        let mut other = Config::default();
        other.port.serial = Some("/dev/serial0".to_string());
        other.gpio.boot_pin = Some(27);
        other.flash.timeout_secs = Some(20);

        base.merge(other);

        assert_eq!(base.port.serial.as_deref(), Some("/dev/serial0"));
        assert_eq!(base.gpio.reset_pin, Some(4));
        assert_eq!(base.gpio.boot_pin, Some(27));
        assert_eq!(base.flash.timeout_secs, Some(20));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.firmware.firmware = Some(PathBuf::from("fw.bin"));
        base.gpio.settle_ms = Some(250);
        base.flash.reset = true;

        base.merge(Config::default());

        assert_eq!(base.firmware.firmware, Some(PathBuf::from("fw.bin")));
        assert_eq!(base.gpio.settle_ms, Some(250));
        assert!(base.flash.reset);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[port]
serial = "/dev/serial0"

[firmware]
dir = "/opt/buildhat/data"

[gpio]
reset_pin = 4
boot_pin = 22
settle_ms = 150

[flash]
timeout_secs = 15
reset = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port.serial.as_deref(), Some("/dev/serial0"));
        assert_eq!(
            config.firmware.dir,
            Some(PathBuf::from("/opt/buildhat/data"))
        );
        assert_eq!(config.gpio.reset_pin, Some(4));
        assert_eq!(config.gpio.boot_pin, Some(22));
        assert_eq!(config.gpio.settle_ms, Some(150));
        assert_eq!(config.flash.timeout_secs, Some(15));
        assert!(config.flash.reset);
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: Config = toml::from_str("[gpio]\nboot_pin = 17\n").unwrap();
        assert!(config.port.serial.is_none());
        assert_eq!(config.gpio.boot_pin, Some(17));
        assert!(config.gpio.reset_pin.is_none());
    }

    #[test]
    fn test_load_from_path_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[port]\nserial = \"/dev/ttyS0\"\n").unwrap();

        let config = Config::load_from_path(&path);
        assert_eq!(config.port.serial.as_deref(), Some("/dev/ttyS0"));
    }

    #[test]
    fn test_load_from_path_invalid_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[gpio\nreset_pin = ").unwrap();

        let config = Config::load_from_path(&path);
        assert!(config.gpio.reset_pin.is_none());
    }

    #[test]
    fn test_load_from_path_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/config.toml"));
        assert!(config.port.serial.is_none());
    }

    #[test]
    fn test_global_config_path_shape() {
        if let Some(p) = Config::global_config_path() {
            let text = p.to_string_lossy();
            assert!(text.contains("buildhat"));
            assert!(text.ends_with("config.toml"));
        }
    }
}
