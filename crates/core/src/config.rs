use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::Settings;
use crate::pattern::pattern::{BassPattern, DrumPattern};
use crate::scale::scale::ScaleType;
use crate::session::session::{MAX_BPM, MIN_BPM};

/// Configuration manager for jam startup settings
/// Separates the schema (available options and their limits) from the persisted values.
/// Configuration is stored in ~/.jam/config.json by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub midi: MidiConfigSchema,
    pub session: SessionConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiConfigSchema {
    pub midi_port: ConfigOption<String>,
    pub virtual_port_name: ConfigOption<String>,
    pub create_virtual_port: ConfigOption<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfigSchema {
    pub bpm: ConfigOption<u32>,
    pub key_root: ConfigOption<u8>,
    pub scale: ConfigOption<ScaleType>,
    pub drum_pattern: ConfigOption<DrumPattern>,
    pub bass_pattern: ConfigOption<BassPattern>,
    pub drum_intensity: ConfigOption<f64>,
    pub bass_intensity: ConfigOption<f64>,
    pub melody_intensity: ConfigOption<f64>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
}

impl<T> ConfigOption<T> {
    fn new(default: T, description: &str) -> Self {
        Self {
            default,
            valid_range: None,
            valid_choices: None,
            description: description.to_string(),
        }
    }

    fn range(mut self, min: T, max: T) -> Self {
        self.valid_range = Some((min, max));
        self
    }

    fn choices(mut self, choices: Vec<T>) -> Self {
        self.valid_choices = Some(choices);
        self
    }
}

impl<T: PartialOrd> ConfigOption<T> {
    fn in_range(&self, value: &T) -> bool {
        match &self.valid_range {
            Some((min, max)) => value >= min && value <= max,
            None => true,
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to ~/.jam/config.json
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Self::default_path);

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".jam")
            .join("config.json")
    }

    /// Load settings from configuration file
    /// Writes a default file first if none exists
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Validate version compatibility
        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        log::info!("Loaded configuration from {}", self.config_path.display());
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Ensure config directory exists (if config is in a subdirectory)
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: self.existing_created_at().unwrap_or_else(|| now.clone()),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Creation time recorded in the file on disk, if it can be read
    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        serde_json::from_str::<ConfigFile>(&content)
            .ok()
            .map(|file| file.created_at)
    }

    /// Validate, update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            midi: MidiConfigSchema {
                midi_port: ConfigOption::new(
                    defaults.midi_port,
                    "Connect to the first MIDI output whose name contains this text",
                ),
                virtual_port_name: ConfigOption::new(
                    defaults.virtual_port_name,
                    "Name of the virtual port created when no output matches",
                ),
                create_virtual_port: ConfigOption::new(
                    defaults.create_virtual_port,
                    "Create a virtual MIDI port if no output matches (Unix only)",
                ),
            },
            session: SessionConfigSchema {
                bpm: ConfigOption::new(defaults.bpm, "Tempo in beats per minute")
                    .range(MIN_BPM, MAX_BPM),
                key_root: ConfigOption::new(defaults.key_root, "Key root, 0 = C through 11 = B")
                    .range(0, 11),
                scale: ConfigOption::new(defaults.scale, "Scale the bass and melody draw from")
                    .choices(ScaleType::ALL.to_vec()),
                drum_pattern: ConfigOption::new(defaults.drum_pattern, "Drum pattern variant")
                    .choices(vec![DrumPattern::Basic, DrumPattern::Breaks]),
                bass_pattern: ConfigOption::new(defaults.bass_pattern, "Bass pattern variant")
                    .choices(vec![BassPattern::Basic, BassPattern::Acid]),
                drum_intensity: ConfigOption::new(
                    defaults.drum_intensity,
                    "Drum velocity scaling (0.0-1.0)",
                )
                .range(0.0, 1.0),
                bass_intensity: ConfigOption::new(
                    defaults.bass_intensity,
                    "Bass trigger probability and velocity (0.0-1.0)",
                )
                .range(0.0, 1.0),
                melody_intensity: ConfigOption::new(
                    defaults.melody_intensity,
                    "Melody trigger probability and velocity (0.0-1.0)",
                )
                .range(0.0, 1.0),
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if settings.midi_port.trim().is_empty() {
            errors.push("midi_port must not be empty".to_string());
        }
        if settings.create_virtual_port && settings.virtual_port_name.trim().is_empty() {
            errors.push("virtual_port_name must not be empty".to_string());
        }

        let session = &schema.session;
        if !session.bpm.in_range(&settings.bpm) {
            errors.push(format!("bpm must be between {} and {}", MIN_BPM, MAX_BPM));
        }
        if !session.key_root.in_range(&settings.key_root) {
            errors.push("key_root must be between 0 and 11".to_string());
        }

        for (name, option, value) in [
            ("drum_intensity", &session.drum_intensity, settings.drum_intensity),
            ("bass_intensity", &session.bass_intensity, settings.bass_intensity),
            (
                "melody_intensity",
                &session.melody_intensity,
                settings.melody_intensity,
            ),
        ] {
            // NaN fails both comparisons
            if !option.in_range(&value) {
                errors.push(format!("{} must be between 0.0 and 1.0", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}
