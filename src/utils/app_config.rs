/// Application configuration management
/// Stores user preferences in ~/.config/inkystat/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::constants::{
    InkyColor, BACKGROUND_FILE_NAME, DEFAULT_FRAMEBUFFER, DEFAULT_MOUNT_POINT, DEFAULT_SSH_PORT,
    PREVIEW_FILE_NAME, STATE_FILE_NAME,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persisted snapshot of the last rendered metrics
    pub state_path: Option<PathBuf>,
    /// Artwork the metrics are drawn onto
    pub background_path: Option<PathBuf>,
    pub metrics: MetricsConfig,
    pub display: DisplayConfig,
}

/// Where metric values come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    /// Native probe first, shell command as fallback
    #[default]
    Auto,
    Native,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub source: MetricSource,
    pub ssh_port: u16,
    pub mount_point: String,
    /// Case-insensitive label filter for the thermal sensor
    pub temperature_sensor: Option<String>,
    pub commands: CommandOverrides,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            source: MetricSource::Auto,
            ssh_port: DEFAULT_SSH_PORT,
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            temperature_sensor: None,
            commands: CommandOverrides::default(),
        }
    }
}

impl MetricsConfig {
    pub fn ssh_command(&self) -> String {
        self.commands.ssh.clone().unwrap_or_else(|| {
            format!(r"ss -nat | grep -E '^ESTAB.*:{}\b' | wc -l", self.ssh_port)
        })
    }

    pub fn temperature_command(&self) -> String {
        self.commands
            .temperature
            .clone()
            .unwrap_or_else(|| "vcgencmd measure_temp".to_string())
    }

    pub fn usage_command(&self) -> String {
        self.commands.usage.clone().unwrap_or_else(|| {
            format!("df --output=pcent {} | tail -n1", self.mount_point)
        })
    }
}

/// Shell pipelines used by the command source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOverrides {
    pub ssh: Option<String>,
    pub temperature: Option<String>,
    pub usage: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBackend {
    #[default]
    Auto,
    Framebuffer,
    Preview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub device: PathBuf,
    pub preview_path: Option<PathBuf>,
    pub accent: InkyColor,
    pub border: InkyColor,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: DisplayBackend::Auto,
            device: PathBuf::from(DEFAULT_FRAMEBUFFER),
            preview_path: None,
            accent: InkyColor::Yellow,
            border: InkyColor::Black,
        }
    }
}

impl AppConfig {
    /// Get default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("inkystat");
        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| alongside_executable(STATE_FILE_NAME))
    }

    pub fn background_path(&self) -> PathBuf {
        self.background_path
            .clone()
            .unwrap_or_else(|| alongside_executable(BACKGROUND_FILE_NAME))
    }

    pub fn preview_path(&self) -> PathBuf {
        self.display
            .preview_path
            .clone()
            .unwrap_or_else(|| alongside_executable(PREVIEW_FILE_NAME))
    }
}

/// Resolve a file name in the directory holding the running executable
fn alongside_executable(name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.metrics.source, MetricSource::Auto);
        assert_eq!(config.metrics.ssh_port, 22);
        assert_eq!(config.metrics.mount_point, "/otg");
        assert_eq!(config.display.backend, DisplayBackend::Auto);
        assert!(config.state_path().ends_with("persist.txt"));
        assert!(config.background_path().ends_with("Inky.png"));
    }

    #[test]
    fn test_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "state_path = \"/var/lib/inkystat/persist.txt\"").unwrap();
        writeln!(file, "[metrics]").unwrap();
        writeln!(file, "source = \"command\"").unwrap();
        writeln!(file, "ssh_port = 2222").unwrap();
        writeln!(file, "[display]").unwrap();
        writeln!(file, "backend = \"preview\"").unwrap();
        writeln!(file, "accent = \"red\"").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.state_path(), PathBuf::from("/var/lib/inkystat/persist.txt"));
        assert_eq!(config.metrics.source, MetricSource::Command);
        assert_eq!(config.metrics.mount_point, "/otg");
        assert_eq!(config.display.backend, DisplayBackend::Preview);
        assert_eq!(config.display.accent, InkyColor::Red);
        assert!(config.metrics.ssh_command().contains(":2222\\b"));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[metrics]").unwrap();
        writeln!(file, "source = \"telepathy\"").unwrap();

        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_command_defaults_and_overrides() {
        let mut metrics = MetricsConfig::default();
        assert_eq!(metrics.usage_command(), "df --output=pcent /otg | tail -n1");
        assert_eq!(metrics.temperature_command(), "vcgencmd measure_temp");

        metrics.commands.temperature = Some("cat /tmp/temp".to_string());
        assert_eq!(metrics.temperature_command(), "cat /tmp/temp");
    }
}
