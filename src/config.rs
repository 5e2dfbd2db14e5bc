use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::localization::particle::DEFAULT_PARTICLE_COUNT;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the team this agent plays for
    pub team_name: String,

    /// Simulation server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (players connect to 6000, the coach to 6002)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Protocol version announced in the init message
    #[serde(default = "default_version")]
    pub version: u32,

    /// Whether this agent is the team's goalie
    #[serde(default)]
    pub goalie: bool,

    /// Self-localization tuning
    #[serde(default)]
    pub localization: LocalizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Prefer the particle filter over plain triangulation
    #[serde(default = "default_true")]
    pub use_particle_filter: bool,

    /// Hypothesis count for the particle filter
    #[serde(default = "default_particles")]
    pub particles: usize,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            use_particle_filter: true,
            particles: DEFAULT_PARTICLE_COUNT,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6000
}

fn default_version() -> u32 {
    15
}

fn default_true() -> bool {
    true
}

fn default_particles() -> usize {
    DEFAULT_PARTICLE_COUNT
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(team = %config.team_name, host = %config.host, port = config.port, "configuration loaded");
        Ok(config)
    }

    /// Create default configuration for a team
    pub fn default_for_team(team_name: impl Into<String>) -> Self {
        Self {
            team_name: team_name.into(),
            host: default_host(),
            port: default_port(),
            version: default_version(),
            goalie: false,
            localization: LocalizationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default_for_team("testers");
        assert_eq!(config.team_name, "testers");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6000);
        assert_eq!(config.version, 15);
        assert!(!config.goalie);
        assert!(config.localization.use_particle_filter);
        assert_eq!(config.localization.particles, DEFAULT_PARTICLE_COUNT);
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "team_name = \"testers\"\nport = 6002\ngoalie = true\n\n\
             [localization]\nuse_particle_filter = false\nparticles = 250\n"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.team_name, "testers");
        assert_eq!(config.port, 6002);
        assert!(config.goalie);
        // unspecified keys fall back to defaults
        assert_eq!(config.host, "localhost");
        assert_eq!(config.version, 15);
        assert!(!config.localization.use_particle_filter);
        assert_eq!(config.localization.particles, 250);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "team_name = \"testers\"\n").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert!(config.localization.use_particle_filter);
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "team_name = [not a string]").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
