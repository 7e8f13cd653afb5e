//! Configuration management for rdiag.
//!
//! Parses `rdiag.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `render.plantuml_command`
//! - `render.plantuml_jar`
//! - `output.base_dir`
//! - `references.dir`
//! - `references.troubleshooting_dir`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override output image format (`png` or `svg`).
    pub format: Option<String>,
    /// Override maximum conversion attempts per diagram.
    pub max_retries: Option<u32>,
    /// Override renderer timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Override the base directory that receives the diagrams directory.
    pub output_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rdiag.toml";

/// Output formats accepted by `render.format`.
const SUPPORTED_FORMATS: [&str; 2] = ["png", "svg"];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Renderer configuration.
    pub render: RenderConfig,
    /// Output layout configuration.
    pub output: OutputConfig,
    /// Reference material locations (paths are relative strings from TOML).
    references: ReferencesConfigRaw,

    /// Resolved reference locations (set after loading).
    #[serde(skip)]
    pub references_resolved: ReferencesConfig,
    /// Resolved base directory override (set after loading or from CLI).
    #[serde(skip)]
    pub base_dir_resolved: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Renderer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output image format (`png` or `svg`).
    pub format: String,
    /// Maximum conversion attempts per diagram.
    pub max_retries: u32,
    /// Timeout for a single renderer invocation, in seconds.
    pub timeout_secs: u64,
    /// Explicit path to a native `plantuml` executable.
    pub plantuml_command: Option<String>,
    /// Explicit path to `plantuml.jar`.
    pub plantuml_jar: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: "png".to_owned(),
            max_retries: 3,
            timeout_secs: 30,
            plantuml_command: None,
            plantuml_jar: None,
        }
    }
}

impl RenderConfig {
    /// Renderer timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Output layout configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Name of the directory that receives staged sources and images.
    pub diagrams_dir: String,
    /// Suffix appended to the document stem for the rewritten copy.
    pub rewrite_suffix: String,
    /// Base directory for the diagrams directory (default: the input's directory).
    pub base_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            diagrams_dir: "diagrams".to_owned(),
            rewrite_suffix: "_with_images".to_owned(),
            base_dir: None,
        }
    }
}

/// Raw reference configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ReferencesConfigRaw {
    dir: Option<String>,
    troubleshooting_dir: Option<String>,
}

/// Resolved reference locations with absolute paths.
#[derive(Debug, Default)]
pub struct ReferencesConfig {
    /// Directory holding per-diagram-type reference documents.
    pub dir: PathBuf,
    /// Directory holding troubleshooting guides.
    pub troubleshooting_dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`render.plantuml_jar`").
        field: String,
        /// Error message (e.g., "${`PLANTUML_JAR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `rdiag.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, and the
    /// result is validated once more so overrides cannot bypass validation.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(format) = &settings.format {
            self.render.format.clone_from(format);
        }
        if let Some(max_retries) = settings.max_retries {
            self.render.max_retries = max_retries;
        }
        if let Some(timeout_secs) = settings.timeout_secs {
            self.render.timeout_secs = timeout_secs;
        }
        if let Some(output_dir) = &settings.output_dir {
            self.base_dir_resolved = Some(output_dir.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            output: OutputConfig::default(),
            references: ReferencesConfigRaw::default(),
            references_resolved: ReferencesConfig {
                dir: base.join("references"),
                troubleshooting_dir: base.join("references").join("troubleshooting"),
            },
            base_dir_resolved: None,
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_output()?;
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_FORMATS.contains(&self.render.format.as_str()) {
            return Err(ConfigError::Validation(format!(
                "render.format must be one of {}, got '{}'",
                SUPPORTED_FORMATS.join(", "),
                self.render.format
            )));
        }
        if self.render.max_retries == 0 {
            return Err(ConfigError::Validation(
                "render.max_retries must be at least 1".to_owned(),
            ));
        }
        if self.render.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "render.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_output(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.output.diagrams_dir, "output.diagrams_dir")?;
        require_non_empty(&self.output.rewrite_suffix, "output.rewrite_suffix")?;

        // The diagrams directory is also used verbatim in generated links
        if self.output.diagrams_dir.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "output.diagrams_dir must be a single directory name".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_opt(
            &mut self.render.plantuml_command,
            "render.plantuml_command",
        )?;
        expand::expand_opt(&mut self.render.plantuml_jar, "render.plantuml_jar")?;
        expand::expand_opt(&mut self.output.base_dir, "output.base_dir")?;
        expand::expand_opt(&mut self.references.dir, "references.dir")?;
        expand::expand_opt(
            &mut self.references.troubleshooting_dir,
            "references.troubleshooting_dir",
        )?;

        // `${VAR:-}` expands to nothing, which means "not configured"
        for value in [
            &mut self.render.plantuml_command,
            &mut self.render.plantuml_jar,
            &mut self.output.base_dir,
        ] {
            if value.as_deref().is_some_and(str::is_empty) {
                *value = None;
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let references_dir =
            config_dir.join(self.references.dir.as_deref().unwrap_or("references"));
        let troubleshooting_dir = self
            .references
            .troubleshooting_dir
            .as_deref()
            .map_or_else(|| references_dir.join("troubleshooting"), |d| config_dir.join(d));

        self.references_resolved = ReferencesConfig {
            dir: references_dir,
            troubleshooting_dir,
        };
        self.base_dir_resolved = self.output.base_dir.as_deref().map(|d| config_dir.join(d));
    }
}
