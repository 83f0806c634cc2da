use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::graph::{BuildOptions, ExclusionPolicy};
use crate::render::RenderOptions;
use crate::schema::Schema;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "IFCGRAPH_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "ifcgraph.toml";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ifcgraph: IfcGraphConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub exclusion: ExclusionPolicy,
    #[serde(default)]
    pub render: RenderOptions,
}

/// Paths and logging
#[derive(Debug, Clone, Deserialize)]
pub struct IfcGraphConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Root directory scanned by the `ingest` binary
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

impl Default for IfcGraphConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            db_path: default_db_path(),
            models_dir: default_models_dir(),
            migrations_dir: default_migrations_dir(),
        }
    }
}

/// Graph construction
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub include_hierarchy: bool,
    /// Skip parsing and render an existing edge list
    #[serde(default)]
    pub plot_only: bool,
    /// Reject entity types missing from the schema instead of inferring their fields
    #[serde(default)]
    pub strict_schema: bool,
    /// JSON schema document; the embedded IFC4 subset when unset
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            include_hierarchy: false,
            plot_only: false,
            strict_schema: false,
            schema_path: None,
            progress_every: default_progress_every(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ifcgraph.db")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_progress_every() -> usize {
    1000
}

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for the config file in this order:
    /// 1. Path in the IFCGRAPH_CONFIG environment variable (must exist)
    /// 2. ./ifcgraph.toml in current directory
    ///
    /// Without either, built-in defaults apply.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Config::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file without validating it
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.ifcgraph.log_level.to_ascii_lowercase().as_str()) {
            anyhow::bail!(
                "ifcgraph.log_level must be one of {:?}, got {:?}",
                LOG_LEVELS,
                self.ifcgraph.log_level
            );
        }

        if self.ifcgraph.db_path.as_os_str().is_empty() {
            anyhow::bail!("ifcgraph.db_path must not be empty");
        }

        if let Some(schema_path) = &self.build.schema_path {
            if !schema_path.is_file() {
                anyhow::bail!(
                    "build.schema_path does not exist or is not a file: {}",
                    schema_path.display()
                );
            }
        }

        let blank = |types: &[String]| types.iter().any(|t| t.trim().is_empty());
        if blank(&self.exclusion.suppressed_types) || blank(&self.exclusion.exempt_source_types) {
            anyhow::bail!("exclusion type names must not be empty");
        }

        if self.render.height.trim().is_empty() || self.render.width.trim().is_empty() {
            anyhow::bail!("render.height and render.width must not be empty");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.ifcgraph.db_path
    }

    pub fn models_dir(&self) -> &Path {
        &self.ifcgraph.models_dir
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.ifcgraph.migrations_dir
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            include_hierarchy: self.build.include_hierarchy,
            policy: self.exclusion.clone(),
            progress_every: self.build.progress_every,
        }
    }

    /// The configured schema, or the embedded IFC4 subset
    pub fn schema(&self) -> Result<Schema> {
        match &self.build.schema_path {
            Some(path) => Schema::load(path)
                .with_context(|| format!("Failed to load schema {}", path.display())),
            None => Schema::ifc4_core().context("Embedded IFC4 schema is invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r##"
[ifcgraph]
log_level = "debug"
db_path = "./graphs.db"
models_dir = "./ifc"

[build]
include_hierarchy = true
strict_schema = true
progress_every = 50

[exclusion]
suppressed_types = ["IfcOwnerHistory", "IfcGeometricRepresentationContext"]
exempt_source_types = ["IfcProject"]

[render]
height = "750px"
bgcolor = "#ffffff"
font_color = "black"
"##;

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var(CONFIG_ENV).ok();
        match config_path {
            Some(p) => std::env::set_var(CONFIG_ENV, p),
            None => std::env::remove_var(CONFIG_ENV),
        }
        f();
        std::env::remove_var(CONFIG_ENV);
        if let Some(val) = original {
            std::env::set_var(CONFIG_ENV, val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(Some(&config_path), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.ifcgraph.log_level, "debug");
            assert_eq!(config.db_path(), Path::new("./graphs.db"));
            assert!(config.build.include_hierarchy);
            assert_eq!(config.build.progress_every, 50);
            assert_eq!(config.exclusion.suppressed_types.len(), 2);
            assert_eq!(config.render.height, "750px");
            assert_eq!(config.render.bgcolor, "#ffffff");
            assert_eq!(config.render.font_color, "black");
            // Unset keys keep their defaults
            assert_eq!(config.render.width, "100%");
            assert_eq!(config.migrations_dir(), Path::new("migrations"));

            let options = config.build_options();
            assert!(options.include_hierarchy);
            assert!(options.policy.skips("IfcWall", "IfcGeometricRepresentationContext"));
        });
    }

    #[test]
    fn test_from_file_keeps_hex_colors() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("colors.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.render.bgcolor, "#ffffff");
        assert_eq!(config.render.font_color, "black");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults_without_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load().unwrap();
            assert_eq!(config.ifcgraph.log_level, "info");
            assert!(!config.build.plot_only);
            assert_eq!(config.exclusion, ExclusionPolicy::default());
            assert_eq!(config.build_options(), BuildOptions::default());
            assert_eq!(config.schema().unwrap().name(), "IFC4");
        });
    }

    #[test]
    fn test_config_default_file_in_cwd() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("ifcgraph.toml"), "[build]\nplot_only = true\n").unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load().unwrap();
            assert!(config.build.plot_only);
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Some(Path::new("nonexistent.toml")), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("nonexistent.toml"));
        });
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let mut config = Config::default();
        config.ifcgraph.log_level = "loud".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("log_level"));

        let mut config = Config::default();
        config.build.schema_path = Some(PathBuf::from("/definitely/missing/schema.json"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.exclusion.suppressed_types.push("  ".to_string());
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }
}
