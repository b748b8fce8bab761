//! Configuration profiles and layered resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! The profile itself (development, testing, production) is selected by the
//! `FLASK_ENV` environment variable and only toggles debug/testing flags and
//! the default log level.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable selecting the configuration profile
pub const PROFILE_ENV_VAR: &str = "FLASK_ENV";

/// Maximum accepted request body size (16 MiB)
pub const MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

/// File extensions accepted for upload
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "jpg", "jpeg", "xml", "musicxml"];

/// Secret used when nothing else is configured. Fine for development only.
const DEFAULT_SECRET_KEY: &str = "dev-secret-key";

/// Configuration profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Fallback for unrecognised profile names: debug off, testing off
    Base,
    Development,
    Testing,
    Production,
}

impl Profile {
    /// Map a profile name to a profile. `default` is development; anything
    /// unrecognised falls back to the base profile.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "default" => Profile::Development,
            "testing" => Profile::Testing,
            "production" => Profile::Production,
            _ => Profile::Base,
        }
    }

    /// Read the profile from `FLASK_ENV`, defaulting to development
    pub fn from_env() -> Self {
        match std::env::var(PROFILE_ENV_VAR) {
            Ok(name) => Self::from_name(&name),
            Err(_) => Profile::Development,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Base => "base",
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Production => "production",
        }
    }

    pub fn debug(&self) -> bool {
        matches!(self, Profile::Development | Profile::Testing)
    }

    pub fn testing(&self) -> bool {
        matches!(self, Profile::Testing)
    }

    fn default_log_level(&self) -> &'static str {
        if self.debug() {
            "debug"
        } else {
            "info"
        }
    }
}

/// Configuration file contents
///
/// Every field is optional; missing values fall through to compiled defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Folder receiving uploads and annotated copies
    #[serde(default)]
    pub upload_folder: Option<PathBuf>,

    /// Tesseract executable (name on PATH or absolute path)
    #[serde(default)]
    pub tesseract_cmd: Option<String>,

    /// Poppler `pdftoppm` executable used to rasterize PDF pages
    #[serde(default)]
    pub pdftoppm_cmd: Option<String>,

    /// Rasterization resolution for PDF pages
    #[serde(default)]
    pub pdf_dpi: Option<u32>,

    /// TrueType font used for annotations (built-in bitmap font otherwise)
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    #[serde(default)]
    pub processing_timeout_secs: Option<u64>,

    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub upload_folder: PathBuf,
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
    pub pdf_dpi: u32,
    pub processing_timeout: Duration,
    pub bind_address: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let upload_folder = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("uploads");

        let tesseract_cmd = if cfg!(target_os = "windows") {
            r"C:\Program Files\Tesseract-OCR\tesseract.exe".to_string()
        } else {
            "tesseract".to_string()
        };

        Self {
            upload_folder,
            tesseract_cmd,
            pdftoppm_cmd: "pdftoppm".to_string(),
            pdf_dpi: 200,
            processing_timeout: Duration::from_secs(300),
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Values read from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub secret_key: Option<String>,
    pub upload_folder: Option<PathBuf>,
    pub tesseract_cmd: Option<String>,
    pub pdftoppm_cmd: Option<String>,
}

impl EnvOverrides {
    /// Read `SECRET_KEY`, `UPLOAD_FOLDER`, `TESSERACT_CMD` and `PDFTOPPM_CMD`
    pub fn from_process_env() -> Self {
        fn non_empty(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        Self {
            secret_key: non_empty("SECRET_KEY"),
            upload_folder: non_empty("UPLOAD_FOLDER").map(PathBuf::from),
            tesseract_cmd: non_empty("TESSERACT_CMD"),
            pdftoppm_cmd: non_empty("PDFTOPPM_CMD"),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub upload_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile: Profile,
    pub debug: bool,
    pub testing: bool,
    pub secret_key: String,
    pub upload_folder: PathBuf,
    pub max_content_length: usize,
    pub allowed_extensions: Vec<String>,
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
    pub pdf_dpi: u32,
    pub font_path: Option<PathBuf>,
    /// Upper bound on one upload's processing time
    pub processing_timeout: Duration,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    /// Testing-profile configuration rooted at `upload_folder`, ignoring
    /// the process environment and any config file
    pub fn for_testing(upload_folder: impl Into<PathBuf>) -> Self {
        let mut config = ConfigResolver::new(Profile::Testing)
            .with_env(EnvOverrides::default())
            .resolve();
        config.upload_folder = upload_folder.into();
        config
    }

    /// True when `filename` has an extension in the allow-list
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        match file_extension(filename) {
            Some(ext) => self.allowed_extensions.iter().any(|allowed| *allowed == ext),
            None => false,
        }
    }

    /// `host:port` string for binding the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Lowercased extension after the last `.`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Layered configuration resolver
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    profile: Profile,
    cli: CliOverrides,
    env: EnvOverrides,
    toml: TomlConfig,
}

impl ConfigResolver {
    /// Resolver for `profile` reading overrides from the process environment
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            cli: CliOverrides::default(),
            env: EnvOverrides::from_process_env(),
            toml: TomlConfig::default(),
        }
    }

    pub fn with_cli(mut self, cli: CliOverrides) -> Self {
        self.cli = cli;
        self
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn with_toml(mut self, toml: TomlConfig) -> Self {
        self.toml = toml;
        self
    }

    /// Merge all layers into a final configuration
    pub fn resolve(&self) -> AppConfig {
        let defaults = CompiledDefaults::for_current_platform();
        let cli = &self.cli;
        let env = &self.env;
        let toml = &self.toml;

        let secret_key = env
            .secret_key
            .clone()
            .or_else(|| toml.secret_key.clone())
            .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string());

        if secret_key == DEFAULT_SECRET_KEY && self.profile == Profile::Production {
            warn!("Production profile is using the built-in secret key; set SECRET_KEY");
        }

        let upload_folder = cli
            .upload_folder
            .clone()
            .or_else(|| env.upload_folder.clone())
            .or_else(|| toml.upload_folder.clone())
            .unwrap_or(defaults.upload_folder);

        let tesseract_cmd = env
            .tesseract_cmd
            .clone()
            .or_else(|| toml.tesseract_cmd.clone())
            .unwrap_or(defaults.tesseract_cmd);

        let pdftoppm_cmd = env
            .pdftoppm_cmd
            .clone()
            .or_else(|| toml.pdftoppm_cmd.clone())
            .unwrap_or(defaults.pdftoppm_cmd);

        let processing_timeout = toml
            .processing_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.processing_timeout);

        let log_level = cli
            .log_level
            .clone()
            .or_else(|| toml.logging.level.clone())
            .unwrap_or_else(|| self.profile.default_log_level().to_string());

        AppConfig {
            profile: self.profile,
            debug: self.profile.debug(),
            testing: self.profile.testing(),
            secret_key,
            upload_folder,
            max_content_length: MAX_CONTENT_LENGTH,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            tesseract_cmd,
            pdftoppm_cmd,
            pdf_dpi: toml.pdf_dpi.unwrap_or(defaults.pdf_dpi),
            font_path: toml.font_path.clone(),
            processing_timeout,
            bind_address: cli
                .bind_address
                .clone()
                .or_else(|| toml.bind_address.clone())
                .unwrap_or(defaults.bind_address),
            port: cli.port.or(toml.port).unwrap_or(defaults.port),
            log_level,
            log_file: toml.logging.file.clone(),
        }
    }
}

/// Default configuration file path: `<config_dir>/fingersheet/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fingersheet").join("config.toml"))
}

/// Load and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the configuration file if there is one
///
/// A missing or unreadable file is not fatal: a warning is logged and
/// defaults are used.
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        }
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Creates the upload folder and computes paths inside it
pub struct UploadFolderInitializer {
    upload_folder: PathBuf,
}

impl UploadFolderInitializer {
    pub fn new(upload_folder: PathBuf) -> Self {
        Self { upload_folder }
    }

    /// Create the upload folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.upload_folder.exists() {
            info!("Creating upload folder: {}", self.upload_folder.display());
            std::fs::create_dir_all(&self.upload_folder)?;
        }
        if !self.upload_folder.is_dir() {
            return Err(Error::Config(format!(
                "Upload folder is not a directory: {}",
                self.upload_folder.display()
            )));
        }
        Ok(())
    }

    pub fn upload_folder(&self) -> &Path {
        &self.upload_folder
    }

    /// Path of an (already sanitized) upload inside the folder
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.upload_folder.join(filename)
    }
}
