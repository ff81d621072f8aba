use crate::error::{CaptureError, Result};
use crate::gate::ConfirmationRequest;
use crate::logs::{LevelFilter, DEFAULT_BUFFER_CAPACITY, DEFAULT_LOG_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted sink buffer
const MAX_BUFFER_CAPACITY: usize = 65_536;

/// Log capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory holding the log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Name of the log file inside `log_dir`
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Which levels the sink admits
    #[serde(default)]
    pub levels: LevelFilter,

    /// Entries buffered between producers and the store
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Text of the clear confirmation prompt
    #[serde(default)]
    pub prompt: ConfirmationRequest,
}

// Default value functions for serde
fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("logcap")
}

fn default_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            file_name: default_file_name(),
            levels: LevelFilter::default(),
            buffer_capacity: default_buffer_capacity(),
            prompt: ConfirmationRequest::default(),
        }
    }
}

impl CaptureConfig {
    /// Load from `path` if given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(CaptureError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| CaptureError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| CaptureError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(CaptureError::ConfigValidationError(
                "file_name must not be empty".to_string(),
            ));
        }

        if self.file_name.contains('/') || self.file_name.contains('\\') || self.file_name == ".." {
            return Err(CaptureError::ConfigValidationError(format!(
                "file_name must be a plain file name, got: {}",
                self.file_name
            )));
        }

        if self.log_dir.as_os_str().is_empty() {
            return Err(CaptureError::ConfigValidationError(
                "log_dir must not be empty".to_string(),
            ));
        }

        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(CaptureError::ConfigValidationError(format!(
                "buffer_capacity must be between 1 and {}",
                MAX_BUFFER_CAPACITY
            )));
        }

        Ok(())
    }

    /// Full path of the configured log file
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.file_name)
    }

    /// Expand `$VAR` and `${VAR}` in the log directory
    fn expand_env_vars(&mut self) {
        let dir = self.log_dir.to_string_lossy();
        self.log_dir = PathBuf::from(expand_env_in_string(&dir));
    }
}

/// Expand `$NAME` and `${NAME}` in a string.
///
/// A name is the longest run of `[A-Za-z0-9_]` after `$`. Unset variables
/// are left as written.
fn expand_env_in_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            },
            None => {
                let len = after
                    .find(|c: char| !is_var_char(c))
                    .unwrap_or(after.len());
                (&after[..len], len)
            }
        };

        if name.is_empty() {
            result.push('$');
            rest = after;
            continue;
        }

        match std::env::var(name) {
            Ok(value) => result.push_str(&value),
            Err(_) => result.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    result.push_str(rest);
    result
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_var_char)
}
