/*!
 * Configuration types for bagrouter
 */

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bagrouter_core_routing::{RoutingPolicy, DEFAULT_MAX_QUEUE_LENGTH};

use crate::error::ConfigError;

/// Router configuration, loadable from TOML
///
/// ```
/// use bagrouter::config::RouterConfig;
///
/// let config: RouterConfig = toml::from_str(r#"
///     allowed_gates = ["G1", "G2"]
///     max_queue_length = 50
///     state_file = "/var/lib/bagrouter/state.json"
/// "#).unwrap();
///
/// assert_eq!(config.max_queue_length, 50);
/// assert!(config.policy().allows("G1"));
/// assert!(!config.policy().allows("G9"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Valid destination gates (empty accepts any gate)
    #[serde(default)]
    pub allowed_gates: Vec<String>,

    /// Maximum combined priority + regular bags per gate before buffering
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,

    /// Snapshot location; `None` keeps state in memory only
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Start from empty state when the snapshot is unreadable
    #[serde(default)]
    pub recover_empty_on_corrupt: bool,

    /// JSON Lines scan-record log for the reporting service
    #[serde(default)]
    pub scan_log: Option<PathBuf>,

    /// Scanner location stamped on every scan record
    #[serde(default)]
    pub scan_location: Option<String>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Write logs as JSON to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Verbose output (forces debug logging)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            allowed_gates: Vec::new(),
            max_queue_length: default_max_queue_length(),
            state_file: None,
            recover_empty_on_corrupt: false,
            scan_log: None,
            scan_location: None,
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Diagnostic verbosity for the `bagrouter` crates; also a CLI value
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive spelling understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn default_max_queue_length() -> usize {
    DEFAULT_MAX_QUEUE_LENGTH
}

impl RouterConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RouterConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Reject allow-set entries that could never match a scanned tag
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut unique = BTreeSet::new();
        for gate in &self.allowed_gates {
            if gate.is_empty() {
                return Err(ConfigError::Invalid(
                    "allowed_gates contains an empty gate name".to_string(),
                ));
            }
            if gate.trim() != gate {
                return Err(ConfigError::Invalid(format!(
                    "allowed gate {:?} has leading or trailing whitespace",
                    gate
                )));
            }
            if !unique.insert(gate.as_str()) {
                tracing::debug!(gate = %gate, "duplicate entry in allowed_gates");
            }
        }
        Ok(())
    }

    /// Build the routing policy for the core engine
    pub fn policy(&self) -> RoutingPolicy {
        RoutingPolicy::new(self.max_queue_length)
            .with_allowed_gates(self.allowed_gates.iter().map(String::as_str))
    }

    /// Memory-only configuration used by the demo and tests
    pub fn in_memory<I, S>(allowed_gates: I, max_queue_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_gates: allowed_gates.into_iter().map(Into::into).collect(),
            max_queue_length,
            ..Self::default()
        }
    }
}
