// logtail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all logtail operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum TailError {
    /// Configuration parsing or validation failed.
    Config(ConfigError),

    /// Position snapshot read or write failed.
    Position(PositionError),

    /// Channel transaction failed.
    Channel(ChannelError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Position(e) => write!(f, "Position snapshot error: {e}"),
            Self::Channel(e) => write!(f, "Channel error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Position(e) => Some(e),
            Self::Channel(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while converting the key/value context into a source
/// configuration. All of these are fatal: they prevent `start`.
#[derive(Debug)]
pub enum ConfigError {
    /// A required key is absent from the context.
    MissingKey { key: String },

    /// `filegroups` is present but names no groups.
    EmptyFileGroups,

    /// A group is named in `filegroups` without a matching pattern key.
    MissingGroupPattern { group: String },

    /// Two groups share the same name.
    DuplicateGroup { name: String },

    /// A glob pattern could not be compiled.
    InvalidPattern { pattern: String, reason: String },

    /// A value could not be parsed as its expected type.
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// The multiline boundary regex is invalid.
    InvalidRegex {
        key: String,
        pattern: String,
        source: regex::Error,
    },

    /// The configuration file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading the configuration file.
    Io { path: PathBuf, source: io::Error },

    /// A lifecycle method was called before `configure`.
    NotConfigured,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { key } => write!(f, "missing required key '{key}'"),
            Self::EmptyFileGroups => write!(f, "'filegroups' names no groups"),
            Self::MissingGroupPattern { group } => {
                write!(f, "group '{group}' has no 'filegroups.{group}' pattern")
            }
            Self::DuplicateGroup { name } => write!(f, "duplicate group name '{name}'"),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid glob pattern '{pattern}': {reason}")
            }
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "'{key}' = '{value}' is not a valid {expected}"),
            Self::InvalidRegex {
                key,
                pattern,
                source,
            } => write!(f, "invalid regex in '{key}' ('{pattern}'): {source}"),
            Self::TomlParse { path, source } => {
                write!(f, "failed to parse '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "cannot read '{}': {source}", path.display())
            }
            Self::NotConfigured => write!(f, "source has not been configured"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for TailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Position snapshot errors
// ---------------------------------------------------------------------------

/// Errors raised while writing the position snapshot. Load failures are not
/// errors: a missing or corrupt snapshot loads as an empty map.
#[derive(Debug)]
pub enum PositionError {
    /// The snapshot could not be serialised.
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// I/O error writing or renaming the snapshot file.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { path, source } => {
                write!(f, "cannot serialise snapshot '{}': {source}", path.display())
            }
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "snapshot {operation} failed for '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for PositionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<PositionError> for TailError {
    fn from(e: PositionError) -> Self {
        Self::Position(e)
    }
}

// ---------------------------------------------------------------------------
// Channel errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the downstream channel. A failed `put` or `commit`
/// rolls the transaction back; offsets are not advanced.
#[derive(Debug)]
pub enum ChannelError {
    /// The channel refused the batch.
    Rejected { reason: String },

    /// I/O error while delivering the batch.
    Io { source: io::Error },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "transaction rejected: {reason}"),
            Self::Io { source } => write!(f, "delivery failed: {source}"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ChannelError> for TailError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

/// Convenience type alias for logtail results.
pub type Result<T> = std::result::Result<T, TailError>;
