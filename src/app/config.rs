// logtail - app/config.rs
//
// Flat key/value configuration context and its validated conversion into a
// source configuration. All context values are strings; typed accessors
// parse on demand. Validation failures are fatal configuration errors
// raised at `configure`, before `start`.

use crate::core::model::FileGroup;
use crate::core::multiline::{Belong, MultilineSettings};
use crate::core::pattern::TailPattern;
use crate::util::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_FILE_HEADER_KEY, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_MULTILINE_EVENT_TIMEOUT_SECS, DEFAULT_MULTILINE_MAX_BYTES,
    DEFAULT_MULTILINE_MAX_LINES, DEFAULT_WRITE_POS_INTERVAL_SECS,
};
use crate::util::error::ConfigError;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Context
// =============================================================================

/// Flat string key/value context handed in by the host.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "boolean",
            }),
        }
    }

    fn get_u64(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    fn get_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    /// All `<prefix><rest>` pairs with the prefix stripped.
    fn sub_properties(&self, prefix: &str) -> BTreeMap<String, String> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
            .collect()
    }
}

impl FromIterator<(String, String)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// SourceConfig
// =============================================================================

/// Validated source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub position_file: PathBuf,
    pub groups: Vec<FileGroup>,
    /// `Some(key)` when the path header is enabled.
    pub file_header_key: Option<String>,
    pub byte_offset_header: bool,
    pub batch_size: usize,
    pub backoff_without_nl: bool,
    pub idle_timeout: Duration,
    pub write_pos_interval: Duration,
    pub skip_to_end: bool,
    pub multiline: Option<MultilineSettings>,
}

impl SourceConfig {
    pub fn from_context(ctx: &Context) -> Result<Self, ConfigError> {
        let position_file = PathBuf::from(ctx.require("positionFile")?);

        let group_names: Vec<&str> = ctx.require("filegroups")?.split_whitespace().collect();
        if group_names.is_empty() {
            return Err(ConfigError::EmptyFileGroups);
        }

        let mut groups: Vec<FileGroup> = Vec::with_capacity(group_names.len());
        for name in group_names {
            if groups.iter().any(|g| g.name == name) {
                return Err(ConfigError::DuplicateGroup {
                    name: name.to_string(),
                });
            }
            let pattern_key = format!("filegroups.{name}");
            let raw = ctx
                .get(&pattern_key)
                .ok_or_else(|| ConfigError::MissingGroupPattern {
                    group: name.to_string(),
                })?;
            let pattern = TailPattern::compile(raw)?;
            let headers = ctx.sub_properties(&format!("headers.{name}."));
            groups.push(FileGroup {
                name: name.to_string(),
                pattern,
                headers,
            });
        }

        let file_header_key = if ctx.get_bool("fileHeader", false)? {
            Some(
                ctx.get("fileHeaderKey")
                    .unwrap_or(DEFAULT_FILE_HEADER_KEY)
                    .to_string(),
            )
        } else {
            None
        };

        let batch_size = ctx.get_usize("batchSize", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batchSize".to_string(),
                value: "0".to_string(),
                expected: "positive integer",
            });
        }

        Ok(Self {
            position_file,
            groups,
            file_header_key,
            byte_offset_header: ctx.get_bool("byteOffsetHeader", false)?,
            batch_size,
            backoff_without_nl: ctx.get_bool("backoffWithoutNL", false)?,
            idle_timeout: Duration::from_secs(
                ctx.get_u64("idleTimeout", DEFAULT_IDLE_TIMEOUT_SECS)?,
            ),
            write_pos_interval: Duration::from_secs(
                ctx.get_u64("writePosInterval", DEFAULT_WRITE_POS_INTERVAL_SECS)?,
            ),
            skip_to_end: ctx.get_bool("skipToEnd", false)?,
            multiline: parse_multiline(ctx)?,
        })
    }
}

fn parse_multiline(ctx: &Context) -> Result<Option<MultilineSettings>, ConfigError> {
    if !ctx.get_bool("multiline", false)? {
        return Ok(None);
    }

    let raw_pattern = ctx.require("multilinePattern")?;
    let pattern = Regex::new(raw_pattern).map_err(|e| ConfigError::InvalidRegex {
        key: "multilinePattern".to_string(),
        pattern: raw_pattern.to_string(),
        source: e,
    })?;

    let belong = match ctx.get("multilinePatternBelong").unwrap_or("previous") {
        "previous" => Belong::Previous,
        "next" => Belong::Next,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "multilinePatternBelong".to_string(),
                value: other.to_string(),
                expected: "'previous' or 'next'",
            })
        }
    };

    Ok(Some(MultilineSettings {
        pattern,
        belong,
        matched: ctx.get_bool("multilinePatternMatched", true)?,
        max_bytes: ctx.get_usize("multilineMaxBytes", DEFAULT_MULTILINE_MAX_BYTES)?,
        max_lines: ctx.get_usize("multilineMaxLines", DEFAULT_MULTILINE_MAX_LINES)?,
        timeout: Duration::from_secs(ctx.get_u64(
            "multilineEventTimeoutSecs",
            DEFAULT_MULTILINE_EVENT_TIMEOUT_SECS,
        )?),
    }))
}

// =============================================================================
// Tests
// =============================================================================
