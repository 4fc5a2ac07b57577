use crate::error::Error;
use crate::tlog;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

////////////////////////////////////////////////////////////////////////////////
// Options
////////////////////////////////////////////////////////////////////////////////

/// Options of the ordering analysis.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Options {
    /// NULL is treated as the largest value when a key has no explicit
    /// `NULLS FIRST`/`NULLS LAST`: ascending keys put NULLs last and
    /// descending keys put them first.
    pub nulls_largest: bool,
    /// Compare ORDER BY aliases with select list aliases byte-for-byte.
    /// Otherwise aliases are compared ignoring ASCII case.
    pub alias_case_sensitive: bool,
    /// Reject substitution maps with duplicate sources before applying them.
    /// Off by default: the first of equal sources wins.
    pub verify_substitution_maps: bool,
    pub log_level: LogLevel,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            nulls_largest: true,
            alias_case_sensitive: false,
            verify_substitution_maps: false,
            log_level: LogLevel::Info,
        }
    }
}

impl Options {
    /// Reads options from a yaml document. Fields missing from the
    /// document keep their default values.
    ///
    /// # Errors
    /// - `contents` is not a valid yaml mapping of known fields
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let partial = PartialOptions::from_yaml(contents)?;
        Ok(partial.unwrap_or(Options::default()))
    }

    /// Makes `log_level` the process-wide log level.
    pub fn apply_log_level(&self) {
        tlog::set_log_level(self.log_level.into());
    }
}

/// Like [`Options`], but with some values unspecified.
#[derive(Default, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PartialOptions {
    pub nulls_largest: Option<bool>,
    pub alias_case_sensitive: Option<bool>,
    pub verify_substitution_maps: Option<bool>,
    pub log_level: Option<LogLevel>,
}

impl PartialOptions {
    /// # Errors
    /// - `contents` is not a valid yaml mapping of known fields
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        // An empty document is a yaml null, not an empty mapping.
        if contents.trim().is_empty() {
            return Ok(PartialOptions::default());
        }
        serde_yaml::from_str(contents).map_err(Error::invalid_options)
    }

    /// Creates a full [`Options`] value.
    ///
    /// If a value is specified in `self`, then it will be used.
    /// Otherwise, the corresponding value from `defaults` will be used.
    pub fn unwrap_or(&self, defaults: Options) -> Options {
        Options {
            nulls_largest: self.nulls_largest.unwrap_or(defaults.nulls_largest),
            alias_case_sensitive: self
                .alias_case_sensitive
                .unwrap_or(defaults.alias_case_sensitive),
            verify_substitution_maps: self
                .verify_substitution_maps
                .unwrap_or(defaults.verify_substitution_maps),
            log_level: self.log_level.unwrap_or(defaults.log_level),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// LogLevel
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Crit,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Crit => "crit",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<LogLevel> for slog::Level {
    fn from(l: LogLevel) -> slog::Level {
        match l {
            LogLevel::Crit => slog::Level::Critical,
            LogLevel::Error => slog::Level::Error,
            LogLevel::Warn => slog::Level::Warning,
            LogLevel::Info => slog::Level::Info,
            LogLevel::Debug => slog::Level::Debug,
            LogLevel::Trace => slog::Level::Trace,
        }
    }
}
