use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Whether large pairwise differences are excluded before the analysis.
///
/// At the integer boundary the flag is `1` for [`Filtering::Enabled`] and `0` for
/// [`Filtering::Disabled`]; every other value is rejected with [`Error::InvalidFlag`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Filtering {
    /// Include all dataset differences regardless of size
    #[default]
    Disabled,
    /// Exclude positions where a pairwise difference exceeds
    /// [`DIFFERENCE_THRESHOLD`](crate::DIFFERENCE_THRESHOLD)
    Enabled,
}

impl Filtering {
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl TryFrom<i64> for Filtering {
    type Error = Error;

    fn try_from(flag: i64) -> Result<Self> {
        match flag {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Enabled),
            other => Err(Error::InvalidFlag(other)),
        }
    }
}

impl From<Filtering> for i64 {
    fn from(filtering: Filtering) -> Self {
        match filtering {
            Filtering::Disabled => 0,
            Filtering::Enabled => 1,
        }
    }
}

impl From<bool> for Filtering {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// Estimator settings, as read from a TOML document
///
/// ```toml
/// filter_outliers = 1
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub filter_outliers: Filtering,
}

impl Config {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    /// Returns [`Error::InvalidFlag`] if `filter_outliers` is neither `0` nor `1`, or
    /// [`Error::Config`] if the document is otherwise malformed.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents)?;
        // Surface the flag error directly rather than wrapped in a toml message
        if let Some(flag) = table.get("filter_outliers").and_then(toml::Value::as_integer) {
            Filtering::try_from(flag)?;
        }
        Ok(toml::from_str(contents)?)
    }

    /// Read a configuration file from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(?path, ?config, "read configuration");
        Ok(config)
    }
}
