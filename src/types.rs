use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU64;

/// Daemon-local torrent id as printed in the first column of the list output.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub(crate) struct TorrentId(String);

impl TorrentId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for TorrentId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim().trim_end_matches('*');
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid torrent id {:?}", value));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the daemon names a torrent's metadata files on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Identifier {
    /// `<hash>.torrent` and `<hash>.resume`.
    #[default]
    Hash,
    /// `<name>.<hash16>.torrent` and `<name>.<hash16>.resume`.
    Name,
}

impl Identifier {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MigrationLimit(NonZeroU64);

impl MigrationLimit {
    pub(crate) fn new(value: u64) -> Result<Self, String> {
        let Some(value) = NonZeroU64::new(value) else {
            return Err("must be a positive integer (got 0)".to_string());
        };
        Ok(Self(value))
    }

    pub(crate) fn get(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn reached(self, migrated: u64) -> bool {
        migrated >= self.get()
    }
}

impl fmt::Display for MigrationLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Minimum time since a torrent finished downloading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct AgeThreshold(NonZeroU64);

impl AgeThreshold {
    pub(crate) fn from_secs(secs: u64) -> Result<Self, String> {
        let Some(secs) = NonZeroU64::new(secs) else {
            return Err("must be a positive number of seconds (got 0)".to_string());
        };
        Ok(Self(secs))
    }

    pub(crate) fn as_secs(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for AgeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}
