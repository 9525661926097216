// Error types for log tailing and note loading.

use std::path::PathBuf;

/// Failure of a profile operation.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No profile with this id is configured.
    #[error("unknown client profile '{0}'")]
    UnknownProfile(String),

    /// The log file could not be opened or its first line could not be read.
    /// Expected until the game has been launched once; callers retry on the next trigger.
    #[error("log file {} is unavailable: {source}", path.display())]
    LogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackerError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::LogUnavailable { .. })
    }
}

/// Failure while loading note rules.
#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    #[error("failed to read notes file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid notes definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("note rule {index} has min_level {min} above max_level {max}")]
    InvertedRange { index: usize, min: u32, max: u32 },
}
