//! Error types shared by the engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration file does not exist.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// A configuration file exists but could not be parsed.
    #[error("Failed to parse {}: {source}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other setup problem: credentials, model name, unreadable files.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The generation service failed or returned nothing usable.
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// An externally authored episode does not meet its contract.
    #[error("Invalid episode: {0}")]
    InvalidEpisode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for problems the operator fixes by changing setup.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing(_) | Self::ConfigMalformed { .. } | Self::Config(_)
        )
    }

    /// True when the external generation service is at fault.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_transport_are_distinct() {
        let missing = Error::ConfigMissing(PathBuf::from("/x/mind_seed.json"));
        assert!(missing.is_config());
        assert!(!missing.is_transport());
        assert!(missing.to_string().contains("/x/mind_seed.json"));

        let transport = Error::Transport("timeout".into());
        assert!(transport.is_transport());
        assert!(!transport.is_config());
    }

    #[test]
    fn io_is_neither() {
        let e: Error = std::io::Error::other("disk full").into();
        assert!(!e.is_config());
        assert!(!e.is_transport());
    }

    #[test]
    fn malformed_keeps_parse_error_as_source() {
        use std::error::Error as _;

        let parse_error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err = Error::ConfigMalformed {
            path: PathBuf::from("/x/mind_seed.json"),
            source: Box::new(parse_error),
        };
        assert!(err.is_config());
        let source = err.source().unwrap();
        assert!(source.downcast_ref::<serde_json::Error>().is_some());
        assert!(err.to_string().starts_with("Failed to parse /x/mind_seed.json: "));
    }
}
