use std::fmt;

use crate::peer::PeerId;

/// Main error type for the tradepost marketplace simulation
#[derive(Debug)]
pub enum MarketError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Target peer is crashed or its dispatch queue is unreachable
    Unavailable(PeerId),

    /// A trading call arrived at a peer that does not believe itself coordinator
    NotCoordinator(PeerId),

    /// Directory lookup for an unknown peer ID
    NotFound(PeerId),

    /// An election forward tried every other peer and all of them failed
    Exhausted,

    /// Ledger state errors
    Ledger(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Snapshot serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Internal lock poisoning or channel errors
    Concurrency(String),
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MarketError::Unavailable(peer_id) => {
                write!(f, "Peer {} is unavailable", peer_id)
            }
            MarketError::NotCoordinator(peer_id) => {
                write!(f, "Peer {} is not the coordinator", peer_id)
            }
            MarketError::NotFound(peer_id) => {
                write!(f, "Peer {} is not in the directory", peer_id)
            }
            MarketError::Exhausted => {
                write!(f, "Election round exhausted: no reachable peer")
            }
            MarketError::Ledger(msg) => write!(f, "Ledger error: {}", msg),
            MarketError::Io(err) => write!(f, "I/O error: {}", err),
            MarketError::Serialization(err) => write!(f, "Serialization error: {}", err),
            MarketError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl std::error::Error for MarketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarketError::Io(err) => Some(err),
            MarketError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, MarketError>;

// Conversions from common error types
impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        MarketError::Io(err)
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = MarketError::Config("peer count must be positive".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: peer count must be positive"
        );

        let unavailable = MarketError::Unavailable(3);
        assert_eq!(unavailable.to_string(), "Peer 3 is unavailable");

        let io_err = MarketError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        assert!(io_err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let market_err: MarketError = io_err.into();

        assert!(matches!(market_err, MarketError::Io(_)));
    }
}
