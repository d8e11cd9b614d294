//! Startup errors of the blog application.
//!
//! Request-time failures use [`awesome_core::Error`]; this type only covers
//! what can go wrong while the process is being assembled.

use thiserror::Error;

/// Result type alias for application bootstrap
pub type Result<T> = std::result::Result<T, Error>;

/// Bootstrap error types
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Server address could not be parsed
    #[error("Invalid server address {address}: {reason}")]
    InvalidAddress {
        /// The configured host and port
        address: String,
        /// Parser message
        reason: String,
    },

    /// Error raised by the dispatch core (routes, store, server)
    #[error(transparent)]
    Core(#[from] awesome_core::Error),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: Error = awesome_core::Error::database("locked").into();
        assert_eq!(err.to_string(), "Database error: locked");
    }

    #[test]
    fn test_invalid_address_message() {
        let err = Error::InvalidAddress {
            address: "nowhere:99999".to_string(),
            reason: "invalid socket address syntax".to_string(),
        };
        assert!(err.to_string().contains("nowhere:99999"));
    }
}
