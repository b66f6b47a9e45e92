use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid relay url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("channel closed")]
    ChannelClosed,

    #[error("connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    #[error("card not found: {0}")]
    CardNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Only transport failures are worth another connection attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::WebSocket(_) | Error::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_retry() {
        assert!(Error::ChannelClosed.is_retryable());
        assert!(!Error::Validation("deck is full".into()).is_retryable());
        assert!(!Error::CardNotFound("x".into()).is_retryable());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = Error::ConnectionFailed { attempts: 5 };
        assert_eq!(err.to_string(), "connection failed after 5 attempts");
    }
}
