//! Error type for every client operation

use common::DecodeError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad or missing input, detected before any request is sent.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Connection failures, malformed URLs, I/O on request or response bodies.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The server answered with a status the operation does not accept.
    #[error("Job server {url} responded {status}: {body}")]
    Remote { url: String, status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ClientError::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// HTTP status for [`ClientError::Remote`].
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let message = match err.url() {
            Some(url) => format!("Request to {} failed", url),
            None => "Request to job server failed".to_string(),
        };
        ClientError::transport(message, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.jar");
        let err = ClientError::transport("Failed to open binary", io);
        assert_eq!(err.to_string(), "Failed to open binary");
        assert!(err.source().unwrap().to_string().contains("missing.jar"));
    }

    #[test]
    fn test_remote_status() {
        let err = ClientError::Remote {
            url: "http://localhost:8090/jobs".into(),
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_validation());
        assert!(err.to_string().contains("500"));
    }
}
