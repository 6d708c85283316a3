use canvas_pilot_client::ClientError;
use canvas_pilot_core::protocol::MissingField;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No bound client or no active canvas yet.
    #[error("Canvas unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Unexpected upstream data: {0}")]
    Parse(String),
}

impl From<ClientError> for EngineError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Decode(msg) => Self::Parse(msg),
            ClientError::Unsupported(kind) => {
                Self::InvalidRequest(format!("widget type '{kind}' cannot be modified"))
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<MissingField> for EngineError {
    fn from(e: MissingField) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
