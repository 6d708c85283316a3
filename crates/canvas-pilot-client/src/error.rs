use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream payload: {0}")]
    Decode(String),

    #[error("Widget type '{0}' has no typed endpoint")]
    Unsupported(String),

    #[error("Client config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
