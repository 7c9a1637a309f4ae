use shared::error::Rejection;
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("undecodable response (status {status}): {source}")]
    Decode {
        status: u16,
        source: serde_json::Error,
    },
    #[error("rejected by authority: {0}")]
    Rejected(#[from] Rejection),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Text shown to the participant: authority rejections verbatim, everything else as `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected(rejection) => rejection.message.clone(),
            Self::Validation(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
