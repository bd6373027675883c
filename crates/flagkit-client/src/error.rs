/// Failure talking to the remote evaluation endpoint.
///
/// The client never surfaces these from `is_enabled` / `evaluate_flags`;
/// they are logged and the flag is treated as off.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("evaluation endpoint returned {status} for {url}")]
    Status { status: u16, url: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
