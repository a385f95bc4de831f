use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("api error {code}: {message}")]
    ApiError { code: i64, message: String },
    #[error("response has no data")]
    MissingData,
    #[error("other: {0}")]
    Other(String),
}

impl ExtractorError {
    /// Whether the failure came from the network layer rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, ExtractorError::HttpError(_))
    }
}
