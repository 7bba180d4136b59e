use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to build request: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned status {0}")]
    HttpStatus(u16),

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    #[error("Server returned an empty response")]
    EmptyBody,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Album API returned error code {0}")]
    RemoteApi(i64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by the caller's input rather than by us or the platform.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Maps a reqwest failure onto the fetch taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Error::Request(err.to_string())
        } else if err.is_timeout() {
            Error::Transport(err.to_string())
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Error::HttpStatus(status.as_u16())
        } else {
            Error::Transport(err.to_string())
        }
    }
}
