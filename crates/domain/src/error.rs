/// Shared error type used across all Courtside crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("empty response body")]
    EmptyResponse,

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the failure classes that may be shown to the user as
    /// fallback bubble text. Everything else is logged and swallowed.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::EmptyResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_classes() {
        assert!(Error::Network("down".into()).is_user_visible());
        assert!(Error::Timeout("15s".into()).is_user_visible());
        assert!(Error::EmptyResponse.is_user_visible());
        assert!(!Error::Persistence("disk".into()).is_user_visible());
        assert!(!Error::Cancelled.is_user_visible());
    }
}
