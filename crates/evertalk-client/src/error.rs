/// Failures below HTTP semantics: the request never produced a status.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 401 from the public client. No refresh is attempted.
    #[error("unauthorized")]
    Unauthorized,

    /// 401 from the private client, after which the session refresh worked.
    /// The request itself is not replayed; the caller may issue it again.
    #[error("session was refreshed, retry the request")]
    SessionRefreshed,

    /// 401 from the private client and the refresh failed too. The local
    /// session has been cleared.
    #[error("login required")]
    LoginRequired,

    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized | ApiError::SessionRefreshed | ApiError::LoginRequired => {
                Some(401)
            }
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
