/// `GET /api/v1/auth/login` response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AuthCheck {
    authenticated: bool,

    /// Only present once the user finished the profile setup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
}

impl AuthCheck {
    pub fn authenticated(nickname: &str) -> Self {
        Self {
            authenticated: true,
            nickname: Some(nickname.to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            nickname: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }
}
