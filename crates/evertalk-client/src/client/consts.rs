pub const API_URL_VAR: &str = "EVERTALK_API_URL";

pub const BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend root; the public login entry.
pub const ROOT_PATH: &str = "";
pub const AUTH_LOGIN_PATH: &str = "/api/v1/auth/login";
pub const AUTH_REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const AUTH_LOGOUT_PATH: &str = "/api/v1/auth/logout";
pub const PROFILE_PATH: &str = "/api/v1/user/profile";
pub const EPISODE_PATH: &str = "/api/v1/episode";
pub const EPISODE_CHAT_PATH: &str = "/api/v1/episode/chat";
pub const OAUTH_LOGIN_PATH: &str = "/oauth2/authorization/google";

pub const AUDIO_FIELD: &str = "audioFile";
pub const CHAT_ID_FIELD: &str = "chatId";
