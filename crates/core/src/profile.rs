use crate::SessionContext;
use crate::api::{EvertalkApi, retry_refreshed};
use evertalk_client::ApiError;
use evertalk_client::types::{Gender, ProfileUpdate};
use regex::Regex;
use std::sync::LazyLock;

pub const NICKNAME_MIN_CHARS: usize = 2;
pub const NICKNAME_MAX_CHARS: usize = 12;

/// `None` only if the pattern fails to compile, in which case every nickname
/// is rejected.
static NICKNAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9가-힣_-]+$")
        .map_err(|e| tracing::error!("nickname pattern failed to compile: {}", e))
        .ok()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NicknameError {
    #[error("nickname is required")]
    Empty,
    #[error("nickname must be 2 to 12 characters")]
    Length,
    #[error("nickname may only contain Hangul, letters, digits, '_' and '-'")]
    InvalidCharacters,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    Nickname(#[from] NicknameError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Checks a nickname and returns it trimmed.
pub fn validate_nickname(nickname: &str) -> Result<&str, NicknameError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(NicknameError::Empty);
    }
    let chars = nickname.chars().count();
    if !(NICKNAME_MIN_CHARS..=NICKNAME_MAX_CHARS).contains(&chars) {
        return Err(NicknameError::Length);
    }
    if !NICKNAME_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(nickname))
    {
        return Err(NicknameError::InvalidCharacters);
    }
    Ok(nickname)
}

/// Saves nickname and gender, then shows the new name in the session.
pub async fn submit_profile<A: EvertalkApi + ?Sized>(
    api: &A,
    session: &SessionContext,
    nickname: &str,
    gender: Gender,
) -> Result<(), ProfileError> {
    let nickname = validate_nickname(nickname)?;
    let saved = retry_refreshed(|| api.set_profile(ProfileUpdate::new(nickname, gender))).await;
    if let Err(e) = saved {
        tracing::error!("failed to save profile: {}", e);
        return Err(e.into());
    }
    tracing::info!("profile saved for {}", nickname);
    session.set_user_name(nickname);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockEvertalkApi;

    #[test]
    fn test_nickname_pattern_compiles() {
        assert!(NICKNAME_PATTERN.is_some());
    }

    #[test]
    fn test_validate_nickname() {
        assert_eq!(validate_nickname("  민수_01 "), Ok("민수_01"));
        assert_eq!(validate_nickname("ab"), Ok("ab"));
        assert_eq!(validate_nickname("   "), Err(NicknameError::Empty));
        assert_eq!(validate_nickname("a"), Err(NicknameError::Length));
        assert_eq!(
            validate_nickname("abcdefghijklm"),
            Err(NicknameError::Length)
        );
        assert_eq!(
            validate_nickname("가나다라마바사아자차카타"),
            Ok("가나다라마바사아자차카타")
        );
        assert_eq!(
            validate_nickname("hi there"),
            Err(NicknameError::InvalidCharacters)
        );
        assert_eq!(
            validate_nickname("ㅎㅎ"),
            Err(NicknameError::InvalidCharacters)
        );
    }

    #[tokio::test]
    async fn test_submit_profile_updates_session() {
        let mut api = MockEvertalkApi::new();
        api.expect_set_profile()
            .withf(|update| update.nickname() == "Mina" && update.gender() == Gender::Female)
            .times(1)
            .returning(|_| Ok(()));
        let session = SessionContext::new();
        session.login("");

        submit_profile(&api, &session, " Mina ", Gender::Female)
            .await
            .unwrap();
        assert_eq!(session.user_name(), "Mina");
        assert!(session.is_logged_in());
    }

    #[tokio::test]
    async fn test_profile_is_saved_again_after_refresh() {
        let mut api = MockEvertalkApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_set_profile()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::SessionRefreshed));
        api.expect_set_profile()
            .withf(|update| update.nickname() == "Mina")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let session = SessionContext::new();
        session.login("");

        submit_profile(&api, &session, "Mina", Gender::Female)
            .await
            .unwrap();
        assert_eq!(session.user_name(), "Mina");
    }

    #[tokio::test]
    async fn test_invalid_nickname_is_not_sent() {
        let mut api = MockEvertalkApi::new();
        api.expect_set_profile().never();
        let session = SessionContext::new();

        let result = submit_profile(&api, &session, "no spaces!", Gender::Male).await;
        assert!(matches!(
            result,
            Err(ProfileError::Nickname(NicknameError::InvalidCharacters))
        ));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_name() {
        let mut api = MockEvertalkApi::new();
        api.expect_set_profile()
            .returning(|_| Err(ApiError::LoginRequired));
        let session = SessionContext::new();
        session.login("old");

        let result = submit_profile(&api, &session, "new", Gender::Male).await;
        assert!(matches!(result, Err(ProfileError::Api(ApiError::LoginRequired))));
        assert_eq!(session.user_name(), "old");
    }
}
