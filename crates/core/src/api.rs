use async_trait::async_trait;
use evertalk_client::types::{
    AuthCheck, ChatTurn, EpisodeList, EpisodeSession, ProfileUpdate,
};
use evertalk_client::{ApiClient, ApiError, AudioAttachment, Transport};
#[cfg(test)]
use mockall::automock;
use std::future::Future;

/// The backend as the flows see it. [`ApiClient`] is the real one; tests use
/// the generated mock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EvertalkApi: Send + Sync {
    async fn login(&self) -> Result<(), ApiError>;

    async fn check_auth(&self) -> Result<AuthCheck, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn set_profile(&self, update: ProfileUpdate) -> Result<(), ApiError>;

    async fn episode_list(&self) -> Result<EpisodeList, ApiError>;

    async fn start_episode(&self, episode_id: u32) -> Result<EpisodeSession, ApiError>;

    async fn send_chat(&self, chat_id: i64, audio: AudioAttachment) -> Result<ChatTurn, ApiError>;
}

#[async_trait]
impl<T: Transport> EvertalkApi for ApiClient<T> {
    async fn login(&self) -> Result<(), ApiError> {
        ApiClient::<T>::login(self).await
    }

    async fn check_auth(&self) -> Result<AuthCheck, ApiError> {
        ApiClient::<T>::check_auth(self).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        ApiClient::<T>::logout(self).await
    }

    async fn set_profile(&self, update: ProfileUpdate) -> Result<(), ApiError> {
        ApiClient::<T>::set_profile(self, &update).await
    }

    async fn episode_list(&self) -> Result<EpisodeList, ApiError> {
        ApiClient::<T>::episode_list(self).await
    }

    async fn start_episode(&self, episode_id: u32) -> Result<EpisodeSession, ApiError> {
        ApiClient::<T>::start_episode(self, episode_id).await
    }

    async fn send_chat(&self, chat_id: i64, audio: AudioAttachment) -> Result<ChatTurn, ApiError> {
        ApiClient::<T>::send_chat(self, chat_id, audio).await
    }
}

/// Issues `call` again once when the first attempt only renewed the session.
/// The client never replays requests itself.
pub async fn retry_refreshed<T, F, Fut>(mut call: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match call().await {
        Err(ApiError::SessionRefreshed) => {
            tracing::debug!("session refreshed, issuing the request again");
            call().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_once_after_refresh() {
        let calls = AtomicU32::new(0);
        let result = retry_refreshed(|| async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ApiError::SessionRefreshed),
                _ => Ok(7),
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_refresh_is_returned() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_refreshed(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::SessionRefreshed)
        })
        .await;
        assert!(matches!(result, Err(ApiError::SessionRefreshed)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_refreshed(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::LoginRequired)
        })
        .await;
        assert!(matches!(result, Err(ApiError::LoginRequired)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
