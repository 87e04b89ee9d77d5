use crate::error::ApiError;
use crate::notice::{Notice, Notifier};
use crate::session::SessionContext;
use crate::types::{
    AuthCheck, ChatTurn, EpisodeList, EpisodeSession, ProfileUpdate, StartEpisodeRequest,
};
use std::sync::Arc;

pub mod config;
mod consts;
pub mod transport;

use transport::{ApiRequest, ApiResponse, Audience, FormField, ReqwestTransport, Transport};

/// Audio packaged for the chat upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAttachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// The two request clients plus the response handling shared by every
/// endpoint.
///
/// A 401 on a private request runs the recovery cascade once: refresh the
/// session, and if that fails too, clear the local session, log out on a
/// best-effort basis and tell the user to log in. Requests are never
/// replayed.
pub struct ApiClient<T: Transport = ReqwestTransport> {
    transport: T,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, session: SessionContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            session,
            notifier,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    async fn execute(
        &self,
        audience: Audience,
        request: ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        let path = request.path.clone();
        let response = self.transport.send(audience, request).await?;
        if response.is_success() {
            return Ok(response);
        }

        if response.status == 401 {
            tracing::debug!("{} answered 401 ({:?})", path, audience);
            return Err(match audience {
                Audience::Public => {
                    self.notifier.notify(Notice::LoginRequired);
                    ApiError::Unauthorized
                }
                Audience::Private => self.recover_session().await,
            });
        }

        Err(ApiError::Status {
            status: response.status,
            body: response.text(),
        })
    }

    async fn recover_session(&self) -> ApiError {
        match self.refresh().await {
            Ok(()) => {
                tracing::info!("session refreshed");
                ApiError::SessionRefreshed
            }
            Err(refresh_error) => {
                tracing::warn!("session refresh failed: {}", refresh_error);
                self.session.clear();

                let logout = ApiRequest::post(consts::AUTH_LOGOUT_PATH);
                match self.transport.send(Audience::Private, logout).await {
                    Ok(response) if !response.is_success() => {
                        tracing::error!("logout after failed refresh returned {}", response.status);
                    }
                    Err(e) => tracing::error!("logout after failed refresh failed: {}", e),
                    Ok(_) => {}
                }

                self.notifier.notify(Notice::LoginRequired);
                ApiError::LoginRequired
            }
        }
    }

    /// Asks the backend to renew the session cookies. Bypasses the 401
    /// handling so a failing refresh cannot recurse.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let request = ApiRequest::post(consts::AUTH_REFRESH_PATH);
        let response = self.transport.send(Audience::Private, request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: response.status,
                body: response.text(),
            })
        }
    }

    /// Reaches the backend root over the public client, before any session
    /// exists. Used as the login entry point.
    pub async fn login(&self) -> Result<(), ApiError> {
        self.execute(Audience::Public, ApiRequest::get(consts::ROOT_PATH))
            .await?;
        Ok(())
    }

    pub async fn check_auth(&self) -> Result<AuthCheck, ApiError> {
        let response = self
            .execute(Audience::Private, ApiRequest::get(consts::AUTH_LOGIN_PATH))
            .await?;
        Ok(response.json()?)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.execute(Audience::Private, ApiRequest::get(consts::AUTH_LOGOUT_PATH))
            .await?;
        Ok(())
    }

    pub async fn set_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let request = ApiRequest::patch(consts::PROFILE_PATH).with_json(update)?;
        self.execute(Audience::Private, request).await?;
        Ok(())
    }

    pub async fn episode_list(&self) -> Result<EpisodeList, ApiError> {
        let response = self
            .execute(Audience::Private, ApiRequest::get(consts::EPISODE_PATH))
            .await?;
        Ok(response.json()?)
    }

    pub async fn start_episode(&self, episode_id: u32) -> Result<EpisodeSession, ApiError> {
        let request = ApiRequest::post(consts::EPISODE_PATH)
            .with_json(&StartEpisodeRequest::new(episode_id))?;
        let response = self.execute(Audience::Private, request).await?;
        Ok(response.json()?)
    }

    pub async fn send_chat(
        &self,
        chat_id: i64,
        audio: AudioAttachment,
    ) -> Result<ChatTurn, ApiError> {
        let fields = vec![
            FormField::File {
                name: consts::AUDIO_FIELD.to_string(),
                file_name: audio.file_name,
                mime_type: audio.mime_type,
                bytes: audio.bytes,
            },
            FormField::Text {
                name: consts::CHAT_ID_FIELD.to_string(),
                value: chat_id.to_string(),
            },
        ];
        let request = ApiRequest::post(consts::EPISODE_CHAT_PATH).with_form(fields);
        let response = self.execute(Audience::Private, request).await?;
        Ok(response.json()?)
    }
}

/// Builds the reqwest-backed client for the given configuration.
pub fn connect(
    config: &config::Config,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
) -> Result<ApiClient, ApiError> {
    let transport = ReqwestTransport::new(config)?;
    tracing::info!("api client ready for {}", config.base_url());
    Ok(ApiClient::new(transport, session, notifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::notice::ChannelNotifier;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use transport::{Body, MockTransport};

    fn client_with(
        transport: MockTransport,
    ) -> (
        ApiClient<MockTransport>,
        tokio::sync::mpsc::UnboundedReceiver<Notice>,
    ) {
        let (notifier, rx) = ChannelNotifier::new();
        let session = SessionContext::new();
        session.login("yunbae");
        (ApiClient::new(transport, session, Arc::new(notifier)), rx)
    }

    fn is_path(path: &'static str) -> impl Fn(&ApiRequest) -> bool {
        move |request: &ApiRequest| request.path == path
    }

    #[tokio::test]
    async fn test_success_decodes_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|audience, request| {
                *audience == Audience::Private && request.path == "/api/v1/auth/login"
            })
            .returning(|_, _| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"authenticated": true, "nickname": "yunbae"}"#,
                ))
            })
            .once();

        let (client, _rx) = client_with(transport);
        let check = client.check_auth().await.unwrap();
        assert!(check.is_authenticated());
        assert_eq!(check.nickname(), Some("yunbae"));
    }

    #[tokio::test]
    async fn test_private_401_with_failing_refresh_logs_out() {
        let mut seq = Sequence::new();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/episode")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ApiResponse::new(401, "")));
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/auth/refresh")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ApiResponse::new(401, "expired")));
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/auth/logout" && r.method == reqwest::Method::POST)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ApiResponse::new(200, "")));

        let (client, mut rx) = client_with(transport);
        let err = client.episode_list().await.unwrap_err();

        assert!(matches!(err, ApiError::LoginRequired));
        assert!(!client.session().is_logged_in());
        assert_eq!(client.session().user_name(), "");
        assert_eq!(rx.try_recv().unwrap(), Notice::LoginRequired);
    }

    #[tokio::test]
    async fn test_cascade_survives_logout_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/episode/chat")
            .returning(|_, _| Ok(ApiResponse::new(401, "")));
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/auth/refresh")
            .returning(|_, _| Err(TransportError::Unavailable("connection reset".into())));
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/auth/logout")
            .returning(|_, _| Err(TransportError::Unavailable("connection reset".into())));

        let (client, mut rx) = client_with(transport);
        let audio = AudioAttachment {
            bytes: vec![1, 2, 3],
            file_name: "recording.wav".into(),
            mime_type: "audio/wav".into(),
        };
        let err = client.send_chat(7, audio).await.unwrap_err();

        assert!(matches!(err, ApiError::LoginRequired));
        assert!(!client.session().is_logged_in());
        assert_eq!(rx.try_recv().unwrap(), Notice::LoginRequired);
    }

    #[tokio::test]
    async fn test_private_401_with_working_refresh_is_not_replayed() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/episode")
            .times(1)
            .returning(|_, _| Ok(ApiResponse::new(401, "")));
        transport
            .expect_send()
            .withf(|_, r| r.path == "/api/v1/auth/refresh")
            .times(1)
            .returning(|_, _| Ok(ApiResponse::new(200, "")));

        let (client, mut rx) = client_with(transport);
        let err = client.episode_list().await.unwrap_err();

        assert!(matches!(err, ApiError::SessionRefreshed));
        assert!(client.session().is_logged_in());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_login_goes_through_public_client() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq(Audience::Public), mockall::predicate::function(is_path("")))
            .times(1)
            .returning(|_, _| Ok(ApiResponse::new(200, "")));

        let (client, _rx) = client_with(transport);
        client.login().await.unwrap();
    }

    #[tokio::test]
    async fn test_public_401_only_notifies() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq(Audience::Public), mockall::predicate::function(is_path("")))
            .times(1)
            .returning(|_, _| Ok(ApiResponse::new(401, "")));

        let (client, mut rx) = client_with(transport);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert!(client.session().is_logged_in());
        assert_eq!(rx.try_recv().unwrap(), Notice::LoginRequired);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _| Err(TransportError::Unavailable("dns".into())));

        let (client, _rx) = client_with(transport);
        let err = client.episode_list().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_shape_mismatch_fails_decoding() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Ok(ApiResponse::new(200, r#"{"likeability": 10}"#)));

        let (client, _rx) = client_with(transport);
        let err = client.episode_list().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Ok(ApiResponse::new(500, "boom")));

        let (client, _rx) = client_with(transport);
        let err = client.start_episode(1).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_chat_upload_is_multipart_with_chat_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|audience, request| {
                let Body::Multipart(fields) = &request.body else {
                    return false;
                };
                *audience == Audience::Private
                    && request.method == reqwest::Method::POST
                    && fields.iter().any(|f| {
                        matches!(f, FormField::File { name, bytes, .. }
                            if name == "audioFile" && bytes == &vec![9, 9])
                    })
                    && fields.iter().any(|f| {
                        matches!(f, FormField::Text { name, value }
                            if name == "chatId" && value == "42")
                    })
            })
            .times(1)
            .returning(|_, _| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"characterName": "Haru", "chatText": "Good!", "likeability": 55, "lastTurn": false}"#,
                ))
            });

        let (client, _rx) = client_with(transport);
        let audio = AudioAttachment {
            bytes: vec![9, 9],
            file_name: "recording.wav".into(),
            mime_type: "audio/wav".into(),
        };
        let turn = client.send_chat(42, audio).await.unwrap();
        assert_eq!(turn.likeability, 55);
    }

    #[tokio::test]
    async fn test_start_episode_sends_episode_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, r| r.body == Body::Json(serde_json::json!({"episodeId": 2})))
            .times(1)
            .returning(|_, _| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"chatId": 5, "characterName": "Haru", "chatText": "Hi", "likeability": 0, "lastTurn": false}"#,
                ))
            });

        let (client, _rx) = client_with(transport);
        let session = client.start_episode(2).await.unwrap();
        assert_eq!(session.chat_id, 5);
    }
}
