//! The chat screen: one displayed turn, replaced by every upload.
use crate::api::{EvertalkApi, retry_refreshed};
use crate::episode::display_affection;
use crate::recording::Recording;
use crate::{Notice, Notifier};
use evertalk_client::types::{ChatTurn, EpisodeSession};
use evertalk_client::{ApiError, AudioAttachment};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long the final turn stays on screen before the completion notice.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("recording has no audio to upload")]
    NoAudio,
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct PlaySession<A: EvertalkApi + ?Sized> {
    api: Arc<A>,
    notifier: Arc<dyn Notifier>,
    chat_id: i64,
    turn: ChatTurn,
    completion_delay: Duration,
    completion: Option<JoinHandle<()>>,
}

impl<A: EvertalkApi + ?Sized> PlaySession<A> {
    pub fn new(api: Arc<A>, notifier: Arc<dyn Notifier>, session: EpisodeSession) -> Self {
        Self {
            api,
            notifier,
            chat_id: session.chat_id,
            turn: session.turn,
            completion_delay: COMPLETION_DELAY,
            completion: None,
        }
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }

    pub fn affection(&self) -> u8 {
        display_affection(self.turn.likeability)
    }

    pub fn is_finished(&self) -> bool {
        self.turn.last_turn
    }

    /// Uploads a recording and displays the reply. On failure the displayed
    /// turn stays as it was.
    pub async fn submit(&mut self, recording: Recording) -> Result<&ChatTurn, PlayError> {
        if recording.audio.is_empty() {
            tracing::warn!("recording has no audio, skipping upload");
            return Err(PlayError::NoAudio);
        }

        let attachment = AudioAttachment {
            file_name: recording.file_name(),
            mime_type: recording.mime_type,
            bytes: recording.audio,
        };
        tracing::debug!(
            "uploading {} bytes for chat {}",
            attachment.bytes.len(),
            self.chat_id
        );

        let (api, chat_id) = (&*self.api, self.chat_id);
        let sent = retry_refreshed(|| api.send_chat(chat_id, attachment.clone())).await;
        let turn = match sent {
            Ok(turn) => turn,
            Err(e) => {
                tracing::error!("chat upload failed: {}", e);
                return Err(e.into());
            }
        };

        if turn.last_turn {
            self.schedule_completion(display_affection(turn.likeability));
        }
        self.turn = turn;
        Ok(&self.turn)
    }

    fn schedule_completion(&mut self, affection: u8) {
        tracing::info!("episode finished with affection {}", affection);
        if let Some(previous) = self.completion.take() {
            previous.abort();
        }
        let notifier = self.notifier.clone();
        let deadline = tokio::time::Instant::now() + self.completion_delay;
        self.completion = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            notifier.notify(Notice::EpisodeComplete {
                likeability: affection as i32,
            });
        }));
    }
}

impl<A: EvertalkApi + ?Sized> Drop for PlaySession<A> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.abort();
        }
    }
}
