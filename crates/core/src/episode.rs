//! The episode list: lock rules, selection and starting.
use crate::api::{EvertalkApi, retry_refreshed};
use evertalk_client::ApiError;
use evertalk_client::types::{EpisodeList, EpisodeSession};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    Completed,
    Available,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: u32,
    pub title: String,
}

/// Affection and progress as last fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeProgress {
    pub likeability: i32,
    pub progress: u32,
    pub episodes: Vec<Episode>,
}

impl From<EpisodeList> for EpisodeProgress {
    fn from(list: EpisodeList) -> Self {
        Self {
            likeability: list.likeability,
            progress: list.progress,
            episodes: list
                .episode_detail
                .into_iter()
                .map(|detail| Episode {
                    id: detail.episode_id,
                    title: detail.episode_title,
                })
                .collect(),
        }
    }
}

impl EpisodeProgress {
    pub fn status(&self, episode_id: u32) -> EpisodeStatus {
        if episode_id <= self.progress {
            EpisodeStatus::Completed
        } else if episode_id == self.progress + 1 {
            EpisodeStatus::Available
        } else {
            EpisodeStatus::Locked
        }
    }

    pub fn is_locked(&self, episode_id: u32) -> bool {
        self.status(episode_id) == EpisodeStatus::Locked
    }

    pub fn is_completed(&self, episode_id: u32) -> bool {
        self.status(episode_id) == EpisodeStatus::Completed
    }

    /// Affection for display.
    pub fn affection(&self) -> u8 {
        display_affection(self.likeability)
    }
}

/// Clamps a likeability score into the `0..=100` display range.
pub fn display_affection(likeability: i32) -> u8 {
    likeability.clamp(0, 100) as u8
}

#[derive(Debug, thiserror::Error)]
pub enum EpisodeError {
    #[error("episode {0} is locked")]
    Locked(u32),
    #[error("episode list has not been loaded")]
    NotLoaded,
    #[error("no episode selected")]
    NothingSelected,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Episode list page state.
pub struct EpisodeBoard<A: EvertalkApi + ?Sized> {
    api: Arc<A>,
    progress: Option<EpisodeProgress>,
    selected: Option<u32>,
}

impl<A: EvertalkApi + ?Sized> EpisodeBoard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            progress: None,
            selected: None,
        }
    }

    pub fn progress(&self) -> Option<&EpisodeProgress> {
        self.progress.as_ref()
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    /// Fetches affection, progress and the episode titles. A failed fetch
    /// keeps whatever was loaded before.
    pub async fn get_episode_list(&mut self) -> Result<&EpisodeProgress, EpisodeError> {
        let api = &*self.api;
        let list = match retry_refreshed(|| api.episode_list()).await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!("failed to fetch episode list: {}", e);
                return Err(e.into());
            }
        };
        let progress = EpisodeProgress::from(list);
        tracing::info!(
            "loaded {} episodes, progress {}",
            progress.episodes.len(),
            progress.progress
        );
        Ok(self.progress.insert(progress))
    }

    pub fn select(&mut self, episode_id: u32) -> Result<(), EpisodeError> {
        let progress = self.progress.as_ref().ok_or(EpisodeError::NotLoaded)?;
        if progress.is_locked(episode_id) {
            return Err(EpisodeError::Locked(episode_id));
        }
        self.selected = Some(episode_id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Starts `episode_id` and returns its opening turn. Locked episodes are
    /// rejected without a request.
    pub async fn start_episode(&self, episode_id: u32) -> Result<EpisodeSession, EpisodeError> {
        let progress = self.progress.as_ref().ok_or(EpisodeError::NotLoaded)?;
        if progress.is_locked(episode_id) {
            tracing::warn!("refusing to start locked episode {}", episode_id);
            return Err(EpisodeError::Locked(episode_id));
        }

        let api = &*self.api;
        match retry_refreshed(|| api.start_episode(episode_id)).await {
            Ok(session) => {
                tracing::info!("started episode {} (chat {})", episode_id, session.chat_id);
                Ok(session)
            }
            Err(e) => {
                tracing::error!("failed to start episode {}: {}", episode_id, e);
                Err(e.into())
            }
        }
    }

    pub async fn start_selected(&self) -> Result<EpisodeSession, EpisodeError> {
        let episode_id = self.selected.ok_or(EpisodeError::NothingSelected)?;
        self.start_episode(episode_id).await
    }
}
