/// One entry of the episode list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDetail {
    pub episode_id: u32,
    pub episode_title: String,
}

/// `GET /api/v1/episode` response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeList {
    /// Affection score, kept in `[0, 100]` by the server.
    pub likeability: i32,

    /// Number of completed episodes.
    pub progress: u32,

    pub episode_detail: Vec<EpisodeDetail>,
}

/// `POST /api/v1/episode` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEpisodeRequest {
    episode_id: u32,
}

impl StartEpisodeRequest {
    pub fn new(episode_id: u32) -> Self {
        Self { episode_id }
    }

    pub fn episode_id(&self) -> u32 {
        self.episode_id
    }
}
