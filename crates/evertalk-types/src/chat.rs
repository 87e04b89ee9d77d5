/// One exchange with the character.
///
/// Returned by both the episode start and the chat upload endpoints. The
/// client only displays the most recent one.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub character_name: String,
    pub chat_text: String,

    /// Grammar feedback on what the user said.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,

    /// Emotion tag or image key for the character portrait.
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,

    pub likeability: i32,
    pub last_turn: bool,
}

/// `POST /api/v1/episode` response: the chat id for later uploads plus the
/// opening turn.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSession {
    pub chat_id: i64,

    #[serde(flatten)]
    pub turn: ChatTurn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_turn_accepts_image_alias() {
        let body = r#"{
            "characterName": "Haru",
            "chatText": "Nice to meet you!",
            "image": "smile",
            "likeability": 12,
            "lastTurn": false
        }"#;
        let turn: ChatTurn = serde_json::from_str(body).unwrap();
        assert_eq!(turn.emotion.as_deref(), Some("smile"));
        assert_eq!(turn.feedback_text, None);
    }

    #[test]
    fn test_chat_turn_with_string_likeability_is_rejected() {
        let body = r#"{
            "characterName": "Haru",
            "chatText": "hi",
            "likeability": "high",
            "lastTurn": false
        }"#;
        assert!(serde_json::from_str::<ChatTurn>(body).is_err());
    }

    #[test]
    fn test_episode_session_flattens_turn() {
        let body = r#"{
            "chatId": 77,
            "characterName": "Haru",
            "chatText": "Welcome back.",
            "feedbackText": null,
            "likeability": 30,
            "lastTurn": false
        }"#;
        let session: EpisodeSession = serde_json::from_str(body).unwrap();
        assert_eq!(session.chat_id, 77);
        assert_eq!(session.turn.chat_text, "Welcome back.");
    }
}
