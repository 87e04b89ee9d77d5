use std::fmt;
use tokio::sync::mpsc;

/// User-visible notices. The front-end decides how to show them (toast,
/// modal, alert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoginRequired,
    SessionExpired,
    /// Microphone access was refused. Blocking: the user must act.
    MicrophoneDenied,
    CaptureUnavailable(String),
    EpisodeComplete { likeability: i32 },
}

impl Notice {
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Notice::SessionExpired | Notice::MicrophoneDenied | Notice::EpisodeComplete { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LoginRequired => write!(f, "Login is required."),
            Notice::SessionExpired => write!(f, "Your session has expired. Please log in again."),
            Notice::MicrophoneDenied => {
                write!(f, "Microphone access was denied. Allow it to talk with the character.")
            }
            Notice::CaptureUnavailable(reason) => {
                write!(f, "Voice input is not available: {reason}")
            }
            Notice::EpisodeComplete { likeability } => {
                write!(f, "Episode complete! Affection: {likeability}")
            }
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to whoever renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if let Err(e) = self.tx.send(notice) {
            tracing::warn!("notice dropped, nobody is listening: {:?}", e.0);
        }
    }
}

/// Writes notices to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        if notice.is_blocking() {
            tracing::warn!("{}", notice);
        } else {
            tracing::info!("{}", notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_notice_shows_affection() {
        let notice = Notice::EpisodeComplete { likeability: 92 };
        assert!(notice.to_string().contains("92"));
        assert!(notice.is_blocking());
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notice::LoginRequired);
        assert_eq!(rx.try_recv().unwrap(), Notice::LoginRequired);
    }
}
