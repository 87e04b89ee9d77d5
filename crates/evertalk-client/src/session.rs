use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_logged_in: bool,
    pub user_name: String,
}

/// Shared handle on the login state.
///
/// Cloning is cheap and every clone sees the same state. Changes are pushed
/// to receivers from [`SessionContext::subscribe`], which is how views know
/// to re-render. Nothing is persisted: a restart re-derives the state from
/// the auth check.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Session>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session::default());
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in
    }

    pub fn user_name(&self) -> String {
        self.state.borrow().user_name.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn set_logged_in(&self, status: bool) {
        self.state.send_modify(|s| s.is_logged_in = status);
    }

    pub fn set_user_name(&self, name: &str) {
        self.state.send_modify(|s| s.user_name = name.to_string());
    }

    pub fn login(&self, name: &str) {
        tracing::debug!("session established for {}", name);
        self.state.send_modify(|s| {
            s.is_logged_in = true;
            s.user_name = name.to_string();
        });
    }

    pub fn clear(&self) {
        tracing::debug!("session cleared");
        self.state.send_replace(Session::default());
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
