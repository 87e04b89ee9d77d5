use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Episode list.
    Home,
    Episode,
    Play,
    Login,
    /// Profile setup after the first login.
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Protected,
    GuestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow(Route),
    Redirect(Route),
    NotFound,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Home,
        Route::Episode,
        Route::Play,
        Route::Login,
        Route::Entry,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Episode => "/episode",
            Route::Play => "/play",
            Route::Login => "/login",
            Route::Entry => "/entry",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    pub fn access(self) -> Access {
        match self {
            Route::Login => Access::GuestOnly,
            _ => Access::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub fn guard(route: Route, logged_in: bool) -> Navigation {
    match (route.access(), logged_in) {
        (Access::Protected, false) => Navigation::Redirect(Route::Login),
        (Access::GuestOnly, true) => Navigation::Redirect(Route::Home),
        _ => Navigation::Allow(route),
    }
}

pub fn resolve(path: &str, logged_in: bool) -> Navigation {
    let navigation = match Route::from_path(path) {
        Some(route) => guard(route, logged_in),
        None => Navigation::NotFound,
    };
    tracing::debug!("navigate {} -> {:?}", path, navigation);
    navigation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_routes_need_login() {
        for route in [Route::Home, Route::Episode, Route::Play, Route::Entry] {
            assert_eq!(guard(route, false), Navigation::Redirect(Route::Login));
            assert_eq!(guard(route, true), Navigation::Allow(route));
        }
    }

    #[test]
    fn test_login_is_guest_only() {
        assert_eq!(guard(Route::Login, false), Navigation::Allow(Route::Login));
        assert_eq!(guard(Route::Login, true), Navigation::Redirect(Route::Home));
    }

    #[test]
    fn test_resolve_paths() {
        assert_eq!(resolve("/", true), Navigation::Allow(Route::Home));
        assert_eq!(resolve("/play/", true), Navigation::Allow(Route::Play));
        assert_eq!(
            resolve("/episode?id=2", false),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(resolve("/settings", true), Navigation::NotFound);
    }
}
