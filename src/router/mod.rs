//! Routes and the authentication gate in front of them
//!
//! Every CLI command maps to a route of the moderation panel. The guard
//! decides, before a command runs, whether it may proceed or has to be
//! redirected.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::api::client::ApiClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    /// Vacancy and candidate listings; the default authenticated route.
    ModeratorPanel,
    Candidate { id: u64 },
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// Where an authenticated user lands.
    pub fn default_authenticated() -> Self {
        Route::ModeratorPanel
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::ModeratorPanel => "/".to_string(),
            Route::Candidate { id } => format!("/candidate/{}", id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of a guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(Route),
}

/// The navigation layer, as seen by the request gateway.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> Option<Route>;
    fn navigate(&self, route: Route);
}

/// Navigator for the terminal: remembers the active route and tells the user
/// when the session is gone.
#[derive(Debug, Default)]
pub struct CliNavigator {
    current: Mutex<Option<Route>>,
}

impl CliNavigator {
    pub fn enter(&self, route: Route) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(route);
    }
}

impl Navigator for CliNavigator {
    fn current_route(&self) -> Option<Route> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn navigate(&self, route: Route) {
        if route == Route::Login {
            tracing::warn!("Session expired");
            eprintln!("Your session has expired. Run 'recruit-cli login' to sign in again.");
        } else {
            tracing::debug!("Navigating to {}", route);
        }
        self.enter(route);
    }
}

pub struct RouteGuard {
    client: Arc<ApiClient>,
}

impl RouteGuard {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Decide whether navigation to `to` may proceed.
    ///
    /// A protected route without a valid session gets one refresh attempt;
    /// the login route redirects away when the user is already signed in.
    pub async fn before_each(&self, to: &Route) -> Navigation {
        let authenticated = self.client.token_store().is_authenticated();

        if to.requires_auth() && !authenticated {
            return match self.client.refresh_session().await {
                Ok(_) => Navigation::Proceed,
                Err(e) => {
                    tracing::info!("Not authenticated for {}: {}", to, e);
                    Navigation::Redirect(Route::Login)
                }
            };
        }

        if *to == Route::Login && authenticated {
            return Navigation::Redirect(Route::default_authenticated());
        }

        Navigation::Proceed
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Route>>,
}

#[cfg(test)]
impl RecordingNavigator {
    pub fn visits(&self) -> Vec<Route> {
        self.visits.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Navigator for RecordingNavigator {
    fn current_route(&self) -> Option<Route> {
        self.visits.lock().unwrap().last().cloned()
    }

    fn navigate(&self, route: Route) {
        self.visits.lock().unwrap().push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::{TokenRecord, TokenStore};
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn guard_for(server: &MockServer, store: Arc<TokenStore>) -> RouteGuard {
        let config = Config {
            base_url: server.uri(),
            ..Config::default()
        };
        let navigator = Arc::new(RecordingNavigator::default());
        RouteGuard::new(Arc::new(ApiClient::new(&config, store, navigator).unwrap()))
    }

    fn authenticated_store() -> Arc<TokenStore> {
        let store = Arc::new(TokenStore::in_memory());
        store.set_tokens(&TokenRecord {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            expires_in: 3600,
        });
        store
    }

    fn expired_store() -> Arc<TokenStore> {
        let store = Arc::new(TokenStore::in_memory());
        store.set_tokens_at(
            &TokenRecord {
                access_token: "a1".to_string(),
                refresh_token: "r1".to_string(),
                expires_in: 3600,
            },
            0,
        );
        store
    }

    #[test]
    fn test_only_login_is_public() {
        assert!(!Route::Login.requires_auth());
        assert!(Route::ModeratorPanel.requires_auth());
        assert!(Route::Candidate { id: 3 }.requires_auth());
        assert_eq!(Route::Candidate { id: 3 }.to_string(), "/candidate/3");
    }

    #[tokio::test]
    async fn test_protected_route_with_session_proceeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let guard = guard_for(&server, authenticated_store());
        assert_eq!(
            guard.before_each(&Route::ModeratorPanel).await,
            Navigation::Proceed
        );
    }

    #[tokio::test]
    async fn test_protected_route_refresh_fails_redirects_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let store = expired_store();
        let guard = guard_for(&server, store.clone());
        assert_eq!(
            guard.before_each(&Route::Candidate { id: 1 }).await,
            Navigation::Redirect(Route::Login)
        );
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_protected_route_without_any_session_redirects() {
        let server = MockServer::start().await;
        let guard = guard_for(&server, Arc::new(TokenStore::in_memory()));
        assert_eq!(
            guard.before_each(&Route::ModeratorPanel).await,
            Navigation::Redirect(Route::Login)
        );
    }

    #[tokio::test]
    async fn test_protected_route_refresh_succeeds_proceeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = expired_store();
        let guard = guard_for(&server, store.clone());
        assert_eq!(
            guard.before_each(&Route::ModeratorPanel).await,
            Navigation::Proceed
        );
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_while_authenticated_redirects_to_panel() {
        let server = MockServer::start().await;
        let guard = guard_for(&server, authenticated_store());
        assert_eq!(
            guard.before_each(&Route::Login).await,
            Navigation::Redirect(Route::ModeratorPanel)
        );
    }

    #[tokio::test]
    async fn test_login_while_anonymous_proceeds() {
        let server = MockServer::start().await;
        let guard = guard_for(&server, Arc::new(TokenStore::in_memory()));
        assert_eq!(guard.before_each(&Route::Login).await, Navigation::Proceed);
    }

    #[test]
    fn test_cli_navigator_tracks_route() {
        let navigator = CliNavigator::default();
        assert_eq!(navigator.current_route(), None);
        navigator.enter(Route::ModeratorPanel);
        navigator.navigate(Route::Login);
        assert_eq!(navigator.current_route(), Some(Route::Login));
    }
}
