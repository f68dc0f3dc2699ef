use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Method;
use tracing::{debug, info};

pub mod api;
pub mod error;

pub use error::LinkyError;

const LOGIN_BASE_URL: &str = "https://espace-client-connexion.enedis.fr";
const DATA_BASE_URL: &str =
    "https://espace-client-particuliers.enedis.fr/group/espace-particuliers";
const LOGIN_ENDPOINT: &str = "/auth/UI/Login";
const LANDING_ENDPOINT: &str = "/accueil";

/// The cookie whose presence proves the portal accepted the credentials.
const SESSION_COOKIE: &str = "iPlanetDirectoryPro";
const LOGIN_REALM: &str = "realm=particuliers";

// The portal serves an error page to anything that does not look like a
// desktop browser.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/77.0.3865.120 Safari/537.36";

const MAX_REDIRECTS: usize = 20;

/// Portal login and password, supplied once at construction.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lifecycle of the one portal session a [`LinkyApi`] owns.
///
/// `Failed` is terminal: once login has been refused, every data call fails
/// fast without touching the network again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Failed,
}

/// The transport surface data queries go through.
///
/// One implementor holds one persistent connection/cookie context; every
/// call may mutate the cookie state. Not safe for concurrent use from
/// multiple threads without external synchronization.
pub trait SessionClient {
    /// Issue a data request against the portal and return the response body.
    ///
    /// `path` is resolved against the implementor's data base URL. When
    /// `form` is non-empty the request is sent as a POST carrying it as an
    /// urlencoded body, otherwise as a plain GET (the portlet endpoint
    /// expects exactly that).
    fn send(
        &self,
        path: &str,
        query: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<String, LinkyError>;
}

/// Authenticated client for the Enedis customer portal.
///
/// Construction is cheap; [`LinkyApi::authenticate`] performs the login
/// handshake and must succeed before any consumption query is usable.
#[derive(Debug)]
pub struct LinkyApi {
    credentials: Credentials,
    login_base_url: String,
    data_base_url: String,
    state: SessionState,
    http: Client,
}

impl LinkyApi {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Result<Self, LinkyError> {
        let http = Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(LinkyApi {
            credentials: Credentials::new(login, password),
            login_base_url: LOGIN_BASE_URL.to_string(),
            data_base_url: DATA_BASE_URL.to_string(),
            state: SessionState::Unauthenticated,
            http,
        })
    }

    /// Read `UTILISATEUR_ENEDIS` / `MOTDEPASSE_ENEDIS` from the environment
    /// (an `.env` file is honored when present).
    pub fn from_env_values() -> Result<Self, LinkyError> {
        let _ = dotenvy::dotenv();
        let login = std::env::var("UTILISATEUR_ENEDIS")
            .map_err(|_| LinkyError::Validation("UTILISATEUR_ENEDIS must be set".to_string()))?;
        let password = std::env::var("MOTDEPASSE_ENEDIS")
            .map_err(|_| LinkyError::Validation("MOTDEPASSE_ENEDIS must be set".to_string()))?;

        LinkyApi::new(login, password)
    }

    /// Point the client at different portal hosts. Used by tests.
    pub fn with_base_urls(
        mut self,
        login_base_url: impl Into<String>,
        data_base_url: impl Into<String>,
    ) -> Self {
        self.login_base_url = login_base_url.into();
        self.data_base_url = data_base_url.into();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Perform the login handshake.
    ///
    /// Posts the credential form, checks the `Set-Cookie` response headers
    /// for the session-identity cookie, then issues one warm-up GET to the
    /// landing page (its body is discarded) so the portal settles the
    /// session. Any failure leaves the session in `Failed`; login is never
    /// retried.
    pub fn authenticate(&mut self) -> Result<(), LinkyError> {
        self.state = SessionState::Authenticating;

        let form = [
            ("IDToken1".to_string(), self.credentials.login.clone()),
            ("IDToken2".to_string(), self.credentials.password.clone()),
            (
                "SunQueryParamsString".to_string(),
                STANDARD.encode(LOGIN_REALM),
            ),
            ("encoded".to_string(), "true".to_string()),
            ("gx_charset".to_string(), "UTF-8".to_string()),
        ];
        let login_url = format!("{}{}", self.login_base_url, LOGIN_ENDPOINT);

        let response = match self.request(Method::POST, &login_url, &[], &form) {
            Ok(r) => r,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        let cookies: HashMap<String, String> =
            parse_set_cookies(response.headers()).into_iter().collect();
        if !cookies.contains_key(SESSION_COOKIE) {
            self.state = SessionState::Failed;
            return Err(LinkyError::Authentication(
                "sorry, could not connect; check your credentials".to_string(),
            ));
        }

        self.state = SessionState::Authenticated;
        info!("portal session established for {}", self.credentials.login);

        // Warm-up request; the portal will not answer the portlet endpoint
        // until the landing page has been visited once.
        let landing_url = format!("{}{}", self.data_base_url, LANDING_ENDPOINT);
        if let Err(e) = self.request(Method::GET, &landing_url, &[], &[]) {
            self.state = SessionState::Failed;
            return Err(e);
        }

        Ok(())
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<reqwest::blocking::Response, LinkyError> {
        debug!("portal request: {} {}", method, url);
        let mut request = self.http.request(method, url).query(query);
        if !form.is_empty() {
            request = request.form(form);
        }
        let response = request.send()?;
        Ok(response)
    }
}

impl SessionClient for LinkyApi {
    fn send(
        &self,
        path: &str,
        query: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<String, LinkyError> {
        if self.state != SessionState::Authenticated {
            return Err(LinkyError::Authentication(
                "session is not authenticated".to_string(),
            ));
        }

        // The portlet endpoint takes its parameters in the query string but
        // only accepts a date range as a POST body.
        let method = if form.is_empty() {
            Method::GET
        } else {
            Method::POST
        };
        let url = format!("{}{}", self.data_base_url, path);

        let response = self.request(method, &url, query, form)?;
        let body = response.text()?;
        Ok(body)
    }
}

/// Extract the leading `key=value` pair of every `Set-Cookie` header.
fn parse_set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| {
            let first = cookie.split(';').next()?;
            let (key, value) = first.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
