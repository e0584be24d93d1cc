//! Web server: the playlist form, Spotify login and the curation API.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::MoodlistError;
use crate::input::{PlaylistRequest, RequestInput, DEFAULT_SONGS};
use crate::orchestrator::{CurationReport, Curator};
use crate::spotify::{SpotifyClient, SpotifyOAuth};
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

const SESSION_COOKIE: &str = "moodlist_session";
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// A logged-in Spotify user.
#[derive(Debug, Clone)]
struct SpotifySession {
    access_token: String,
    user_id: String,
    display_name: String,
    last_seen: Instant,
}

/// Shared application state.
struct AppState {
    curator: Curator,
    oauth: SpotifyOAuth,
    sessions: RwLock<HashMap<String, SpotifySession>>,
    /// OAuth `state` values handed out by `/login`, with when they were issued.
    pending_states: RwLock<HashMap<String, Instant>>,
    login_state_ttl: Duration,
    session_idle: Duration,
}

impl AppState {
    fn new(curator: Curator, oauth: SpotifyOAuth) -> Self {
        let server = &curator.settings().server;
        let login_state_ttl = server.login_state_ttl();
        let session_idle = server.session_idle();
        Self {
            curator,
            oauth,
            sessions: RwLock::new(HashMap::new()),
            pending_states: RwLock::new(HashMap::new()),
            login_state_ttl,
            session_idle,
        }
    }

    /// Record a new OAuth state, dropping the ones nobody came back for.
    async fn issue_login_state(&self, csrf: String) {
        let mut pending = self.pending_states.write().await;
        pending.retain(|_, issued| issued.elapsed() < self.login_state_ttl);
        pending.insert(csrf, Instant::now());
    }

    /// Consume an OAuth state. Unknown, reused and expired states are rejected.
    async fn redeem_login_state(&self, csrf: &str) -> bool {
        match self.pending_states.write().await.remove(csrf) {
            Some(issued) => issued.elapsed() < self.login_state_ttl,
            None => false,
        }
    }

    /// Store a session, dropping idle ones.
    async fn start_session(&self, id: String, session: SpotifySession) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.last_seen.elapsed() < self.session_idle);
        sessions.insert(id, session);
    }

    /// Look up the caller's session and mark it as used. Idle sessions are dropped.
    async fn session(&self, headers: &HeaderMap) -> Option<(String, SpotifySession)> {
        let id = session_id(headers)?;
        let mut sessions = self.sessions.write().await;
        if sessions.get(&id)?.last_seen.elapsed() >= self.session_idle {
            sessions.remove(&id);
            return None;
        }
        let session = sessions.get_mut(&id)?;
        session.last_seen = Instant::now();
        Some((id, session.clone()))
    }
}

/// Run the web server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'moodlist doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let oauth = SpotifyOAuth::from_settings(&settings.spotify)?;
    let redirect_uri = settings.spotify.redirect_uri.clone();
    let curator = Curator::new(settings)?;
    let app = router(Arc::new(AppState::new(curator, oauth)));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("moodlist");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("OAuth callback", &redirect_uri);
    println!();
    println!("Endpoints:");
    Output::kv("Form", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Login", "GET  /login");
    Output::kv("Current user", "GET  /api/me");
    Output::kv("Curate", "POST /api/playlists");
    Output::kv("Logout", "POST /logout");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.curator.settings().server.max_upload_bytes();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/playlists", post(create_playlist))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum InputType {
    Text,
    Image,
}

#[derive(Debug, Deserialize)]
struct PlaylistForm {
    input_type: InputType,
    #[serde(default)]
    description: Option<String>,
    /// Data URL produced by the browser's FileReader.
    #[serde(default)]
    image: Option<String>,
    #[serde(default = "default_song_count")]
    song_count: u8,
}

fn default_song_count() -> u8 {
    DEFAULT_SONGS
}

impl PlaylistForm {
    fn into_request(self) -> crate::Result<PlaylistRequest> {
        let input = match self.input_type {
            InputType::Text => RequestInput::Text(self.description.unwrap_or_default()),
            InputType::Image => match self.image {
                Some(image) => RequestInput::Image(image),
                None => {
                    return Err(MoodlistError::InvalidInput(
                        "Please upload an image before creating a playlist".to_string(),
                    ))
                }
            },
        };
        PlaylistRequest::new(input, self.song_count)
    }
}

#[derive(Serialize)]
struct MeResponse {
    id: String,
    display_name: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_url: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            login_url: None,
        }),
    )
        .into_response()
}

fn login_required(error: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            login_url: Some("/login".to_string()),
        }),
    )
        .into_response()
}

// === Cookies ===

/// Extract the session id from the request's Cookie headers.
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

fn expired_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

// === Handlers ===

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn login(State(state): State<Arc<AppState>>) -> Response {
    let csrf = Uuid::new_v4().to_string();
    match state.oauth.authorize_url(&csrf) {
        Ok(url) => {
            state.issue_login_state(csrf).await;
            Redirect::to(&url).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!("Spotify authorization denied: {}", error);
        return error_response(StatusCode::BAD_REQUEST, format!("Spotify login failed: {}", error));
    }

    let known_state = match &params.state {
        Some(csrf) => state.redeem_login_state(csrf).await,
        None => false,
    };
    if !known_state {
        return error_response(StatusCode::BAD_REQUEST, "Unknown, reused or expired login state");
    }

    let Some(code) = params.code else {
        return error_response(StatusCode::BAD_REQUEST, "Missing authorization code");
    };

    let token = match state.oauth.exchange_code(&code).await {
        Ok(token) => token,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };

    let user = match SpotifyClient::new(&token.access_token, &state.curator.settings().spotify) {
        Ok(client) => client.current_user().await,
        Err(e) => Err(e),
    };
    let user = match user {
        Ok(user) => user,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };

    let session_id = Uuid::new_v4().to_string();
    info!("Logged in Spotify user {}", user.id);
    state
        .start_session(
            session_id.clone(),
            SpotifySession {
                access_token: token.access_token,
                user_id: user.id.clone(),
                display_name: user.greeting_name().to_string(),
                last_seen: Instant::now(),
            },
        )
        .await;

    (
        [(header::SET_COOKIE, session_cookie(&session_id))],
        Redirect::to("/"),
    )
        .into_response()
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.write().await.remove(&id);
    }
    (
        [(header::SET_COOKIE, expired_cookie())],
        Json(serde_json::json!({ "status": "logged_out" })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.session(&headers).await {
        Some((_, session)) => Json(MeResponse {
            id: session.user_id,
            display_name: session.display_name,
        })
        .into_response(),
        None => login_required("Not logged in"),
    }
}

async fn create_playlist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<PlaylistForm>,
) -> Response {
    let Some((session_id, session)) = state.session(&headers).await else {
        return login_required("Not logged in");
    };

    let request = match form.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match curate(&state, &request, &session.access_token).await {
        Ok(report) => Json(report).into_response(),
        Err(e) if e.is_expired_session() => {
            state.sessions.write().await.remove(&session_id);
            info!("Session for {} expired", session.user_id);
            (
                [(header::SET_COOKIE, expired_cookie())],
                login_required("Session expired. Please log in again."),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Check the token still works, then curate from that user's library.
///
/// Tool failures are fed back to the model, so an expired token has to be
/// caught before the agent starts.
async fn curate(
    state: &AppState,
    request: &PlaylistRequest,
    access_token: &str,
) -> crate::Result<CurationReport> {
    let library = SpotifyClient::new(access_token, &state.curator.settings().spotify)?;
    library.current_user().await?;
    state.curator.curate(request, Arc::new(library)).await
}
