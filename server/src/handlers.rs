use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use common::{SyncConfig, SyncStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_sessions::Session;
use views::{GitHubSync, Notice, QueryApi, SyncReport, TokenQuery};

use crate::pages;

const VIEW_ID_KEY: &str = "view_id";
const SYNC_ALREADY_RUNNING: &str = "a sync is already running";

/// Session cookie inactivity expiry; lookups idle this long are evicted too.
pub const SESSION_IDLE_SECS: i64 = 86_400;

struct LookupEntry {
    lookup: TokenQuery,
    last_seen: Instant,
}

/// Per-session lookup controllers, dropped once their session has gone idle.
pub struct LookupRegistry {
    entries: HashMap<String, LookupEntry>,
    idle: Duration,
}

impl LookupRegistry {
    pub fn new(idle: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            idle,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn checkout(&mut self, view_id: &str, now: Instant, api: &Arc<dyn QueryApi>) -> TokenQuery {
        let idle = self.idle;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_seen) < idle);
        if self.entries.len() < before {
            log::debug!("evicted {} idle lookups", before - self.entries.len());
        }
        let entry = self
            .entries
            .entry(view_id.to_string())
            .or_insert_with(|| LookupEntry {
                lookup: TokenQuery::new(api.clone()),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.lookup.clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn QueryApi>,
    pub base_path: String,
    pub api_label: String,
    pub lookups: Arc<Mutex<LookupRegistry>>,
    pub sync: GitHubSync,
}

impl AppState {
    pub fn new(api: Arc<dyn QueryApi>, base_path: String, api_label: String) -> Self {
        Self {
            sync: GitHubSync::new(api.clone()),
            api,
            base_path,
            api_label,
            lookups: Arc::new(Mutex::new(LookupRegistry::new(Duration::from_secs(
                SESSION_IDLE_SECS as u64,
            )))),
        }
    }
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

/// Unparseable page numbers are ignored rather than rejected.
fn requested_page(params: &PageParams) -> Option<u32> {
    params.page.as_deref().and_then(|p| p.trim().parse().ok())
}

#[derive(Deserialize)]
pub struct LookupForm {
    #[serde(default)]
    pub key: String,
}

#[derive(Deserialize)]
pub struct SyncForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub interval: String,
}

impl From<SyncForm> for SyncConfig {
    fn from(form: SyncForm) -> Self {
        SyncConfig {
            token: form.token.trim().to_string(),
            repo: form.repo.trim().to_string(),
            interval: form.interval.trim().to_string(),
        }
    }
}

/// Each browser session gets its own lookup controller, created on first use.
async fn session_lookup(session: &Session, state: &AppState) -> Result<TokenQuery, Response> {
    let view_id = match session.get::<String>(VIEW_ID_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Err(e) = session.insert(VIEW_ID_KEY, &id).await {
                log::error!("failed to store view id in session: {e}");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
            id
        }
        Err(e) => {
            log::error!("failed to read session: {e}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let mut lookups = state.lookups.lock().await;
    Ok(lookups.checkout(&view_id, Instant::now(), &state.api))
}

async fn render_lookup(state: &AppState, lookup: &TokenQuery) -> Response {
    let view = lookup.take_view().await;
    Html(pages::token_query::render(&state.base_path, &view)).into_response()
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(pages::home::render(&state.base_path, &state.api_label))
}

pub async fn token_query(
    session: Session,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Response {
    let lookup = match session_lookup(&session, &state).await {
        Ok(lookup) => lookup,
        Err(response) => return response,
    };

    if let Some(page) = requested_page(&params) {
        let outcome = lookup.load_history(page).await;
        log::debug!("ledger page {page}: {outcome:?}");
    }

    render_lookup(&state, &lookup).await
}

pub async fn submit_lookup(
    session: Session,
    State(state): State<AppState>,
    Form(form): Form<LookupForm>,
) -> Response {
    let lookup = match session_lookup(&session, &state).await {
        Ok(lookup) => lookup,
        Err(response) => return response,
    };

    match lookup.lookup(&form.key).await {
        Ok(outcome) => log::debug!("lookup finished: {outcome:?}"),
        Err(e) => log::info!("lookup failed: {e}"),
    }

    render_lookup(&state, &lookup).await
}

fn render_sync(
    state: &AppState,
    config: &SyncConfig,
    status: Option<SyncStatus>,
    notice: Option<Notice>,
) -> Response {
    Html(pages::github_sync::render(
        &state.base_path,
        config,
        status.as_ref(),
        notice.as_ref(),
        state.sync.is_syncing(),
    ))
    .into_response()
}

pub async fn github_sync(State(state): State<AppState>) -> Response {
    let (config, notice) = match state.sync.load_config().await {
        Ok(config) => (config, None),
        Err(e) => (SyncConfig::default(), Some(Notice::from(&e))),
    };
    let status = state.sync.load_status().await;
    render_sync(&state, &config, status, notice)
}

pub async fn save_sync_config(
    State(state): State<AppState>,
    Form(form): Form<SyncForm>,
) -> Response {
    let config = SyncConfig::from(form);
    let notice = match state.sync.save_config(&config).await {
        Ok(()) => Notice::success(views::github_sync::CONFIG_SAVED),
        Err(e) => Notice::from(&e),
    };
    let status = state.sync.load_status().await;
    render_sync(&state, &config, status, Some(notice))
}

/// Reads the saved configuration first: the trigger is refused locally unless
/// a token and repository are stored, and the page shows them afterwards.
pub async fn run_sync(State(state): State<AppState>) -> Response {
    let config = match state.sync.load_config().await {
        Ok(config) => config,
        Err(e) => {
            let status = state.sync.load_status().await;
            return render_sync(&state, &SyncConfig::default(), status, Some(Notice::from(&e)));
        }
    };
    let (notice, status) = match state.sync.trigger_sync(&config).await {
        Ok(SyncReport::Completed { message, status }) => (Notice::success(message), status),
        Ok(SyncReport::AlreadyRunning) => (
            Notice::warning(SYNC_ALREADY_RUNNING),
            state.sync.load_status().await,
        ),
        Err(e) => (Notice::from(&e), state.sync.load_status().await),
    };
    render_sync(&state, &config, status, Some(notice))
}
