use common::{
    SyncConfig, SyncStatus, DEFAULT_SYNC_INTERVAL, OPTION_SYNC_INTERVAL, OPTION_SYNC_REPO,
    OPTION_SYNC_TOKEN,
};
use myerrors::QueryError;
use remote::OptionMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::service::QueryApi;
use crate::settle;

pub const CONFIG_REQUIRED: &str = "GitHub token and repository are required";
pub const CONFIG_LOAD_FAILED: &str = "failed to load configuration";
pub const CONFIG_SAVED: &str = "configuration saved, restart the service to apply";
pub const SYNC_SUCCEEDED: &str = "sync succeeded";
pub const SYNC_NETWORK_FAILURE: &str = "sync failed, please check your network connection";
const SAVE_NETWORK_FAILURE: &str =
    "failed to save configuration, please check your network connection";

#[derive(Debug, Clone, PartialEq)]
pub enum SyncReport {
    Completed {
        message: String,
        status: Option<SyncStatus>,
    },
    AlreadyRunning,
}

/// Holds the single-flight flag; dropping it, including when the trigger
/// future is cancelled, lets the next sync through.
struct SyncingFlag(Arc<AtomicBool>);

impl Drop for SyncingFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Settings, status and manual trigger for the GitHub backup sync.
#[derive(Clone)]
pub struct GitHubSync {
    api: Arc<dyn QueryApi>,
    syncing: Arc<AtomicBool>,
}

fn config_from_options(options: &OptionMap) -> SyncConfig {
    let get = |key: &str| options.get(key).cloned().unwrap_or_default();
    let interval = get(OPTION_SYNC_INTERVAL);
    SyncConfig {
        token: get(OPTION_SYNC_TOKEN),
        repo: get(OPTION_SYNC_REPO),
        interval: if interval.trim().is_empty() {
            DEFAULT_SYNC_INTERVAL.to_string()
        } else {
            interval
        },
    }
}

impl GitHubSync {
    pub fn new(api: Arc<dyn QueryApi>) -> Self {
        Self {
            api,
            syncing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn load_config(&self) -> Result<SyncConfig, QueryError> {
        let options = settle(
            self.api.options().await,
            CONFIG_LOAD_FAILED,
            CONFIG_LOAD_FAILED,
        )?;
        Ok(config_from_options(&options.unwrap_or_default()))
    }

    /// Writes each field with its own request, in order, stopping at the
    /// first failure. Fields written before the failure stay written.
    pub async fn save_config(&self, config: &SyncConfig) -> Result<(), QueryError> {
        if config.token.trim().is_empty() || config.repo.trim().is_empty() {
            return Err(QueryError::validation(CONFIG_REQUIRED));
        }
        let config = SyncConfig {
            interval: if config.interval.trim().is_empty() {
                DEFAULT_SYNC_INTERVAL.to_string()
            } else {
                config.interval.trim().to_string()
            },
            ..config.clone()
        };

        let mut written = Vec::new();
        for (key, value) in config.updates() {
            let result = self.api.update_option(key, value).await;
            if let Err(err) = settle(result, "update rejected", SAVE_NETWORK_FAILURE) {
                log::warn!("saving {key} failed after writing {written:?}: {err}");
                return Err(match err {
                    QueryError::Logical(message) => {
                        QueryError::logical(format!("failed to save configuration: {message}"))
                    }
                    other => other,
                });
            }
            written.push(key);
        }
        log::info!("saved GitHub sync options {written:?}");
        Ok(())
    }

    /// Best effort: any failure reads as "status unknown".
    pub async fn load_status(&self) -> Option<SyncStatus> {
        match self.api.sync_status().await {
            Ok(envelope) if envelope.success => envelope.data,
            Ok(envelope) => {
                log::warn!("sync status rejected: {}", envelope.message_or("no message"));
                None
            }
            Err(err) => {
                log::warn!("sync status unavailable: {err}");
                None
            }
        }
    }

    pub async fn trigger_sync(&self, config: &SyncConfig) -> Result<SyncReport, QueryError> {
        if !config.is_complete() {
            return Err(QueryError::validation(CONFIG_REQUIRED));
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Ok(SyncReport::AlreadyRunning);
        }
        let flag = SyncingFlag(self.syncing.clone());
        let result = self.api.trigger_sync().await;
        drop(flag);

        let envelope = result.map_err(|err| {
            log::warn!("sync request failed: {err}");
            QueryError::transport(SYNC_NETWORK_FAILURE)
        })?;
        if !envelope.success {
            return Err(QueryError::logical(format!(
                "sync failed: {}",
                envelope.message_or("unknown error")
            )));
        }
        let message = envelope.message_or(SYNC_SUCCEEDED).to_string();
        let status = self.load_status().await;
        Ok(SyncReport::Completed { message, status })
    }
}
