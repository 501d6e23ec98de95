use common::{repo_slug, SyncConfig, SyncStatus};
use myerrors::QueryError;
use views::TokenQueryView;

const MASK: &str = "****";

pub fn failure_line(err: &QueryError) -> String {
    if err.is_blocking() {
        format!("warning: {}", err.message())
    } else {
        format!("error: {}", err.message())
    }
}

/// Keeps the first four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}{MASK}")
}

pub fn summary(view: &TokenQueryView) -> String {
    let Some(display) = view.display() else {
        return String::new();
    };
    let usage = match &display.gauge {
        Some(gauge) => gauge.text(),
        None => "-".to_string(),
    };
    [
        format!("key:       {}", mask_secret(&view.key)),
        format!("status:    {}", display.status.label()),
        format!("total:     {}", display.total),
        format!("used:      {}", display.used),
        format!("remaining: {}", display.remain),
        format!("expires:   {}", display.expires),
        format!("usage:     {usage}"),
    ]
    .join("\n")
}

pub fn ledger(view: &TokenQueryView) -> String {
    let mut lines = vec![format!(
        "usage history: page {} of {} ({} records)",
        view.page.current_page,
        view.page.total_pages().max(1),
        view.page.total_records
    )];
    let rows = view.rows();
    if rows.is_empty() {
        lines.push("no usage records".to_string());
    }
    for r in rows {
        lines.push(format!(
            "{}  {:<24} {:>8} {:>8} {:>10}",
            r.time, r.model, r.prompt_tokens, r.completion_tokens, r.cost
        ));
    }
    lines.join("\n")
}

pub fn sync_config(config: &SyncConfig) -> String {
    let repo = repo_slug(&config.repo).unwrap_or_else(|| config.repo.clone());
    [
        format!("token:    {}", mask_secret(&config.token)),
        format!("repo:     {repo}"),
        format!("interval: {} seconds", config.interval),
    ]
    .join("\n")
}

pub fn sync_status(status: Option<&SyncStatus>) -> String {
    match status {
        Some(status) => format!(
            "sync:      {}\nlast sync: {}",
            if status.enabled { "enabled" } else { "not enabled" },
            status.last_sync().unwrap_or("never synced")
        ),
        None => "sync:      status unavailable".to_string(),
    }
}
