use super::{banner, make_path};
use common::{repo_slug, SyncConfig, SyncStatus};
use leptos::either::Either;
use leptos::prelude::*;
use templates::{Breadcrumb, InfoRow, NavLink, Page};
use views::Notice;

pub const NEVER_SYNCED: &str = "never synced";

fn status_rows(config: &SyncConfig, status: Option<&SyncStatus>) -> Vec<InfoRow> {
    let mut rows = Vec::new();
    match status {
        Some(status) => {
            rows.push(InfoRow::new(
                "Sync",
                if status.enabled { "enabled" } else { "not enabled" },
            ));
            rows.push(InfoRow::new(
                "Last Sync",
                status.last_sync().unwrap_or(NEVER_SYNCED),
            ));
            if status.enabled {
                rows.push(InfoRow::new(
                    "Interval",
                    &format!("{} seconds", config.interval),
                ));
            }
        }
        None => rows.push(InfoRow::new("Sync", "status unavailable")),
    }
    let repo = if config.repo.trim().is_empty() {
        "-".to_string()
    } else {
        repo_slug(&config.repo).unwrap_or_else(|| "invalid repository".to_string())
    };
    rows.push(InfoRow::new("Repository", &repo));
    rows
}

pub fn render(
    base: &str,
    config: &SyncConfig,
    status: Option<&SyncStatus>,
    notice: Option<&Notice>,
    syncing: bool,
) -> String {
    let config_path = make_path(base, "/sync/config");
    let run_path = make_path(base, "/sync/run");
    let can_run = config.is_complete() && !syncing;
    let token = config.token.clone();
    let repo = config.repo.clone();
    let interval = config.interval.clone();
    let run_label = if syncing { "Syncing..." } else { "Sync Now" };

    let content = view! {
        <h2>"Configuration"</h2>
        <form method="post" action={config_path}>
            <table>
                <tr>
                    <td>"GitHub Token"</td>
                    <td><input type="password" name="token" value={token} autocomplete="off"/></td>
                </tr>
                <tr>
                    <td>"Repository"</td>
                    <td><input type="text" name="repo" value={repo} placeholder="owner/repo"/></td>
                </tr>
                <tr>
                    <td>"Interval (seconds)"</td>
                    <td><input type="text" name="interval" value={interval}/></td>
                </tr>
            </table>
            <button type="submit">"Save"</button>
        </form>
        <h2>"Manual Sync"</h2>
        <form method="post" action={run_path}>
            <button type="submit" disabled={!can_run}>{run_label}</button>
        </form>
        {if config.is_complete() {
            Either::Left(())
        } else {
            Either::Right(view! {
                <p>"Set the GitHub token and repository to enable manual sync."</p>
            })
        }}
    };

    Page {
        title: "Quota Dashboard - GitHub Sync".to_string(),
        breadcrumbs: vec![
            Breadcrumb::link("Quota Dashboard", make_path(base, "")),
            Breadcrumb::current("GitHub Sync"),
        ],
        nav_links: vec![NavLink::new("Token Query", make_path(base, "/query"))],
        banner: banner(notice),
        info_rows: status_rows(config, status),
        content,
        subpages: vec![],
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SyncConfig {
        SyncConfig {
            token: "ghp_x".to_string(),
            repo: "https://github.com/acme/backup".to_string(),
            interval: "600".to_string(),
        }
    }

    #[test]
    fn render_unconfigured_disables_trigger() {
        let status = SyncStatus::default();
        let html = render("/", &SyncConfig::default(), Some(&status), None, false);
        assert!(html.contains("<title>Quota Dashboard - GitHub Sync</title>"));
        assert!(html.contains("not enabled"));
        assert!(html.contains(NEVER_SYNCED));
        assert!(html.contains(r#"value="300""#));
        assert!(html.contains(r#"<button type="submit" disabled>"#));
        assert!(html.contains("to enable manual sync"));
        assert!(!html.contains("seconds</td>"));
    }

    #[test]
    fn render_enabled_status() {
        let status = SyncStatus {
            enabled: true,
            last_sync_time: Some("2024-05-01 10:00:00".to_string()),
        };
        let html = render("/", &configured(), Some(&status), None, false);
        assert!(html.contains(">enabled<"));
        assert!(html.contains("2024-05-01 10:00:00"));
        assert!(html.contains("600 seconds"));
        assert!(html.contains("acme/backup"));
        assert!(!html.contains("to enable manual sync"));
        assert!(html.contains("Sync Now"));
        assert!(!html.contains(r#"<button type="submit" disabled>"#));
    }

    #[test]
    fn render_while_syncing() {
        let html = render("/", &configured(), None, None, true);
        assert!(html.contains("Syncing..."));
        assert!(html.contains("status unavailable"));
    }

    #[test]
    fn render_invalid_repository() {
        let config = SyncConfig {
            repo: "not a repo/at/all".to_string(),
            ..configured()
        };
        let html = render("/", &config, None, None, false);
        assert!(html.contains("invalid repository"));
    }

    #[test]
    fn render_notice_and_form_paths() {
        let notice = Notice::success("configuration saved, restart the service to apply");
        let html = render("/_dashboard", &configured(), None, Some(&notice), false);
        assert!(html.contains(r#"class="notice notice-success""#));
        assert!(html.contains("restart the service to apply"));
        assert!(html.contains(r#"action="/_dashboard/sync/config""#));
        assert!(html.contains(r#"action="/_dashboard/sync/run""#));
    }
}
