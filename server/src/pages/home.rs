use super::make_path;
use templates::{Breadcrumb, InfoRow, Page, Subpage};

pub fn render(base: &str, api_base_url: &str) -> String {
    Page {
        title: "Quota Dashboard - Home".to_string(),
        breadcrumbs: vec![Breadcrumb::current("Quota Dashboard")],
        info_rows: vec![InfoRow::new("Service", api_base_url)],
        subpages: vec![
            Subpage::new(
                "Token Query",
                make_path(base, "/query"),
                "Look up a key's quota and usage history",
            ),
            Subpage::new(
                "GitHub Sync",
                make_path(base, "/sync"),
                "Configure and run the GitHub backup sync",
            ),
        ],
        ..Default::default()
    }
    .render()
}
