pub mod github_sync;
pub mod home;
pub mod token_query;

use templates::Banner;
use views::Notice;

pub fn make_path(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return base.to_string();
    }
    let base = base.trim_end_matches('/');
    format!("{}{}", base, suffix)
}

pub fn banner(notice: Option<&Notice>) -> Option<Banner> {
    notice.map(|n| Banner::new(n.level.css_class(), &n.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_path_root_base() {
        assert_eq!(make_path("/", ""), "/");
        assert_eq!(make_path("/", "/query"), "/query");
        assert_eq!(make_path("/", "/sync/run"), "/sync/run");
    }

    #[test]
    fn make_path_nested_base() {
        assert_eq!(make_path("/_dashboard", ""), "/_dashboard");
        assert_eq!(make_path("/_dashboard", "/query"), "/_dashboard/query");
        assert_eq!(
            make_path("/_dashboard", "/sync/run"),
            "/_dashboard/sync/run"
        );
    }

    #[test]
    fn banner_follows_notice_level() {
        assert!(banner(None).is_none());
        let b = banner(Some(&Notice::warning("key required"))).unwrap();
        assert_eq!(b.class, "notice-warning");
        assert_eq!(b.message, "key required");
    }

    #[test]
    fn make_path_trailing_slash_base() {
        assert_eq!(make_path("/_dashboard/", "/query"), "/_dashboard/query");
    }
}
