use leptos::either::Either;
use leptos::prelude::*;

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Previous/next links around a "Page X of Y" label.
///
/// Links are rendered as `{path}?page={n}`; unavailable directions are plain
/// text. An empty ledger still reads "Page 1 of 1".
pub fn pagination_nav(path: &str, current: u32, total_pages: u64) -> String {
    let total = total_pages.max(1);
    let path = html_escape(path);
    let prev = if current > 1 {
        format!(r#"<a href="{path}?page={}">Previous</a>"#, current - 1)
    } else {
        r#"<span class="disabled">Previous</span>"#.to_string()
    };
    let next = if u64::from(current) < total_pages {
        format!(r#"<a href="{path}?page={}">Next</a>"#, current + 1)
    } else {
        r#"<span class="disabled">Next</span>"#.to_string()
    };
    format!(
        r#"<nav class="pagination">{prev} <span>Page {current} of {total}</span> {next}</nav>"#
    )
}

/// `width` is expected to be clamped to 0..=100 already; `label` is shown as is.
pub fn progress_bar(width: f64, label: &str) -> String {
    format!(
        r#"<div class="progress"><div class="progress-fill" style="width:{:.1}%"></div></div><span class="progress-label">{}</span>"#,
        width,
        html_escape(label)
    )
}

pub fn page_layout(title: &str, body_html: String) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: monospace; padding: 16px; }}
table {{ width: 100%; border-collapse: collapse; }}
th {{ text-align: left; padding: 6px 8px; border-bottom: 1px solid #ccc; }}
td {{ padding: 6px 8px; border-bottom: 1px solid #eee; vertical-align: top; }}
tr:last-child td {{ border-bottom: none; }}
form {{ display: inline; }}
input[type=text] {{ font-family: monospace; min-width: 320px; padding: 4px; }}
button {{ font-family: monospace; padding: 4px 12px; cursor: pointer; }}
button[disabled] {{ cursor: not-allowed; }}
.notice {{ padding: 8px 12px; margin-bottom: 12px; border: 1px solid; }}
.notice-success {{ border-color: #2e7d32; color: #2e7d32; }}
.notice-warning {{ border-color: #ef6c00; color: #ef6c00; }}
.notice-error {{ border-color: #c62828; color: #c62828; }}
.status-normal {{ color: #2e7d32; }}
.status-disabled {{ color: #616161; }}
.status-expired {{ color: #c62828; }}
.status-exhausted {{ color: #ef6c00; }}
.status-unknown {{ color: #616161; }}
.progress {{ display: inline-block; width: 240px; height: 10px; background: #eee; vertical-align: middle; }}
.progress-fill {{ height: 100%; background: #3f51b5; }}
.progress-label {{ margin-left: 8px; }}
.pagination {{ display: block; margin-top: 8px; }}
.disabled {{ color: #aaa; }}
</style>
</head>
<body>
{body_html}
</body>
</html>"#,
        title = html_escape(title),
        body_html = body_html
    )
}

pub struct Breadcrumb {
    pub label: String,
    pub href: Option<String>,
}

impl Breadcrumb {
    pub fn link(label: impl ToString, href: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            href: Some(href.to_string()),
        }
    }

    pub fn current(label: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            href: None,
        }
    }
}

pub struct NavLink {
    pub label: String,
    pub href: String,
}

impl NavLink {
    pub fn new(label: impl ToString, href: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

pub struct Banner {
    pub class: String,
    pub message: String,
}

impl Banner {
    pub fn new(class: impl ToString, message: impl ToString) -> Self {
        Self {
            class: class.to_string(),
            message: message.to_string(),
        }
    }
}

pub struct InfoRow {
    pub label: String,
    pub value: String,
}

impl InfoRow {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: html_escape(value),
        }
    }

    pub fn raw(label: &str, value: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

pub struct Subpage {
    pub label: String,
    pub href: String,
    pub description: String,
}

impl Subpage {
    pub fn new(label: impl ToString, href: impl ToString, description: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
            description: description.to_string(),
        }
    }
}

pub struct Page<C: IntoView = ()> {
    pub title: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub nav_links: Vec<NavLink>,
    pub banner: Option<Banner>,
    pub info_rows: Vec<InfoRow>,
    pub content: C,
    pub subpages: Vec<Subpage>,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            title: String::new(),
            breadcrumbs: Vec::new(),
            nav_links: Vec::new(),
            banner: None,
            info_rows: Vec::new(),
            content: (),
            subpages: Vec::new(),
        }
    }
}

impl<C: IntoView> Page<C> {
    pub fn render(self) -> String {
        let Page {
            title,
            breadcrumbs,
            nav_links,
            banner,
            info_rows,
            content,
            subpages,
        } = self;

        let body = view! {
            {if !breadcrumbs.is_empty() {
                Either::Left(view! {
                    <h1>
                        {breadcrumbs.into_iter().enumerate().map(|(i, crumb)| {
                            let sep = if i > 0 { " / " } else { "" };
                            match crumb.href {
                                Some(href) => Either::Left(view! {
                                    {sep}<a href={href}>{crumb.label}</a>
                                }),
                                None => Either::Right(view! {
                                    {sep}{crumb.label}
                                }),
                            }
                        }).collect::<Vec<_>>()}
                    </h1>
                })
            } else {
                Either::Right(())
            }}

            {match banner {
                Some(banner) => {
                    let class = format!("notice {}", banner.class);
                    Either::Left(view! {
                        <div class={class}>{banner.message}</div>
                    })
                }
                None => Either::Right(()),
            }}

            {if !nav_links.is_empty() {
                Either::Left(view! {
                    <h2>"Navigation"</h2>
                    <table>
                        {nav_links.into_iter().map(|link| {
                            view! { <tr><td><a href={link.href}>{link.label}</a></td></tr> }
                        }).collect::<Vec<_>>()}
                    </table>
                })
            } else {
                Either::Right(())
            }}

            {if !info_rows.is_empty() {
                Either::Left(view! {
                    <h2>"Info"</h2>
                    <table>
                        {info_rows.into_iter().map(|row| {
                            view! { <tr><td>{row.label}</td><td inner_html={row.value}></td></tr> }
                        }).collect::<Vec<_>>()}
                    </table>
                })
            } else {
                Either::Right(())
            }}

            {content}

            {if !subpages.is_empty() {
                Either::Left(view! {
                    <h2>"Views"</h2>
                    <table>
                        <tr><th>"View"</th><th>"Description"</th></tr>
                        {subpages.into_iter().map(|sp| {
                            view! { <tr><td><a href={sp.href}>{sp.label}</a></td><td>{sp.description}</td></tr> }
                        }).collect::<Vec<_>>()}
                    </table>
                })
            } else {
                Either::Right(())
            }}
        };

        page_layout(&title, body.to_html())
    }
}
