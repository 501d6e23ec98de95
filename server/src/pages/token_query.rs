use super::{banner, make_path};
use leptos::either::Either;
use leptos::prelude::*;
use templates::{html_escape, pagination_nav, progress_bar, Breadcrumb, InfoRow, NavLink, Page};
use views::TokenQueryView;

fn query_form(action: &str, key: &str, busy: bool) -> String {
    format!(
        r#"<form method="post" action="{}"><input type="text" name="key" value="{}" placeholder="sk-..." autocomplete="off"> <button type="submit"{}>Query</button></form>"#,
        html_escape(action),
        html_escape(key),
        if busy { " disabled" } else { "" }
    )
}

pub fn render(base: &str, view: &TokenQueryView) -> String {
    let self_path = make_path(base, "/query");
    let mut info_rows = vec![InfoRow::raw(
        "Key",
        query_form(&self_path, &view.key, view.busy),
    )];

    let display = view.display();
    if let Some(display) = &display {
        info_rows.push(InfoRow::raw(
            "Status",
            format!(
                r#"<span class="{}">{}</span>"#,
                display.status.css_class(),
                display.status.label()
            ),
        ));
        info_rows.push(InfoRow::new("Total Quota", &display.total));
        info_rows.push(InfoRow::new("Used Quota", &display.used));
        info_rows.push(InfoRow::new("Remaining Quota", &display.remain));
        info_rows.push(InfoRow::new("Expires", &display.expires));
        match &display.gauge {
            Some(gauge) => info_rows.push(InfoRow::raw(
                "Usage",
                progress_bar(gauge.width, &gauge.text()),
            )),
            None => info_rows.push(InfoRow::new("Usage", "-")),
        }
    }

    let content = if display.is_some() {
        let rows = view.rows();
        let pagination_html = pagination_nav(
            &self_path,
            view.page.current_page,
            view.page.total_pages(),
        );
        let total = view.page.total_records.to_string();
        Either::Left(view! {
            <h2>"Usage History"</h2>
            <p>{total}" records"</p>
            {if rows.is_empty() {
                Either::Left(view! {
                    <p>"No usage records."</p>
                })
            } else {
                Either::Right(view! {
                    <table>
                        <tr>
                            <th>"Time"</th>
                            <th>"Model"</th>
                            <th>"Prompt Tokens"</th>
                            <th>"Completion Tokens"</th>
                            <th>"Cost"</th>
                        </tr>
                        {rows.into_iter().map(|r| {
                            let prompt = r.prompt_tokens.to_string();
                            let completion = r.completion_tokens.to_string();
                            view! {
                                <tr>
                                    <td>{r.time}</td>
                                    <td>{r.model}</td>
                                    <td>{prompt}</td>
                                    <td>{completion}</td>
                                    <td>{r.cost}</td>
                                </tr>
                            }
                        }).collect::<Vec<_>>()}
                    </table>
                })
            }}
            <div inner_html={pagination_html}></div>
        })
    } else {
        Either::Right(())
    };

    Page {
        title: "Quota Dashboard - Token Query".to_string(),
        breadcrumbs: vec![
            Breadcrumb::link("Quota Dashboard", make_path(base, "")),
            Breadcrumb::current("Token Query"),
        ],
        nav_links: vec![NavLink::new("GitHub Sync", make_path(base, "/sync"))],
        banner: banner(view.notice.as_ref()),
        info_rows,
        content,
        subpages: vec![],
    }
    .render()
}
