use axum::{extract::State, response::Html};
use std::sync::Arc;

use crate::app::AppState;

static INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /: the scheduling page, with the station title filled in.
pub async fn ui_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(INDEX_HTML.replace("{{title}}", &escape_html(&state.config.station.title)))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
