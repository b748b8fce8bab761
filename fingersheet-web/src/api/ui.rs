//! Upload form page and its script

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::flash::{clear_flash_cookie, take_flash};
use crate::AppState;

const INDEX_HTML: &str = include_str!("../../templates/index.html");
const MAIN_JS: &str = include_str!("../../static/main.js");

/// Minimal HTML escaping for text nodes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Index page with `messages` rendered as a flash list
pub fn render_index(messages: &[String]) -> String {
    let flashes = if messages.is_empty() {
        String::new()
    } else {
        let items: String = messages
            .iter()
            .map(|m| format!("      <li>{}</li>\n", escape_html(m)))
            .collect();
        format!("<ul class=\"flashes\">\n{}    </ul>", items)
    };
    INDEX_HTML.replace("{{FLASH_MESSAGES}}", &flashes)
}

/// GET /
///
/// Shows and then clears pending flash messages.
pub async fn serve_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let messages = take_flash(&headers, &state.config.secret_key);
    let page = Html(render_index(&messages));

    if messages.is_empty() {
        page.into_response()
    } else {
        ([(SET_COOKIE, clear_flash_cookie())], page).into_response()
    }
}

/// GET /static/main.js
pub async fn serve_main_js() -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/javascript")],
        MAIN_JS,
    )
        .into_response()
}

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/main.js", get(serve_main_js))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_index_escapes_messages() {
        let page = render_index(&["<script>x</script> & more".to_string()]);
        assert!(page.contains("<li>&lt;script&gt;x&lt;/script&gt; &amp; more</li>"));
        assert!(!page.contains("{{FLASH_MESSAGES}}"));
    }

    #[test]
    fn test_render_index_without_messages() {
        let page = render_index(&[]);
        assert!(!page.contains("class=\"flashes\""));
        assert!(page.contains("name=\"skill_level\""));
    }
}
