use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};

use super::AppState;
use crate::error::PlainTextError;
use crate::relay;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/file/:id", get(fetch_file))
        .route("/api/file/:id", get(fetch_file))
}

async fn fetch_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PlainTextError> {
    let file = relay::download(&state, &id).await?;

    let content_type = HeaderValue::from_str(&file.info.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let headers = [
        (CONTENT_TYPE, content_type),
        (CONTENT_DISPOSITION, content_disposition(&file.info.name)),
    ];
    Ok((headers, file.data).into_response())
}

/// `inline` disposition carrying the original filename.
///
/// The quoted `filename` is an ASCII rendering with quotes and backslashes
/// escaped; names with other characters also get an RFC 5987 `filename*`.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '_' })
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect();

    let mut value = format!("inline; filename=\"{fallback}\"");
    if !name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.push_str(&percent_encode(name));
    }

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
