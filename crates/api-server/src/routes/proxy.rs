//! Pass-through of unmatched paths to the repository's jsDelivr CDN URL.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderName, LAST_MODIFIED,
};
use axum::http::Uri;
use axum::response::Response;

use super::AppState;
use crate::error::{AppError, PlainTextError};

const FORWARDED_HEADERS: [HeaderName; 5] =
    [CONTENT_TYPE, CONTENT_LENGTH, CACHE_CONTROL, ETAG, LAST_MODIFIED];

pub async fn cdn_proxy(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, PlainTextError> {
    let Some(cdn) = state.config.cdn.as_ref() else {
        return Err(AppError::NotFound("Not found".into()).into());
    };

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = cdn.target_url(path);
    tracing::debug!(%target, "proxying to cdn");

    let upstream = tokio::time::timeout(state.config.upstream_timeout, state.http.get(&target).send())
        .await
        .map_err(|_| AppError::UpstreamTimeout(format!("cdn request {target}")))?
        .map_err(|e| AppError::Upstream(format!("cdn request {target}: {e}")))?;

    let mut response = Response::builder().status(upstream.status());
    for name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response = response.header(name, value.clone());
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("building proxy response: {e}")).into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AppConfig, CdnConfig};
    use crate::metadata::MemoryMetadataStore;
    use crate::storage::MemoryBlobStore;

    async fn spawn_cdn() -> String {
        let cdn = Router::new()
            .route(
                "/gh/octo/media@main/media/a.png",
                get(|| async {
                    (
                        [
                            (CONTENT_TYPE, "image/png"),
                            (CACHE_CONTROL, "public, max-age=604800"),
                            (ETAG, "\"abc\""),
                            (HeaderName::from_static("x-served-by"), "cache-fra"),
                        ],
                        vec![0x89u8, b'P', b'N', b'G'],
                    )
                }),
            )
            .fallback(|uri: Uri| async move {
                (StatusCode::NOT_FOUND, format!("no such file {uri}")).into_response()
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, cdn).await.unwrap();
        });
        format!("http://{addr}/gh/")
    }

    fn proxy_app(cdn: Option<CdnConfig>) -> Router {
        let config = AppConfig {
            cdn,
            ..AppConfig::default()
        };
        let state = AppState::new(
            config,
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryMetadataStore::new()),
        );
        Router::new().fallback(cdn_proxy).with_state(state)
    }

    async fn configured_app() -> Router {
        let base = spawn_cdn().await;
        proxy_app(Some(CdnConfig::with_base_url(
            "octo".into(),
            "media".into(),
            "main".into(),
            &base,
        )))
    }

    async fn get_path(app: Router, path: &str) -> Response {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn without_cdn_config_is_not_found() {
        let resp = get_path(proxy_app(None), "/media/x.png").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn streams_body_and_content_headers() {
        let resp = get_path(configured_app().await, "/media/a.png").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=604800");
        assert_eq!(headers[ETAG], "\"abc\"");
        assert_eq!(headers[CONTENT_LENGTH], "4");
        assert!(headers.get("x-served-by").is_none());

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn upstream_error_status_is_preserved() {
        let resp = get_path(configured_app().await, "/media/missing.png?v=2").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&body),
            "no such file /gh/octo/media@main/media/missing.png?v=2"
        );
    }

    #[tokio::test]
    async fn unreachable_cdn_is_bad_gateway() {
        let cdn = CdnConfig::with_base_url(
            "octo".into(),
            "media".into(),
            "main".into(),
            "http://127.0.0.1:1/gh",
        );
        let resp = get_path(proxy_app(Some(cdn)), "/media/a.png").await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
