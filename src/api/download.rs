/// Artifact download endpoint
use crate::{
    auth::DownloadSecret,
    context::AppContext,
    downloads::UNKNOWN_CLIENT,
    error::{GateError, GateResult},
};
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, FromRequest, RawQuery, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use futures::{future, stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio_util::io::ReaderStream;

/// Name the artifact is offered under, whatever the file on disk is called
pub const DOWNLOAD_FILENAME: &str = "data.zip";

/// MIME type the artifact is always served with
pub const DOWNLOAD_CONTENT_TYPE: &str = "application/zip";

/// Build download routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/download", post(download_artifact))
}

/// Field naming the caller's machine in the query, a form or a JSON body
pub const COMP_ID_FIELD: &str = "compId";

/// `compId` as it may appear in a JSON body
#[derive(Debug, Default, Deserialize)]
pub struct CompIdParams {
    #[serde(rename = "compId")]
    pub comp_id: Option<String>,
}

/// First value of `field` in an urlencoded string; repeats are ignored
pub fn first_form_value(encoded: &[u8], field: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == field)
        .map(|(_, value)| value.into_owned())
}

/// Stream the artifact to a caller holding the download secret
///
/// The attempt is recorded before streaming starts; the record is flagged
/// as delivered only after the last chunk was handed over.
async fn download_artifact(
    State(ctx): State<AppContext>,
    _secret: DownloadSecret,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    RawQuery(query): RawQuery,
    request: Request,
) -> GateResult<Response> {
    let from_query = query.and_then(|q| first_form_value(q.as_bytes(), COMP_ID_FIELD));

    let computer_id = match non_empty(from_query) {
        Some(id) => id,
        None => comp_id_from_body(request)
            .await
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
    };

    let data_file = &ctx.config.storage.data_file;
    let file = match tokio::fs::File::open(data_file).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %data_file.display(), "artifact missing");
            return Err(GateError::NotFound("File not found on server".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    let ip = addr.ip().to_string();
    let record_id = ctx.downloads.record(&computer_id, Some(&ip)).await?;

    tracing::info!(computer_id = %computer_id, %ip, record_id, "download started");

    let downloads = ctx.downloads.clone();
    let completion = stream::once(async move {
        match downloads.mark_delivered(record_id).await {
            Ok(()) => tracing::info!(record_id, "download delivered"),
            Err(e) => tracing::warn!(record_id, error = %e, "failed to mark download delivered"),
        }
        None::<Result<Bytes, std::io::Error>>
    })
    .filter_map(future::ready);

    let body = ReaderStream::new(file)
        .inspect_err(move |e| {
            tracing::warn!(record_id, error = %e, "download interrupted");
        })
        .chain(completion);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, DOWNLOAD_CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
        )
        .header(header::CONTENT_LENGTH, length)
        .body(Body::from_stream(body))
        .map_err(|e| GateError::Internal(format!("Response build failed: {}", e)))
}

/// Look for `compId` in a form or JSON body; malformed bodies are ignored
async fn comp_id_from_body(request: Request) -> Option<String> {
    let content_type = content_type(request.headers());

    let comp_id = if content_type.starts_with("application/x-www-form-urlencoded") {
        Bytes::from_request(request, &())
            .await
            .ok()
            .and_then(|body| first_form_value(&body, COMP_ID_FIELD))
    } else if content_type.starts_with("application/json") {
        Json::<CompIdParams>::from_request(request, &())
            .await
            .ok()
            .and_then(|Json(params)| params.comp_id)
    } else {
        None
    };

    non_empty(comp_id)
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_type: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/download")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_comp_id_from_form() {
        let req = request("application/x-www-form-urlencoded", "compId=PC-7&other=1");
        assert_eq!(comp_id_from_body(req).await.as_deref(), Some("PC-7"));
    }

    #[tokio::test]
    async fn test_comp_id_from_form_keeps_first_repeat() {
        let req = request("application/x-www-form-urlencoded", "compId=PC-A&compId=PC-B");
        assert_eq!(comp_id_from_body(req).await.as_deref(), Some("PC-A"));
    }

    #[test]
    fn test_first_form_value() {
        assert_eq!(
            first_form_value(b"compId=a&compId=b", COMP_ID_FIELD).as_deref(),
            Some("a")
        );
        assert_eq!(
            first_form_value(b"key=x&compId=PC%201+x", COMP_ID_FIELD).as_deref(),
            Some("PC 1 x")
        );
        assert_eq!(first_form_value(b"compId", COMP_ID_FIELD).as_deref(), Some(""));
        assert_eq!(first_form_value(b"other=1", COMP_ID_FIELD), None);
        assert_eq!(first_form_value(b"", COMP_ID_FIELD), None);
    }

    #[tokio::test]
    async fn test_comp_id_from_json() {
        let req = request("application/json; charset=utf-8", r#"{"compId":"PC-8"}"#);
        assert_eq!(comp_id_from_body(req).await.as_deref(), Some("PC-8"));
    }

    #[tokio::test]
    async fn test_comp_id_ignores_bad_or_empty_bodies() {
        let req = request("application/json", "{not json");
        assert_eq!(comp_id_from_body(req).await, None);

        let req = request("application/json", r#"{"compId":""}"#);
        assert_eq!(comp_id_from_body(req).await, None);

        let req = request("text/plain", "compId=PC-9");
        assert_eq!(comp_id_from_body(req).await, None);
    }
}
