use salvo::http::HeaderValue;
use salvo::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use salvo::prelude::*;
use salvo::writing::Scribe;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::media::{MediaError, MediaKind};
use crate::web::metrics::Metrics;
use crate::web::{ApiError, web_state};

const FILE_CACHE_CONTROL: &str = "public, max-age=31536000";

fn rejected_upload(err: MediaError) -> ApiError {
    if !matches!(err, MediaError::Io(_)) {
        Metrics::upload_rejected();
        warn!("upload rejected: {}", err);
    }
    err.into()
}

fn media_key(req: &Request) -> Result<String, ApiError> {
    req.param::<String>("path")
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::bad_request("File path required"))
}

#[handler]
pub async fn upload(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let (file_name, content_type, temp_path, size) = match req.file("file").await {
        Some(file) => (
            file.name().map(str::to_string),
            file.content_type()
                .map(|mime| mime.to_string())
                .unwrap_or_default(),
            file.path().clone(),
            file.size(),
        ),
        None => return Err(ApiError::bad_request("No file provided")),
    };
    let kind = req
        .form::<String>("type")
        .await
        .unwrap_or_default()
        .parse::<MediaKind>()
        .map_err(rejected_upload)?;
    let state = web_state(depot)?;

    state
        .media
        .check_upload(kind, &content_type, size)
        .map_err(rejected_upload)?;
    let data = tokio::fs::read(&temp_path)
        .await
        .map_err(|e| ApiError::internal("Upload failed", e))?;
    let uploaded = state
        .media
        .upload(kind, file_name.as_deref(), &content_type, data)
        .await
        .map_err(rejected_upload)?;

    Metrics::upload_stored();
    info!("stored {} upload at {} ({} bytes)", kind, uploaded.key, size);

    Ok(Json(json!({
        "success": true,
        "url": uploaded.url,
        "filename": uploaded.key,
    })))
}

async fn write_file(req: &Request, depot: &Depot, res: &mut Response) -> Result<(), ApiError> {
    let key = media_key(req)?;
    let state = web_state(depot)?;

    let object = match state.media.get(&key).await {
        Ok(Some(object)) => object,
        Ok(None) | Err(MediaError::InvalidKey(_)) => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(err) => return Err(err.into()),
    };

    let headers = res.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(object.content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(FILE_CACHE_CONTROL));
    if let Ok(etag) = HeaderValue::from_str(&object.etag) {
        headers.insert(ETAG, etag);
    }

    let not_modified = req
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == object.etag);
    if not_modified {
        res.status_code(StatusCode::NOT_MODIFIED);
    } else {
        res.body(object.data);
    }
    Ok(())
}

#[handler]
pub async fn serve_file(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    if let Err(err) = write_file(req, depot, res).await {
        err.render(res);
    }
}

#[handler]
pub async fn delete_file(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let key = media_key(req)?;
    let state = web_state(depot)?;

    if !state.media.delete(&key).await? {
        return Err(ApiError::not_found("File not found"));
    }
    info!("deleted media {}", key);

    Ok(Json(json!({ "success": true })))
}
