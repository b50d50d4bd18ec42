use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

/// Puts every `/api` JSON answer into `{"success": .., "data"|"error": ..}`.
/// Media bytes and generated documents pass through untouched.
pub async fn wrap_response_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let res = next.run(req).await;

    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !path.starts_with("/api")
        || path.starts_with("/api/media/")
        || res.headers().contains_key(header::CONTENT_DISPOSITION)
        || content_type.starts_with("image/")
        || content_type.contains("application/pdf")
        || content_type.contains("application/octet-stream")
    {
        return Ok(res);
    }

    let status = res.status();
    let is_json = content_type.contains("application/json");

    let (mut parts, body) = res.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let wrapped = envelope(status, is_json, &bytes);
    let new_bytes = serde_json::to_vec(&wrapped).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(new_bytes.len()));

    Ok(Response::from_parts(parts, Body::from(new_bytes)))
}

fn envelope(status: StatusCode, is_json: bool, bytes: &[u8]) -> Value {
    if is_json {
        let data: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);

        // Already standardized (error responses, explicit envelopes)
        if data.as_object().map_or(false, |obj| obj.contains_key("success")) {
            return data;
        }

        if status.is_success() {
            json!({ "success": true, "data": data })
        } else {
            let message = data
                .as_str()
                .or(data.get("error").and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            json!({ "success": false, "error": message })
        }
    } else {
        let msg = String::from_utf8_lossy(bytes).to_string();
        if status.is_success() {
            if bytes.is_empty() {
                json!({ "success": true, "data": null })
            } else {
                json!({ "success": true, "data": msg })
            }
        } else {
            json!({
                "success": false,
                "error": if msg.is_empty() { status.to_string() } else { msg }
            })
        }
    }
}
