use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware::Next,
    response::Response,
};

/// Treat POST and PUT bodies sent without a content type as JSON. Log
/// shippers frequently omit the header.
pub async fn default_json_content_type(mut request: Request, next: Next) -> Response {
    let has_body_method = matches!(*request.method(), Method::POST | Method::PUT);
    if has_body_method && !request.headers().contains_key(CONTENT_TYPE) {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    next.run(request).await
}
