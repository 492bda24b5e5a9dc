/// Request extractors with JSON error bodies
///
/// Thin wrappers over axum's `Json`, `Form` and `Path` whose rejections go
/// through [`ApiError`], so malformed input gets the same
/// `{error, message, details?}` body as every other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `application/x-www-form-urlencoded` request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
