//! Request extractors whose rejections go through `ProcureError`, so a
//! malformed body gets the same `{ error, category, suggestion }` reply as
//! any other validation failure.

use crate::utils::error::ProcureError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

/// JSON 請求內容
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ProcureError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// 查詢字串
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ProcureError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

impl From<JsonRejection> for ProcureError {
    fn from(rejection: JsonRejection) -> Self {
        ProcureError::validation(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ProcureError {
    fn from(rejection: QueryRejection) -> Self {
        ProcureError::validation(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ProcureError {
    fn from(rejection: MultipartRejection) -> Self {
        ProcureError::validation(format!("invalid multipart body: {}", rejection.body_text()))
    }
}
